use super::requirement::{TinyRequirement, VotingItem};
use crate::db::vote::WorkItemId;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankingError {
    #[error("there are no backlog items to rank")]
    EmptyBacklog,
    #[error("work item {0} anchors the ranking but has no numeric order")]
    UnrankedSeed(WorkItemId),
}

/// Items to rewrite, in the order they receive new ranks.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedBacklog {
    pub items: Vec<VotingItem>,
    /// Current order of the item ranked first before re-ranking.
    pub seed_rank: i64,
}

impl RankedBacklog {
    /// The rank given to the item at `position`: one below the seed per step.
    pub fn rank_at(&self, position: usize) -> i64 {
        self.seed_rank.saturating_sub(position as i64 + 1)
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&VotingItem, i64)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(move |(position, item)| (item, self.rank_at(position)))
    }
}

/// Parses an order value the way a backlog stores it: an integer, or a
/// decimal that is truncated toward zero.
pub fn parse_order(order: &str) -> Option<i64> {
    let order = order.trim();
    if let Ok(value) = order.parse::<i64>() {
        return Some(value);
    }
    order
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

// Orders without a numeric value sort after every numeric one.
fn compare_orders(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Pairs each requirement with its vote count; items nobody voted for count 0.
pub fn join_votes(
    requirements: Vec<TinyRequirement>,
    tally: &HashMap<WorkItemId, u32>,
) -> Vec<VotingItem> {
    requirements
        .into_iter()
        .map(|requirement| {
            let votes = tally.get(&requirement.id).copied().unwrap_or(0);
            VotingItem::new(requirement, votes)
        })
        .collect()
}

/// Computes which items to rewrite and the rank to count down from.
///
/// The item with the lowest current order is the seed. The items are then
/// ordered by ascending vote count and the leading run without votes is
/// dropped, so only voted items are rewritten and the most voted item ends up
/// with the lowest (topmost) rank. Both sorts are stable.
pub fn compute_new_order(mut items: Vec<VotingItem>) -> Result<RankedBacklog, RankingError> {
    items.sort_by(|a, b| compare_orders(parse_order(a.order()), parse_order(b.order())));
    let seed = items.first().ok_or(RankingError::EmptyBacklog)?;
    let seed_rank = parse_order(seed.order()).ok_or(RankingError::UnrankedSeed(seed.id()))?;

    items.sort_by_key(|item| item.all_votes);
    let first_voted = items
        .iter()
        .position(|item| item.all_votes > 0)
        .unwrap_or(items.len());
    items.drain(..first_voted);

    Ok(RankedBacklog { items, seed_rank })
}
