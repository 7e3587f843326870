use super::ranking::RankedBacklog;
use crate::db::vote::WorkItemId;
use crate::devops::fields::ItemField;
use crate::devops::{PatchOp, PatchOperation, WorkItemService};
use crate::span::spawn_in_current_span;
use color_eyre::eyre::Report;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WriteOutcome {
    /// The rank field was replaced in place.
    Replaced,
    /// Replacing failed; the rank was added by the fallback write.
    Added,
    /// Replacing and the fallback write both failed.
    FallbackFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemWrite {
    pub id: WorkItemId,
    pub rank: i64,
    pub outcome: WriteOutcome,
}

/// Per-item outcome of one backlog update, in ranking order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub writes: Vec<ItemWrite>,
}

impl BatchResult {
    /// True when every primary write went through.
    pub fn is_clean(&self) -> bool {
        self.writes
            .iter()
            .all(|write| write.outcome == WriteOutcome::Replaced)
    }

    pub fn count(&self, outcome: WriteOutcome) -> usize {
        self.writes.iter().filter(|w| w.outcome == outcome).count()
    }
}

enum PendingWrite {
    Done(ItemWrite),
    Fallback {
        id: WorkItemId,
        rank: i64,
        handle: JoinHandle<Result<(), Report>>,
    },
}

/// Writes new ranks back to the work item service.
pub struct BacklogWriter {
    service: Arc<dyn WorkItemService>,
    rank_field: ItemField,
    comment: String,
}

impl BacklogWriter {
    pub fn new(
        service: Arc<dyn WorkItemService>,
        rank_field: ItemField,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            service,
            rank_field,
            comment: comment.into(),
        }
    }

    /// Sets the rank field with `op` and leaves a history comment.
    pub fn rank_patch(&self, op: PatchOp, rank: i64) -> Vec<PatchOperation> {
        vec![
            PatchOperation::new(op, self.rank_field, rank),
            PatchOperation::new(PatchOp::Add, ItemField::History, self.comment.as_str()),
        ]
    }

    /// Replaces the rank of every item. An item whose replace fails gets an
    /// `add` instead, issued in the background while the loop moves on; all
    /// fallbacks are joined before the result is returned.
    #[instrument(
        skip(self, ranked),
        fields(items = ranked.items.len(), seed_rank = ranked.seed_rank)
    )]
    pub async fn apply_ranks(&self, ranked: &RankedBacklog) -> BatchResult {
        info!("Begin updating backlog");
        let mut pending = Vec::with_capacity(ranked.items.len());
        for (item, rank) in ranked.assignments() {
            let id = item.id();
            let replace = self.rank_patch(PatchOp::Replace, rank);
            match self.service.update_work_item(&replace, id).await {
                Ok(_) => {
                    debug!(%id, rank, "Replace succeeded");
                    pending.push(PendingWrite::Done(ItemWrite {
                        id,
                        rank,
                        outcome: WriteOutcome::Replaced,
                    }));
                }
                Err(err) => {
                    warn!(%id, rank, "Replace failed, trying to add: {}", err);
                    let service = self.service.clone();
                    let add = self.rank_patch(PatchOp::Add, rank);
                    let handle = spawn_in_current_span(async move {
                        service.update_work_item(&add, id).await.map(|_| ())
                    });
                    pending.push(PendingWrite::Fallback { id, rank, handle });
                }
            }
        }

        let mut result = BatchResult::default();
        for write in pending {
            let write = match write {
                PendingWrite::Done(write) => write,
                PendingWrite::Fallback { id, rank, handle } => {
                    let outcome = match handle.await {
                        Ok(Ok(())) => {
                            debug!(%id, rank, "Add succeeded");
                            WriteOutcome::Added
                        }
                        Ok(Err(err)) => {
                            warn!(%id, rank, "Add failed: {:?}", err);
                            WriteOutcome::FallbackFailed
                        }
                        Err(err) => {
                            warn!(%id, rank, "Add task did not finish: {}", err);
                            WriteOutcome::FallbackFailed
                        }
                    };
                    ItemWrite { id, rank, outcome }
                }
            };
            result.writes.push(write);
        }

        info!(
            replaced = result.count(WriteOutcome::Replaced),
            added = result.count(WriteOutcome::Added),
            failed = result.count(WriteOutcome::FallbackFailed),
            "Finished updating backlog"
        );
        result
    }
}
