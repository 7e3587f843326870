use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WorkItemId(pub i64);

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Hash, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifies the voting round a vote was cast in.
#[derive(Clone, Hash, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VotingId(pub String);

#[derive(Clone, Hash, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub user_id: UserId,
    pub voting_id: VotingId,
    pub work_item_id: WorkItemId,
}

impl Vote {
    pub fn new(user_id: UserId, voting_id: VotingId, work_item_id: WorkItemId) -> Self {
        Self {
            user_id,
            voting_id,
            work_item_id,
        }
    }

    /// Same voter, round and item. Used for duplicate detection.
    pub fn same_ballot(&self, other: &Vote) -> bool {
        self == other
    }
}
