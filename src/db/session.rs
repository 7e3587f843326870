use super::vote::{UserId, Vote};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Hash, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingSettings {
    pub is_voting_enabled: bool,
    pub is_voting_paused: bool,
    pub is_multiple_voting_enabled: bool,
}

/// Stored state of one voting session.
///
/// `version` is owned by the document store: it is bumped on every successful
/// update and a write carrying a stale version is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct VotingDocument {
    pub id: SessionId,
    #[serde(default)]
    pub voting: Option<VotingSettings>,
    #[serde(default, rename = "vote")]
    pub votes: Vec<Vote>,
    #[serde(skip)]
    pub version: i64,
}

impl VotingDocument {
    pub fn new(id: SessionId, voting: VotingSettings) -> Self {
        Self {
            id,
            voting: Some(voting),
            votes: vec![],
            version: 0,
        }
    }

    pub fn votes_by(&self, user_id: &UserId) -> usize {
        self.votes.iter().filter(|v| &v.user_id == user_id).count()
    }
}
