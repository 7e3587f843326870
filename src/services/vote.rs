use crate::db::session::{SessionId, VotingDocument};
use crate::db::vote::{UserId, Vote, WorkItemId};
use crate::db::{is_version_conflict, DocumentStore};
use color_eyre::eyre::Report;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why a vote could not be cast or withdrawn. The message is shown to the user as is.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum VoteRejection {
    #[error("This voting has been stopped. \nPlease refresh your browser window to get the actual content.")]
    SessionClosed,
    #[error("This voting has been paused. \nPlease refresh your browser window to get the actual content.")]
    SessionPaused,
    #[error("You have no vote remaining. \nPlease refresh your browser window to get the actual content.")]
    QuotaExceeded,
    #[error("You cannot vote again for this item. Please refresh your browser window to get the actual content.")]
    DuplicateVote,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Rejected(#[from] VoteRejection),
    #[error("voting document store failed: {0}")]
    Store(Report),
}

impl From<Report> for LedgerError {
    fn from(report: Report) -> Self {
        LedgerError::Store(report)
    }
}

/// Sessions touched by a bulk vote removal.
#[derive(Debug, Default)]
pub struct RemovalSummary {
    pub updated: Vec<SessionId>,
    pub failed: Vec<(SessionId, Report)>,
}

/// Reads `id`, applies `change` and writes it back, starting over when another
/// writer got there first.
async fn modify_document<F>(
    store: &dyn DocumentStore,
    id: &SessionId,
    retries: u32,
    mut change: F,
) -> Result<VotingDocument, LedgerError>
where
    F: FnMut(&mut VotingDocument) -> Result<(), VoteRejection> + Send,
{
    let mut attempt = 0;
    loop {
        let mut doc = store
            .get_document(id)
            .await?
            .ok_or(VoteRejection::SessionClosed)?;
        change(&mut doc)?;
        match store.update_document(doc).await {
            Ok(updated) => {
                debug!(id = id.as_str(), version = updated.version, "Voting document updated");
                return Ok(updated);
            }
            Err(err) if is_version_conflict(&err) && attempt < retries => {
                attempt += 1;
                warn!(id = id.as_str(), attempt, "Voting document changed concurrently, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// The votes of one session.
pub struct VoteLedger {
    store: Arc<dyn DocumentStore>,
    session_id: SessionId,
    write_retries: u32,
    votes: Vec<Vote>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn DocumentStore>, session_id: SessionId, write_retries: u32) -> Self {
        Self {
            store,
            session_id,
            write_retries,
            votes: vec![],
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    /// Replaces the in-memory votes with the stored ones; a missing document means no votes.
    #[instrument(skip(self), fields(session = self.session_id.as_str()))]
    pub async fn load(&mut self) -> Result<(), Report> {
        self.votes = self
            .store
            .get_document(&self.session_id)
            .await?
            .map(|doc| doc.votes)
            .unwrap_or_default();
        debug!("Loaded {} votes", self.votes.len());
        Ok(())
    }

    pub fn count_for_user(&self, user_id: &UserId) -> usize {
        self.votes.iter().filter(|v| &v.user_id == user_id).count()
    }

    /// Number of votes per work item.
    pub fn tally(&self) -> HashMap<WorkItemId, u32> {
        let mut counts = HashMap::new();
        for vote in &self.votes {
            *counts.entry(vote.work_item_id).or_insert(0) += 1;
        }
        counts
    }

    #[instrument(
        skip(self, vote),
        fields(
            session = self.session_id.as_str(),
            user = vote.user_id.as_str(),
            item = vote.work_item_id.0
        )
    )]
    pub async fn add(&mut self, vote: Vote, max_votes_per_user: usize) -> Result<(), LedgerError> {
        let updated = modify_document(
            self.store.as_ref(),
            &self.session_id,
            self.write_retries,
            |doc| {
                let voting = doc.voting.as_ref().ok_or(VoteRejection::SessionClosed)?;
                if !voting.is_voting_enabled {
                    return Err(VoteRejection::SessionClosed);
                }
                if voting.is_voting_paused {
                    return Err(VoteRejection::SessionPaused);
                }
                if doc.votes_by(&vote.user_id) >= max_votes_per_user {
                    return Err(VoteRejection::QuotaExceeded);
                }
                if !voting.is_multiple_voting_enabled
                    && doc.votes.iter().any(|v| v.same_ballot(&vote))
                {
                    return Err(VoteRejection::DuplicateVote);
                }
                doc.votes.push(vote.clone());
                Ok(())
            },
        )
        .await?;
        info!("Vote saved");
        self.votes = updated.votes;
        Ok(())
    }

    /// Removes the first vote of `user_id` for `work_item_id`. Returns whether one was found.
    #[instrument(skip(self), fields(session = self.session_id.as_str()))]
    pub async fn remove(
        &mut self,
        work_item_id: WorkItemId,
        user_id: &UserId,
    ) -> Result<bool, LedgerError> {
        let mut removed = false;
        let updated = modify_document(
            self.store.as_ref(),
            &self.session_id,
            self.write_retries,
            |doc| {
                let enabled = doc.voting.as_ref().map_or(false, |v| v.is_voting_enabled);
                if !enabled {
                    return Err(VoteRejection::SessionClosed);
                }
                removed = match doc
                    .votes
                    .iter()
                    .position(|v| v.work_item_id == work_item_id && &v.user_id == user_id)
                {
                    Some(index) => {
                        doc.votes.remove(index);
                        true
                    }
                    None => false,
                };
                Ok(())
            },
        )
        .await?;
        debug!(removed, "Vote deleted");
        self.votes = updated.votes;
        Ok(removed)
    }

    /// Drops every vote of `user_id` in every session. Documents are written
    /// concurrently; a failed write is logged and does not undo the others.
    #[instrument(skip(self))]
    pub async fn remove_all_for_user(
        &mut self,
        user_id: &UserId,
    ) -> Result<RemovalSummary, Report> {
        let documents = self.store.get_all_documents().await?;
        let store = self.store.as_ref();
        let retries = self.write_retries;
        let writes = documents
            .into_iter()
            .filter(|doc| doc.votes_by(user_id) > 0)
            .map(|doc| async move {
                let result = modify_document(store, &doc.id, retries, |doc| {
                    doc.votes.retain(|v| &v.user_id != user_id);
                    Ok(())
                })
                .await;
                (doc.id, result)
            });

        let mut summary = RemovalSummary::default();
        for (id, result) in join_all(writes).await {
            match result {
                Ok(_) => summary.updated.push(id),
                Err(LedgerError::Rejected(rejection)) => {
                    warn!(id = id.as_str(), "Removing votes failed: {:?}", rejection);
                    summary.failed.push((id, Report::new(rejection)));
                }
                Err(LedgerError::Store(err)) => {
                    warn!(id = id.as_str(), "Removing votes failed: {:?}", err);
                    summary.failed.push((id, err));
                }
            }
        }
        info!(
            updated = summary.updated.len(),
            failed = summary.failed.len(),
            "Removed user votes"
        );

        if summary.updated.contains(&self.session_id) {
            self.votes.retain(|v| &v.user_id != user_id);
        }
        Ok(summary)
    }
}
