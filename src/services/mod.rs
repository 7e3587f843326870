use crate::config::BacklogSettings;
use crate::db::session::{SessionId, VotingSettings};
use crate::db::vote::{UserId, Vote, WorkItemId};
use crate::db::DocumentStore;
use crate::devops::WorkItemService;
use backlog::{BacklogWriter, BatchResult};
use color_eyre::eyre::{eyre, Report, WrapErr};
use fetch::{BatchFetcher, PageFailure};
use notify::{NotificationLevel, Notifier};
use ranking::RankingError;
use requirement::{Materializer, TinyRequirement};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, info_span, instrument, warn};
use tracing_futures::Instrument;
use vote::{LedgerError, RemovalSummary, VoteLedger};

pub mod backlog;
pub mod fetch;
pub mod notify;
pub mod ranking;
pub mod requirement;
pub mod scope;
pub mod vote;

/// Project and team whose backlog is re-ranked.
#[derive(Clone, Debug)]
pub struct TeamContext {
    pub project: String,
    pub team: String,
}

/// Steps of [`VotingService::apply_to_backlog`], in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    LoadConfig,
    LoadVotes,
    LoadScope,
    LoadCandidates,
    TallyAndRank,
    Write,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::LoadConfig => "load config",
            PipelineStage::LoadVotes => "load votes",
            PipelineStage::LoadScope => "load scope",
            PipelineStage::LoadCandidates => "load candidates",
            PipelineStage::TallyAndRank => "tally and rank",
            PipelineStage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub error: Report,
}

#[derive(Debug)]
pub enum ApplyOutcome {
    /// Ranks were written; check [`BatchResult::is_clean`] for fallbacks.
    Updated(BatchResult),
    /// No item had votes, nothing was written.
    NothingToRank,
    /// A stage failed and the remaining stages were skipped.
    Failed(StageFailure),
}

async fn in_stage<T, F>(stage: PipelineStage, future: F) -> Result<T, StageFailure>
where
    F: Future<Output = Result<T, Report>>,
{
    info!(%stage, "Entering stage");
    future
        .instrument(info_span!("stage", %stage))
        .await
        .map_err(|error| StageFailure { stage, error })
}

/// Casts and withdraws votes for one session and applies its outcome to the backlog.
pub struct VotingService {
    store: Arc<dyn DocumentStore>,
    work_items: Arc<dyn WorkItemService>,
    notifier: Arc<dyn Notifier>,
    settings: BacklogSettings,
    team: TeamContext,
    session_id: SessionId,
}

impl fmt::Debug for VotingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VotingService")
            .field("session_id", &self.session_id)
            .field("team", &self.team)
            .finish()
    }
}

impl VotingService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        work_items: Arc<dyn WorkItemService>,
        notifier: Arc<dyn Notifier>,
        settings: BacklogSettings,
        team: TeamContext,
        session_id: SessionId,
    ) -> Self {
        Self {
            store,
            work_items,
            notifier,
            settings,
            team,
            session_id,
        }
    }

    pub fn ledger(&self) -> VoteLedger {
        VoteLedger::new(
            self.store.clone(),
            self.session_id.clone(),
            self.settings.write_retries,
        )
    }

    fn report_ledger_error(&self, err: &LedgerError) {
        match err {
            LedgerError::Rejected(rejection) => {
                info!("Vote rejected: {:?}", rejection);
                self.notifier
                    .notify(NotificationLevel::Warning, &rejection.to_string());
            }
            LedgerError::Store(report) => {
                error!("Voting document store failed: {:?}", report);
                self.notifier
                    .notify(NotificationLevel::Danger, notify::GENERIC_FAILURE);
            }
        }
    }

    pub async fn save_vote(&self, vote: Vote, max_votes: usize) -> Result<(), LedgerError> {
        let mut ledger = self.ledger();
        match ledger.add(vote, max_votes).await {
            Ok(()) => {
                self.notifier
                    .notify(NotificationLevel::Success, notify::VOTE_SAVED);
                Ok(())
            }
            Err(err) => {
                self.report_ledger_error(&err);
                Err(err)
            }
        }
    }

    pub async fn delete_vote(
        &self,
        work_item_id: WorkItemId,
        user_id: &UserId,
    ) -> Result<bool, LedgerError> {
        let mut ledger = self.ledger();
        match ledger.remove(work_item_id, user_id).await {
            Ok(removed) => {
                self.notifier
                    .notify(NotificationLevel::Success, notify::VOTE_DELETED);
                Ok(removed)
            }
            Err(err) => {
                self.report_ledger_error(&err);
                Err(err)
            }
        }
    }

    /// Removes the user's votes from every session. Sessions that could not be
    /// written are listed in the summary and only logged.
    pub async fn remove_all_user_votes(&self, user_id: &UserId) -> Result<RemovalSummary, Report> {
        let summary = self.ledger().remove_all_for_user(user_id).await?;
        if summary.failed.is_empty() {
            self.notifier
                .notify(NotificationLevel::Success, notify::VOTES_REMOVED);
        }
        Ok(summary)
    }

    /// Runs load config, load votes, load scope, load candidates, tally and
    /// rank, and write, stopping at the first stage that fails.
    #[instrument(skip(self), fields(session = self.session_id.as_str()))]
    pub async fn apply_to_backlog(&self, level: &str) -> ApplyOutcome {
        match self.run_pipeline(level).await {
            Ok(Some(result)) => {
                if result.is_clean() {
                    self.notifier
                        .notify(NotificationLevel::Success, notify::BACKLOG_UPDATED);
                } else {
                    self.notifier
                        .notify(NotificationLevel::Danger, notify::GENERIC_FAILURE);
                }
                ApplyOutcome::Updated(result)
            }
            Ok(None) => {
                self.notifier
                    .notify(NotificationLevel::Warning, notify::NOTHING_TO_RANK);
                ApplyOutcome::NothingToRank
            }
            Err(failure) => {
                error!(stage = %failure.stage, "Applying votes failed: {:?}", failure.error);
                self.notifier
                    .notify(NotificationLevel::Danger, notify::GENERIC_FAILURE);
                ApplyOutcome::Failed(failure)
            }
        }
    }

    async fn run_pipeline(&self, level: &str) -> Result<Option<BatchResult>, StageFailure> {
        let voting = in_stage(PipelineStage::LoadConfig, self.load_voting()).await?;
        info!(?voting, "Voting configuration loaded");

        let ledger = in_stage(PipelineStage::LoadVotes, async {
            let mut ledger = self.ledger();
            ledger.load().await?;
            Ok::<_, Report>(ledger)
        })
        .await?;

        let areas = in_stage(PipelineStage::LoadScope, self.load_scope()).await?;
        let requirements = in_stage(
            PipelineStage::LoadCandidates,
            self.load_requirements(level, &areas),
        )
        .await?;

        let ranked = match ranking::compute_new_order(ranking::join_votes(
            requirements,
            &ledger.tally(),
        )) {
            Ok(ranked) if ranked.items.is_empty() => return Ok(None),
            Ok(ranked) => ranked,
            Err(RankingError::EmptyBacklog) => return Ok(None),
            Err(err) => {
                return Err(StageFailure {
                    stage: PipelineStage::TallyAndRank,
                    error: err.into(),
                })
            }
        };

        let writer = BacklogWriter::new(
            self.work_items.clone(),
            self.settings.rank_field.field(),
            self.settings.history_comment.as_str(),
        );
        let result = writer
            .apply_ranks(&ranked)
            .instrument(info_span!("stage", stage = %PipelineStage::Write))
            .await;
        Ok(Some(result))
    }

    async fn load_voting(&self) -> Result<VotingSettings, Report> {
        let doc = self
            .store
            .get_document(&self.session_id)
            .await?
            .ok_or_else(|| eyre!("voting session {} does not exist", self.session_id))?;
        doc.voting
            .ok_or_else(|| eyre!("voting session {} has no configuration", self.session_id))
    }

    async fn load_scope(&self) -> Result<String, Report> {
        let team_fields = self
            .work_items
            .team_field_values(&self.team.project, &self.team.team)
            .await
            .wrap_err("reading team field values")?;
        scope::area_clause(&team_fields)
    }

    async fn load_requirements(
        &self,
        level: &str,
        area_clause: &str,
    ) -> Result<Vec<TinyRequirement>, Report> {
        let query = scope::candidate_query(level, area_clause);
        info!(%query, "Querying candidate items");
        let ids: Vec<WorkItemId> = self
            .work_items
            .query_by_wiql(&query, &self.team.project)
            .await
            .wrap_err("querying candidate items")?
            .work_items
            .into_iter()
            .map(|item| item.id)
            .collect();

        let fetcher = BatchFetcher::new(self.work_items.clone(), self.settings.page_size);
        let materializer = Materializer::new(self.settings.unassigned_label.as_str());
        let notifier = &self.notifier;
        let requirements = fetcher
            .fetch_requirements(&ids, &materializer, &mut |failure: &PageFailure| {
                warn!(page = failure.page, "Skipping {} work items", failure.ids.len());
                notifier.nothing_to_vote(false);
            })
            .await;
        info!(candidates = ids.len(), loaded = requirements.len(), "Candidates loaded");
        Ok(requirements)
    }
}
