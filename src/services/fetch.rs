use super::requirement::{Materializer, TinyRequirement};
use crate::db::vote::WorkItemId;
use crate::devops::{WorkItemRecord, WorkItemService};
use color_eyre::eyre::Report;
use std::sync::Arc;
use tracing::{debug, warn};

/// Splits `ids` into contiguous pages of at most `page_size` ids, keeping
/// their order. An empty input still yields one (empty) page.
pub fn paginate(ids: &[WorkItemId], page_size: usize) -> Vec<Vec<WorkItemId>> {
    if ids.is_empty() {
        return vec![vec![]];
    }
    ids.chunks(page_size.max(1)).map(<[_]>::to_vec).collect()
}

/// A page whose batch request failed. Its items are left out of the result.
#[derive(Debug)]
pub struct PageFailure {
    pub page: usize,
    pub ids: Vec<WorkItemId>,
    pub error: Report,
}

pub struct BatchFetcher {
    service: Arc<dyn WorkItemService>,
    page_size: usize,
}

impl BatchFetcher {
    pub fn new(service: Arc<dyn WorkItemService>, page_size: usize) -> Self {
        Self { service, page_size }
    }

    /// Fetches every page in order. A failed page is reported to `on_failure`
    /// and skipped; the remaining pages are still fetched.
    pub async fn fetch_records(
        &self,
        ids: &[WorkItemId],
        on_failure: &mut (dyn FnMut(&PageFailure) + Send),
    ) -> Vec<WorkItemRecord> {
        let mut records = Vec::with_capacity(ids.len());
        for (page, ids) in paginate(ids, self.page_size).into_iter().enumerate() {
            if ids.is_empty() {
                continue;
            }
            match self.service.get_work_items(&ids).await {
                Ok(fetched) => {
                    debug!(page, count = fetched.len(), "Fetched page");
                    records.extend(fetched);
                }
                Err(error) => {
                    warn!(page, "Error fetching work items: {:?}", error);
                    on_failure(&PageFailure { page, ids, error });
                }
            }
        }
        records
    }

    /// Fetches and materializes; records with a malformed rank are dropped with a warning.
    pub async fn fetch_requirements(
        &self,
        ids: &[WorkItemId],
        materializer: &Materializer,
        on_failure: &mut (dyn FnMut(&PageFailure) + Send),
    ) -> Vec<TinyRequirement> {
        self.fetch_records(ids, on_failure)
            .await
            .iter()
            .filter_map(|record| match materializer.materialize(record) {
                Ok(requirement) => Some(requirement),
                Err(err) => {
                    warn!("Skipping work item: {}", err);
                    None
                }
            })
            .collect()
    }
}
