use crate::db::vote::WorkItemId;
use crate::devops::{
    PatchOp, PatchOperation, TeamFieldValue, TeamFieldValues, WiqlResult, WorkItemRecord,
    WorkItemReference, WorkItemService,
};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Report};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct State {
    items: BTreeMap<WorkItemId, WorkItemRecord>,
    areas: Vec<TeamFieldValue>,
    queries: Vec<String>,
    updates: Vec<(WorkItemId, Vec<PatchOperation>)>,
}

/// In-memory work item service.
///
/// Queries are recorded but not evaluated: every stored item matches. Updates
/// follow JSON patch rules, so `replace` on a field the item lacks fails while
/// `add` creates it. Fetching or updating an unknown id fails.
#[derive(Default)]
pub struct MemoryWorkItems {
    state: Mutex<State>,
}

impl MemoryWorkItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: WorkItemRecord) {
        self.state.lock().await.items.insert(record.id, record);
    }

    pub async fn set_team_areas(&self, areas: Vec<TeamFieldValue>) {
        self.state.lock().await.areas = areas;
    }

    pub async fn item(&self, id: WorkItemId) -> Option<WorkItemRecord> {
        self.state.lock().await.items.get(&id).cloned()
    }

    pub async fn queries(&self) -> Vec<String> {
        self.state.lock().await.queries.clone()
    }

    /// Every update request received, successful or not, in arrival order.
    pub async fn updates(&self) -> Vec<(WorkItemId, Vec<PatchOperation>)> {
        self.state.lock().await.updates.clone()
    }
}

#[async_trait]
impl WorkItemService for MemoryWorkItems {
    async fn query_by_wiql(&self, query: &str, _project: &str) -> Result<WiqlResult, Report> {
        let mut state = self.state.lock().await;
        state.queries.push(query.to_owned());
        let work_items = state
            .items
            .keys()
            .map(|&id| WorkItemReference { id })
            .collect();
        Ok(WiqlResult { work_items })
    }

    async fn get_work_items(&self, ids: &[WorkItemId]) -> Result<Vec<WorkItemRecord>, Report> {
        let state = self.state.lock().await;
        ids.iter()
            .map(|id| {
                state
                    .items
                    .get(id)
                    .cloned()
                    .ok_or_else(|| eyre!("work item {} does not exist", id))
            })
            .collect()
    }

    async fn update_work_item(
        &self,
        patch: &[PatchOperation],
        id: WorkItemId,
    ) -> Result<WorkItemRecord, Report> {
        let mut state = self.state.lock().await;
        state.updates.push((id, patch.to_vec()));
        let mut record = state
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| eyre!("work item {} does not exist", id))?;

        for operation in patch {
            let name = operation
                .path
                .strip_prefix("/fields/")
                .ok_or_else(|| eyre!("unsupported patch path {}", operation.path))?;
            if operation.op == PatchOp::Replace && !record.fields.contains_key(name) {
                return Err(eyre!("cannot replace missing field {} on {}", name, id));
            }
            record
                .fields
                .insert(name.to_owned(), operation.value.clone());
        }

        debug!(%id, "Applied {} patch operations", patch.len());
        state.items.insert(id, record.clone());
        Ok(record)
    }

    async fn team_field_values(
        &self,
        _project: &str,
        _team: &str,
    ) -> Result<TeamFieldValues, Report> {
        Ok(TeamFieldValues {
            values: self.state.lock().await.areas.clone(),
        })
    }
}
