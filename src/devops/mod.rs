pub mod client;
pub mod fields;

use crate::db::vote::WorkItemId;
use async_trait::async_trait;
use color_eyre::eyre::Report;
use fields::ItemField;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A work item as returned by the batch endpoint: id plus loosely typed fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItemRecord {
    pub id: WorkItemId,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl WorkItemRecord {
    pub fn new(id: WorkItemId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, field: ItemField, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.reference_name().to_owned(), value.into());
        self
    }

    pub fn field(&self, field: ItemField) -> Option<&Value> {
        self.fields.get(field.reference_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
    Add,
}

/// One JSON patch operation of a work item update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    pub fn new(op: PatchOp, field: ItemField, value: impl Into<Value>) -> Self {
        Self {
            op,
            path: field.patch_path(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItemReference {
    pub id: WorkItemId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiqlResult {
    #[serde(default)]
    pub work_items: Vec<WorkItemReference>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFieldValue {
    pub value: String,
    #[serde(default)]
    pub include_children: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFieldValues {
    #[serde(default)]
    pub values: Vec<TeamFieldValue>,
}

/// Remote work tracking service.
#[async_trait]
pub trait WorkItemService: Send + Sync {
    async fn query_by_wiql(&self, query: &str, project: &str) -> Result<WiqlResult, Report>;

    /// Fetches full records; callers keep `ids` within the service's page limit.
    async fn get_work_items(&self, ids: &[WorkItemId]) -> Result<Vec<WorkItemRecord>, Report>;

    async fn update_work_item(
        &self,
        patch: &[PatchOperation],
        id: WorkItemId,
    ) -> Result<WorkItemRecord, Report>;

    async fn team_field_values(&self, project: &str, team: &str)
        -> Result<TeamFieldValues, Report>;
}
