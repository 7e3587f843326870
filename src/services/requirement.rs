use crate::db::vote::WorkItemId;
use crate::devops::{fields::ItemField, WorkItemRecord};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Order used when an item carries neither rank field.
pub const DEFAULT_ORDER: &str = "0";

#[derive(Debug, Error)]
#[error("work item {id}: {field} should be {expected}, found {found}")]
pub struct FieldError {
    pub id: WorkItemId,
    pub field: ItemField,
    pub expected: &'static str,
    pub found: Value,
}

/// Read-only snapshot of a backlog item, rebuilt on every load.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TinyRequirement {
    pub id: WorkItemId,
    /// Current rank as text; numeric for every item the backlog has ranked.
    pub order: String,
    pub title: Option<String>,
    pub work_item_type: Option<String>,
    pub state: Option<String>,
    pub size: Option<f64>,
    pub value_area: Option<f64>,
    pub iteration_path: Option<String>,
    pub assigned_to: String,
    pub description: Option<String>,
}

/// A requirement together with the number of votes cast for it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VotingItem {
    #[serde(flatten)]
    pub requirement: TinyRequirement,
    pub all_votes: u32,
}

impl VotingItem {
    pub fn new(requirement: TinyRequirement, all_votes: u32) -> Self {
        Self {
            requirement,
            all_votes,
        }
    }

    pub fn id(&self) -> WorkItemId {
        self.requirement.id
    }

    pub fn order(&self) -> &str {
        &self.requirement.order
    }
}

/// Turns raw work item records into [`TinyRequirement`]s.
#[derive(Clone, Debug, Default)]
pub struct Materializer {
    unassigned_label: String,
}

impl Materializer {
    pub fn new(unassigned_label: impl Into<String>) -> Self {
        Self {
            unassigned_label: unassigned_label.into(),
        }
    }

    /// Only a malformed rank rejects the record; any other malformed field is
    /// logged and left empty.
    pub fn materialize(&self, record: &WorkItemRecord) -> Result<TinyRequirement, FieldError> {
        let reader = FieldReader(record);
        Ok(TinyRequirement {
            id: record.id,
            order: reader.order()?,
            title: lenient(reader.text(ItemField::Title)),
            work_item_type: lenient(reader.text(ItemField::WorkItemType)),
            state: lenient(reader.text(ItemField::State)),
            size: lenient(reader.number(ItemField::Size)),
            value_area: lenient(reader.number(ItemField::BusinessValue)),
            iteration_path: lenient(reader.text(ItemField::IterationPath)),
            assigned_to: lenient(reader.assignee())
                .unwrap_or_else(|| self.unassigned_label.clone()),
            description: lenient(reader.text(ItemField::Description)),
        })
    }
}

fn lenient<T>(value: Result<Option<T>, FieldError>) -> Option<T> {
    value.unwrap_or_else(|err| {
        warn!("Ignoring field: {}", err);
        None
    })
}

struct FieldReader<'a>(&'a WorkItemRecord);

impl FieldReader<'_> {
    // null counts as absent
    fn get(&self, field: ItemField) -> Option<&Value> {
        self.0.field(field).filter(|value| !value.is_null())
    }

    fn mismatch(&self, field: ItemField, expected: &'static str, found: &Value) -> FieldError {
        FieldError {
            id: self.0.id,
            field,
            expected,
            found: found.clone(),
        }
    }

    /// StackRank wins over BacklogPriority; neither gives [`DEFAULT_ORDER`].
    fn order(&self) -> Result<String, FieldError> {
        for field in [ItemField::StackRank, ItemField::BacklogPriority] {
            match self.get(field) {
                Some(Value::Number(number)) => return Ok(number.to_string()),
                Some(Value::String(text)) => return Ok(text.clone()),
                Some(other) => return Err(self.mismatch(field, "a rank", other)),
                None => continue,
            }
        }
        Ok(DEFAULT_ORDER.to_owned())
    }

    fn text(&self, field: ItemField) -> Result<Option<String>, FieldError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(self.mismatch(field, "text", other)),
        }
    }

    fn number(&self, field: ItemField) -> Result<Option<f64>, FieldError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(number)) => Ok(number.as_f64()),
            Some(Value::String(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.mismatch(field, "a number", &Value::String(text.clone()))),
            Some(other) => Err(self.mismatch(field, "a number", other)),
        }
    }

    fn assignee(&self) -> Result<Option<String>, FieldError> {
        match self.get(ItemField::AssignedTo) {
            None => Ok(None),
            Some(Value::String(name)) => Ok(Some(name.clone())),
            Some(identity) => identity
                .get("displayName")
                .and_then(Value::as_str)
                .map(|name| Some(name.to_owned()))
                .ok_or_else(|| self.mismatch(ItemField::AssignedTo, "an identity", identity)),
        }
    }
}
