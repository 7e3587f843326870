use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Work item fields this crate reads or writes.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ItemField {
    Title,
    WorkItemType,
    State,
    Size,
    BusinessValue,
    IterationPath,
    AssignedTo,
    Description,
    History,
    StackRank,
    BacklogPriority,
}

impl ItemField {
    pub fn reference_name(self) -> &'static str {
        match self {
            ItemField::Title => "System.Title",
            ItemField::WorkItemType => "System.WorkItemType",
            ItemField::State => "System.State",
            ItemField::Size => "Microsoft.VSTS.Scheduling.Size",
            ItemField::BusinessValue => "Microsoft.VSTS.Common.BusinessValue",
            ItemField::IterationPath => "System.IterationPath",
            ItemField::AssignedTo => "System.AssignedTo",
            ItemField::Description => "System.Description",
            ItemField::History => "System.History",
            ItemField::StackRank => "Microsoft.VSTS.Common.StackRank",
            ItemField::BacklogPriority => "Microsoft.VSTS.Common.BacklogPriority",
        }
    }

    /// JSON patch path addressing this field.
    pub fn patch_path(self) -> String {
        format!("/fields/{}", self.reference_name())
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reference_name())
    }
}

/// The field ordering a backlog; which one exists depends on the process template.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankField {
    StackRank,
    BacklogPriority,
}

impl RankField {
    pub fn field(self) -> ItemField {
        match self {
            RankField::StackRank => ItemField::StackRank,
            RankField::BacklogPriority => ItemField::BacklogPriority,
        }
    }
}

impl FromStr for RankField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "StackRank" | "Microsoft.VSTS.Common.StackRank" => Ok(RankField::StackRank),
            "BacklogPriority" | "Microsoft.VSTS.Common.BacklogPriority" => {
                Ok(RankField::BacklogPriority)
            }
            other => Err(format!(
                "unknown rank field {:?}, expected StackRank or BacklogPriority",
                other
            )),
        }
    }
}
