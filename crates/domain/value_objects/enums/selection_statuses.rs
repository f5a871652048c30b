use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle of a Daily Access gym selection. The literals are read directly by the app.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Pending,
    Active,
    Removed,
}

impl SelectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStatus::Pending => "pending",
            SelectionStatus::Active => "active",
            SelectionStatus::Removed => "removed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SelectionStatus::Pending),
            "active" => Some(SelectionStatus::Active),
            "removed" => Some(SelectionStatus::Removed),
            _ => None,
        }
    }

    /// Statuses that hold one of the member's slots.
    pub fn occupying() -> [SelectionStatus; 2] {
        [SelectionStatus::Active, SelectionStatus::Pending]
    }

    pub fn occupies_slot(&self) -> bool {
        matches!(self, SelectionStatus::Active | SelectionStatus::Pending)
    }
}

impl Display for SelectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
