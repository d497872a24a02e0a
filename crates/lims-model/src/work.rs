//! Work numbers: funding and tracking codes for operations

use crate::ids::WorkId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    /// Not started
    Unstarted,
    /// In progress
    #[default]
    Active,
    /// Temporarily halted
    Paused,
    /// Finished
    Completed,
    /// Abandoned after failure
    Failed,
    /// Withdrawn by the requester
    Withdrawn,
}

impl WorkStatus {
    /// Closed work cannot have further operations linked to it
    #[inline]
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            WorkStatus::Completed | WorkStatus::Failed | WorkStatus::Withdrawn
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkStatus::Unstarted => "unstarted",
            WorkStatus::Active => "active",
            WorkStatus::Paused => "paused",
            WorkStatus::Completed => "completed",
            WorkStatus::Failed => "failed",
            WorkStatus::Withdrawn => "withdrawn",
        })
    }
}

/// A work number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    /// Work id
    pub id: WorkId,
    /// Unique work number, e.g. "SGP1000"
    pub work_number: String,
    /// Current status
    #[serde(default)]
    pub status: WorkStatus,
}

impl Work {
    /// Whether the work is closed
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }
}
