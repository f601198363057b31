//! Status domain types
//!
//! The single status vocabulary shared by processables, stages and pipelines.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Status of a processable, stage or pipeline
///
/// "processing" is not a status: it is a transient marker derived from the
/// `processed` flag of a processable and never stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not yet eligible to start
    Created,
    /// Waiting to be picked up by a runner
    Pending,
    /// Executing on a runner
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    /// Waiting for a user to trigger it
    Manual,
    /// Waiting for its start-in timer
    Scheduled,
}

/// Statuses after which dependents are allowed to be evaluated
pub const COMPLETED_STATUSES: [Status; 4] = [
    Status::Success,
    Status::Failed,
    Status::Canceled,
    Status::Skipped,
];

impl Status {
    /// All statuses, in declaration order
    pub const ALL: [Status; 9] = [
        Status::Created,
        Status::Pending,
        Status::Running,
        Status::Success,
        Status::Failed,
        Status::Canceled,
        Status::Skipped,
        Status::Manual,
        Status::Scheduled,
    ];

    /// Whether dependents may be evaluated against this status
    pub fn is_completed(self) -> bool {
        COMPLETED_STATUSES.contains(&self)
    }

    /// Whether the status is a final outcome of a run
    pub fn is_terminal(self) -> bool {
        self.is_completed()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Canceled => "canceled",
            Status::Skipped => "skipped",
            Status::Manual => "manual",
            Status::Scheduled => "scheduled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored status string is not part of the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
