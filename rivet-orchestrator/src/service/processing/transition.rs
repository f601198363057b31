//! Transition policies
//!
//! Decide which status a created processable moves to once its predecessors
//! have completed. Only called for completed predecessor statuses.

use rivet_core::domain::processable::{Processable, When};
use rivet_core::domain::status::Status;

/// Decides the next status of an eligible processable
pub trait TransitionPolicy: Send + Sync {
    fn next_status(&self, processable: &Processable, previous_status: Status) -> Status;
}

/// Policy driven by the processable's `when` condition
///
/// | when         | runs after (stage / dag)                | becomes     |
/// |--------------|-----------------------------------------|-------------|
/// | `on_success` | success, skipped / success              | `pending`   |
/// | `manual`     | success, skipped / success              | `manual`    |
/// | `delayed`    | success, skipped / success              | `scheduled` |
/// | `on_failure` | failed                                  | `pending`   |
/// | `always`     | success, failed, canceled, skipped      | `pending`   |
///
/// Anything else skips the processable.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhenPolicy;

impl WhenPolicy {
    fn accepted_statuses(processable: &Processable) -> &'static [Status] {
        match processable.when {
            When::OnSuccess | When::Manual | When::Delayed => {
                if processable.is_dag() {
                    &[Status::Success]
                } else {
                    &[Status::Success, Status::Skipped]
                }
            }
            When::OnFailure => &[Status::Failed],
            When::Always => &[
                Status::Success,
                Status::Failed,
                Status::Canceled,
                Status::Skipped,
            ],
        }
    }
}

impl TransitionPolicy for WhenPolicy {
    fn next_status(&self, processable: &Processable, previous_status: Status) -> Status {
        if !Self::accepted_statuses(processable).contains(&previous_status) {
            return Status::Skipped;
        }

        match processable.when {
            When::Manual => Status::Manual,
            When::Delayed => Status::Scheduled,
            When::OnSuccess | When::OnFailure | When::Always => Status::Pending,
        }
    }
}
