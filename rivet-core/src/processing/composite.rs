//! Composite status calculation
//!
//! Folds a multiset of individual statuses into the single status shown for
//! a stage, a pipeline, or the set of predecessors a processable waits on.
//!
//! Precedence, first match wins:
//!
//! | rule                                   | result      |
//! |----------------------------------------|-------------|
//! | any `running`                          | `running`   |
//! | any `pending`                          | `pending`   |
//! | any `created`                          | `created`   |
//! | any `scheduled`                        | `scheduled` |
//! | any `manual`                           | `manual`    |
//! | any `failed`                           | `failed`    |
//! | any `canceled`                         | `canceled`  |
//! | only `skipped`                         | `skipped`   |
//! | only `success` / `skipped`             | `success`   |
//! | nothing at all                         | `skipped`   |
//!
//! An entry flagged `allow_failure` that failed or was canceled counts as
//! `success`, and a non-blocking manual entry counts as `skipped`. Only the
//! contribution changes; the entry's own stored status is left alone.

use crate::domain::status::Status;

/// One member of a composite: the stored status plus its failure tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: Status,
    pub allow_failure: bool,
}

impl StatusEntry {
    pub fn new(status: Status, allow_failure: bool) -> Self {
        Self {
            status,
            allow_failure,
        }
    }

    /// The status this entry contributes to its parent
    pub fn contribution(self) -> Status {
        match (self.status, self.allow_failure) {
            (Status::Failed | Status::Canceled, true) => Status::Success,
            (Status::Manual, true) => Status::Skipped,
            (status, _) => status,
        }
    }
}

impl From<Status> for StatusEntry {
    fn from(status: Status) -> Self {
        Self::new(status, false)
    }
}

/// Composite of plain statuses, none of them allowed to fail
pub fn composite<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    CompositeStatus::from_entries(statuses.into_iter().map(StatusEntry::from), false).status()
}

/// Accumulates entries and derives their aggregate status
///
/// In DAG mode the composite answers "may a dependent of these needs run?":
/// a skipped need skips the dependent, an unfinished need blocks it
/// (`pending`), and an empty set of needs is satisfied (`success`).
#[derive(Debug, Clone, Default)]
pub struct CompositeStatus {
    counts: [usize; Status::ALL.len()],
    total: usize,
    dag: bool,
}

impl CompositeStatus {
    pub fn new(dag: bool) -> Self {
        Self {
            dag,
            ..Self::default()
        }
    }

    pub fn from_entries<I>(entries: I, dag: bool) -> Self
    where
        I: IntoIterator<Item = StatusEntry>,
    {
        let mut composite = Self::new(dag);
        for entry in entries {
            composite.push(entry);
        }
        composite
    }

    pub fn push(&mut self, entry: StatusEntry) {
        self.counts[entry.contribution() as usize] += 1;
        self.total += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn status(&self) -> Status {
        if self.dag {
            if self.is_empty() {
                return Status::Success;
            }
            if self.any(Status::Skipped) {
                return Status::Skipped;
            }
            if !self.only(&[
                Status::Success,
                Status::Failed,
                Status::Canceled,
                Status::Skipped,
            ]) {
                return Status::Pending;
            }
        }

        if self.is_empty() {
            return Status::Skipped;
        }

        const BY_PRECEDENCE: [Status; 7] = [
            Status::Running,
            Status::Pending,
            Status::Created,
            Status::Scheduled,
            Status::Manual,
            Status::Failed,
            Status::Canceled,
        ];

        if let Some(status) = BY_PRECEDENCE.into_iter().find(|s| self.any(*s)) {
            return status;
        }

        if self.only(&[Status::Skipped]) {
            Status::Skipped
        } else {
            Status::Success
        }
    }

    fn count(&self, status: Status) -> usize {
        self.counts[status as usize]
    }

    fn any(&self, status: Status) -> bool {
        self.count(status) > 0
    }

    fn only(&self, statuses: &[Status]) -> bool {
        statuses.iter().map(|s| self.count(*s)).sum::<usize>() == self.total
    }
}
