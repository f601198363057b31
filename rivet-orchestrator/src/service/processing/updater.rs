//! Processable Updater
//!
//! Advances a single created processable once its predecessors completed,
//! writing through the optimistic lock and retrying against fresh state when
//! another writer got there first.

use rivet_core::domain::processable::{Processable, SchedulingType};
use rivet_core::domain::status::Status;
use rivet_core::processing::StatusCollection;
use tracing::{debug, warn};

use crate::repository::{PipelineStore, StoreResult};
use crate::service::processing::transition::TransitionPolicy;

/// Result of a single update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Predecessors have not completed yet
    NotEligible,
    /// The processable was moved to this status
    Advanced(Status),
    /// Another writer already moved the processable to this status
    AlreadyAdvanced(Status),
    /// Every attempt hit a stale lock version
    Contended,
    /// The row no longer exists
    Vanished,
}

/// Status of everything a processable waits on
///
/// DAG processables wait on their needs only, stage processables on every
/// earlier stage.
pub fn previous_status(collection: &StatusCollection, processable: &Processable) -> Status {
    match processable.scheduling_type {
        SchedulingType::Dag => collection.status_of_processables(&processable.needs, true),
        SchedulingType::Stage => {
            collection.status_of_processables_prior_to_stage(processable.stage_idx)
        }
    }
}

pub struct ProcessableUpdater<'a> {
    store: &'a dyn PipelineStore,
    policy: &'a dyn TransitionPolicy,
    max_attempts: u32,
}

impl<'a> ProcessableUpdater<'a> {
    pub fn new(
        store: &'a dyn PipelineStore,
        policy: &'a dyn TransitionPolicy,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            policy,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Moves `processable` to its next status if `previous_status` is completed
    ///
    /// Every write is conditional on the lock version last read. A stale
    /// write re-reads the row and decides again; a row that is no longer
    /// `created` is adopted as is, never transitioned twice. The collection
    /// sees every status this call observes or writes.
    pub async fn update(
        &self,
        processable: &Processable,
        previous_status: Status,
        collection: &mut StatusCollection,
    ) -> StoreResult<UpdateOutcome> {
        if !previous_status.is_completed() {
            return Ok(UpdateOutcome::NotEligible);
        }

        let mut current = processable.clone();

        for attempt in 1..=self.max_attempts {
            if current.status != Status::Created {
                collection.set_processable_status(current.id, current.status, current.lock_version);
                return Ok(UpdateOutcome::AlreadyAdvanced(current.status));
            }

            let status = self.policy.next_status(&current, previous_status);

            if let Some(lock_version) = self
                .store
                .update_processable_status(current.id, current.lock_version, status)
                .await?
            {
                debug!(
                    "Processable {} ({}) {} -> {} after {}",
                    current.name, current.id, current.status, status, previous_status
                );
                collection.set_processable_status(current.id, status, lock_version);
                return Ok(UpdateOutcome::Advanced(status));
            }

            debug!(
                "Stale lock version {} on processable {} (attempt {}/{})",
                current.lock_version, current.id, attempt, self.max_attempts
            );

            current = match self.store.find_processable(current.id).await? {
                Some(fresh) => fresh,
                None => return Ok(UpdateOutcome::Vanished),
            };
        }

        warn!(
            "Processable {} still contended after {} attempts, leaving it for the next pass",
            current.id, self.max_attempts
        );
        Ok(UpdateOutcome::Contended)
    }
}
