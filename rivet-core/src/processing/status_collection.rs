//! Status collection
//!
//! A process-local view of one pipeline's processables for the duration of a
//! single processing pass. Every query is answered from the snapshot taken at
//! construction plus the `set_processable_status` calls applied since; the
//! store is never re-read mid-pass.

use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::processable::ProcessableStatus;
use crate::domain::status::Status;
use crate::processing::composite::{CompositeStatus, StatusEntry};

/// Default page size for created-processable batches
pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub struct StatusCollection {
    processables: Vec<ProcessableStatus>,
    index_by_id: HashMap<Uuid, usize>,
    batch_size: usize,
}

impl StatusCollection {
    pub fn new(processables: Vec<ProcessableStatus>) -> Self {
        Self::with_batch_size(processables, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(processables: Vec<ProcessableStatus>, batch_size: usize) -> Self {
        let index_by_id = processables
            .iter()
            .enumerate()
            .map(|(index, processable)| (processable.id, index))
            .collect();

        Self {
            processables,
            index_by_id,
            batch_size: batch_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.processables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processables.is_empty()
    }

    /// Records a status change applied during this pass
    ///
    /// The processable is flagged unprocessed so the change is consumed at
    /// the end of the pass. Unknown ids are ignored: the processable may have
    /// been filtered out of the snapshot concurrently.
    pub fn set_processable_status(&mut self, id: Uuid, status: Status, lock_version: i32) {
        let Some(&index) = self.index_by_id.get(&id) else {
            return;
        };

        let processable = &mut self.processables[index];
        processable.status = status;
        processable.lock_version = lock_version;
        processable.processed = false;
    }

    /// Composite status of every processable
    pub fn status_of_all(&self) -> Status {
        self.status_of(self.processables.iter(), false)
    }

    /// Composite status of the processables at a stage position
    pub fn status_of_stage(&self, position: i32) -> Status {
        self.status_of(
            self.processables.iter().filter(|p| p.stage_idx == position),
            false,
        )
    }

    /// Composite status of the named processables
    ///
    /// Names not present in the collection are left out. With `dag` set the
    /// result tells a dependent whether its needs allow it to run.
    pub fn status_of_processables<S: AsRef<str>>(&self, names: &[S], dag: bool) -> Status {
        self.status_of(
            self.processables
                .iter()
                .filter(|p| names.iter().any(|name| name.as_ref() == p.name)),
            dag,
        )
    }

    /// Composite status of every processable before a stage position
    pub fn status_of_processables_prior_to_stage(&self, position: i32) -> Status {
        self.status_of(
            self.processables.iter().filter(|p| p.stage_idx < position),
            false,
        )
    }

    /// Ids of created processables at a stage position, in pages of the
    /// configured batch size
    pub fn created_processable_ids_in_stage(&self, position: i32) -> Vec<Vec<Uuid>> {
        let ids: Vec<Uuid> = self
            .processables
            .iter()
            .filter(|p| p.stage_idx == position && p.status == Status::Created)
            .map(|p| p.id)
            .collect();

        ids.chunks(self.batch_size).map(<[Uuid]>::to_vec).collect()
    }

    /// Processables whose latest status change has not been consumed yet,
    /// as `(id, lock_version)` pairs
    pub fn processing_processables(&self) -> Vec<(Uuid, i32)> {
        self.processables
            .iter()
            .filter(|p| !p.processed)
            .map(|p| (p.id, p.lock_version))
            .collect()
    }

    fn status_of<'a, I>(&self, processables: I, dag: bool) -> Status
    where
        I: Iterator<Item = &'a ProcessableStatus>,
    {
        CompositeStatus::from_entries(
            processables.map(|p| StatusEntry::new(p.status, p.allow_failure)),
            dag,
        )
        .status()
    }
}
