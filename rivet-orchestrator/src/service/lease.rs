//! Exclusive Lease Guard
//!
//! Runs a unit of work only while holding a time-bounded lease on a key, so
//! concurrent triggers for the same key serialize while different keys run
//! in parallel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::repository::StoreError;
use crate::repository::lease::LeaseBackend;

pub struct ExclusiveLeaseGuard {
    backend: Arc<dyn LeaseBackend>,
    timeout: Duration,
}

impl ExclusiveLeaseGuard {
    pub fn new(backend: Arc<dyn LeaseBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Runs `work` if the lease on `key` can be obtained
    ///
    /// Returns `Ok(None)` without running `work` when another holder has the
    /// lease; that is the normal "already being handled" outcome. Once
    /// obtained, the lease is cancelled after `work` finishes whether it
    /// succeeded or failed. A failed cancel is logged and left to expire.
    pub async fn try_obtain_lease<T, E, F>(&self, key: &str, work: F) -> Result<Option<T>, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<StoreError>,
    {
        let Some(token) = self.backend.try_obtain(key, self.timeout).await? else {
            tracing::debug!("Lease {} is held elsewhere", key);
            return Ok(None);
        };

        tracing::debug!("Obtained lease {} for {:?}", key, self.timeout);

        let result = work.await;

        if let Err(e) = self.backend.cancel(key, token).await {
            tracing::warn!("Failed to cancel lease {}, it will expire: {}", key, e);
        }

        result.map(Some)
    }
}
