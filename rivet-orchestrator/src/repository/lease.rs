//! Lease Repository
//!
//! Time-bounded exclusive leases keyed by an arbitrary string. A lease that
//! is not cancelled expires on its own, so a crashed holder never blocks a
//! key for longer than the lease timeout.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::repository::StoreResult;

/// Proof of holding a lease, required to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseToken(pub Uuid);

impl LeaseToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Backend for exclusive leases
#[async_trait]
pub trait LeaseBackend: Send + Sync {
    /// Takes the lease for `key` unless someone else holds an unexpired one
    async fn try_obtain(&self, key: &str, timeout: Duration) -> StoreResult<Option<LeaseToken>>;

    /// Releases the lease if `token` still holds it
    async fn cancel(&self, key: &str, token: LeaseToken) -> StoreResult<()>;
}

/// Expiry is computed and compared on the database clock
const TRY_OBTAIN_LEASE: &str = r#"
    INSERT INTO processing_leases (key, token, expires_at)
    VALUES ($1, $2, NOW() + make_interval(secs => $3))
    ON CONFLICT (key) DO UPDATE SET
        token = EXCLUDED.token,
        expires_at = EXCLUDED.expires_at
    WHERE processing_leases.expires_at < NOW()
"#;

/// PostgreSQL-backed leases stored in `processing_leases`
#[derive(Debug, Clone)]
pub struct PgLease {
    pool: PgPool,
}

impl PgLease {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseBackend for PgLease {
    async fn try_obtain(&self, key: &str, timeout: Duration) -> StoreResult<Option<LeaseToken>> {
        let token = LeaseToken::generate();

        let result = sqlx::query(TRY_OBTAIN_LEASE)
            .bind(key)
            .bind(token.0)
            .bind(timeout.as_secs_f64())
            .execute(&self.pool)
            .await?;

        Ok((result.rows_affected() > 0).then_some(token))
    }

    async fn cancel(&self, key: &str, token: LeaseToken) -> StoreResult<()> {
        sqlx::query("DELETE FROM processing_leases WHERE key = $1 AND token = $2")
            .bind(key)
            .bind(token.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
