//! Keyed persistence for [`AnalysisJob`] records.

mod memory_job_store;
mod pg_job_store;

pub use memory_job_store::MemoryJobStore;
pub use pg_job_store::PgJobStore;

use async_trait::async_trait;
use perfscope_core::analysis::AnalysisInput;
use perfscope_core::error::CoreError;
use perfscope_core::job::{AnalysisJob, JobUpdate};
use perfscope_core::types::{JobId, Timestamp};

/// Maximum page size for job listing.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Clamp a caller-supplied list limit into `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

/// Errors raised by a [`JobStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database failed or is unreachable.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The update would break the job lifecycle (e.g. leave a terminal state).
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// A persisted row could not be decoded into a job.
    #[error("Corrupt job record: {0}")]
    Corrupt(String),
}

/// Job Store contract.
///
/// Implementations serialise updates per job id and guarantee that once a
/// terminal update is acknowledged, every later `get` observes it.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new `pending` job with a fresh, never-reused id.
    async fn create(&self, input: AnalysisInput) -> Result<AnalysisJob, StoreError>;

    /// Look up a job. `None` means the id was never issued (or was purged).
    async fn get(&self, id: JobId) -> Result<Option<AnalysisJob>, StoreError>;

    /// Merge `update` into an existing job. `None` if the id is unknown;
    /// nothing is created in that case.
    async fn update(
        &self,
        id: JobId,
        update: JobUpdate,
    ) -> Result<Option<AnalysisJob>, StoreError>;

    /// Most recently created jobs first, at most `limit` of them. `limit`
    /// is capped at [`MAX_LIST_LIMIT`].
    async fn list(&self, limit: i64) -> Result<Vec<AnalysisJob>, StoreError>;

    /// Delete terminal jobs created before `cutoff`. Pending jobs are kept.
    async fn purge_finished_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Verify the store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
