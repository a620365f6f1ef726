use async_trait::async_trait;
use chrono::Utc;
use perfscope_core::analysis::{AnalysisInput, Device};
use perfscope_core::job::{AnalysisJob, JobStatus, JobUpdate};
use perfscope_core::report::AnalysisResult;
use perfscope_core::types::{JobId, Timestamp};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use super::{JobStore, StoreError};

/// Column list for `analysis_jobs` queries.
const COLUMNS: &str = "\
    id, url, device, status, result, error_message, \
    created_at, updated_at, completed_at";

/// A row from the `analysis_jobs` table.
#[derive(Debug, FromRow)]
struct JobRow {
    id: JobId,
    url: String,
    device: String,
    status: String,
    result: Option<serde_json::Value>,
    error_message: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for AnalysisJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let device = row
            .device
            .parse::<Device>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let result = row
            .result
            .map(serde_json::from_value::<AnalysisResult>)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("job {}: {e}", row.id)))?;

        Ok(AnalysisJob {
            id: row.id,
            input: AnalysisInput {
                url: row.url,
                device,
            },
            status,
            result,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// PostgreSQL-backed job store.
///
/// Updates lock the row (`SELECT ... FOR UPDATE`) inside a transaction, so
/// concurrent updates to one id are serialised by the database.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self, input), fields(url = %input.url, device = %input.device))]
    async fn create(&self, input: AnalysisInput) -> Result<AnalysisJob, StoreError> {
        let job = AnalysisJob::new(input, Utc::now());

        let query = format!(
            "INSERT INTO analysis_jobs (id, url, device, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job.id)
            .bind(&job.input.url)
            .bind(job.input.device.as_str())
            .bind(job.status.as_str())
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get(&self, id: JobId) -> Result<Option<AnalysisJob>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM analysis_jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AnalysisJob::try_from)
            .transpose()
    }

    #[instrument(skip(self, update), fields(status = ?update.status))]
    async fn update(
        &self,
        id: JobId,
        update: JobUpdate,
    ) -> Result<Option<AnalysisJob>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {COLUMNS} FROM analysis_jobs WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, JobRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut job = AnalysisJob::try_from(row)?;
        job.apply(update, Utc::now())?;

        let result = job
            .result
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, result = $3, error_message = $4, \
                 updated_at = $5, completed_at = $6 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(job.status.as_str())
        .bind(result)
        .bind(&job.error_message)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: i64) -> Result<Vec<AnalysisJob>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_jobs \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(limit.clamp(0, super::MAX_LIST_LIMIT))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AnalysisJob::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn purge_finished_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM analysis_jobs WHERE status <> $1 AND created_at < $2",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
