use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use perfscope_core::analysis::AnalysisInput;
use perfscope_core::job::{AnalysisJob, JobUpdate};
use perfscope_core::types::{new_job_id, JobId, Timestamp};
use tokio::sync::RwLock;

use super::{JobStore, StoreError, MAX_LIST_LIMIT};

/// In-process job store.
///
/// All mutation goes through a single write lock, which serialises updates
/// to the same id. With `max_jobs` set, creating a job past the bound evicts
/// the oldest finished jobs; pending jobs are never evicted.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, AnalysisJob>>,
    max_jobs: Option<usize>,
}

impl MemoryJobStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_jobs: None,
        }
    }

    /// Create a store that retains at most `max_jobs` finished jobs beyond
    /// those still pending.
    pub fn with_capacity_limit(max_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_jobs: Some(max_jobs.max(1)),
        }
    }

    /// Number of jobs currently held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    fn evict_finished(jobs: &mut HashMap<JobId, AnalysisJob>, max_jobs: usize) {
        if jobs.len() < max_jobs {
            return;
        }

        let mut finished: Vec<(Timestamp, JobId)> = jobs
            .values()
            .filter(|j| j.is_terminal())
            .map(|j| (j.created_at, j.id))
            .collect();
        finished.sort();

        let excess = jobs.len() + 1 - max_jobs;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }

        if jobs.len() >= max_jobs {
            tracing::warn!(
                held = jobs.len(),
                max_jobs,
                "Job store over capacity with only pending jobs left",
            );
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input: AnalysisInput) -> Result<AnalysisJob, StoreError> {
        let mut jobs = self.jobs.write().await;
        if let Some(max_jobs) = self.max_jobs {
            Self::evict_finished(&mut jobs, max_jobs);
        }

        let mut job = AnalysisJob::new(input, Utc::now());
        while jobs.contains_key(&job.id) {
            job.id = new_job_id();
        }

        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<AnalysisJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(
        &self,
        id: JobId,
        update: JobUpdate,
    ) -> Result<Option<AnalysisJob>, StoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };

        job.apply(update, Utc::now())?;
        Ok(Some(job.clone()))
    }

    async fn list(&self, limit: i64) -> Result<Vec<AnalysisJob>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<AnalysisJob> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all.truncate(limit.clamp(0, MAX_LIST_LIMIT) as usize);
        Ok(all)
    }

    async fn purge_finished_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, j| !(j.is_terminal() && j.created_at < cutoff));
        Ok((before - jobs.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
