//! Background analysis runner.
//!
//! Consumes [`AnalysisTask`]s from the queue and runs them concurrently,
//! bounded by a semaphore. Every task ends in exactly one terminal store
//! update: completed on success, failed on analyzer error, timeout or panic.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use perfscope_core::job::JobUpdate;
use perfscope_core::types::JobId;
use perfscope_db::repositories::JobStore;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::analyzer::Analyzer;
use super::queue::AnalysisTask;
use crate::config::AnalysisConfig;

/// Message recorded on jobs still queued when the runner shuts down.
const SHUTDOWN_MESSAGE: &str = "Analysis was not started because the server shut down";

/// Message recorded on in-flight jobs aborted after the drain timeout.
const INTERRUPTED_MESSAGE: &str = "Analysis was interrupted because the server shut down";

pub struct AnalysisRunner {
    receiver: mpsc::Receiver<AnalysisTask>,
    store: Arc<dyn JobStore>,
    analyzer: Arc<dyn Analyzer>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl AnalysisRunner {
    pub fn new(
        receiver: mpsc::Receiver<AnalysisTask>,
        store: Arc<dyn JobStore>,
        analyzer: Arc<dyn Analyzer>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            receiver,
            store,
            analyzer,
            timeout: config.timeout,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
        }
    }

    /// Run until `cancel` fires or every queue sender is dropped.
    ///
    /// On exit, tasks still queued are failed and in-flight analyses get up
    /// to `drain_timeout` to finish. Analyses still running after that are
    /// aborted and their jobs failed.
    pub async fn run(mut self, cancel: CancellationToken, drain_timeout: Duration) {
        tracing::info!(
            concurrency = self.permits.available_permits(),
            timeout_secs = self.timeout.as_secs(),
            "Analysis runner started",
        );

        let mut in_flight = JoinSet::new();
        // Job behind each spawned task, so a task that dies unfinished can
        // still be finalized.
        let mut running: HashMap<TaskId, JobId> = HashMap::new();

        loop {
            while let Some(joined) = in_flight.try_join_next_with_id() {
                settle(self.store.as_ref(), &mut running, joined).await;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let task = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                task = self.receiver.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let span = tracing::info_span!(
                "analysis_job",
                job_id = %task.job_id,
                device = %task.input.device,
            );
            let store = Arc::clone(&self.store);
            let analyzer = Arc::clone(&self.analyzer);
            let timeout = self.timeout;
            let job_id = task.job_id;
            let handle = in_flight.spawn(
                async move {
                    let _permit = permit;
                    execute(store.as_ref(), analyzer.as_ref(), timeout, task).await;
                }
                .instrument(span),
            );
            running.insert(handle.id(), job_id);
        }

        tracing::info!(in_flight = in_flight.len(), "Analysis runner stopping");
        self.fail_queued().await;

        let store = self.store.as_ref();
        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(joined) = in_flight.join_next_with_id().await {
                settle(store, &mut running, joined).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = in_flight.len(),
                "Analysis runner drain timed out, aborting remaining analyses",
            );
            in_flight.abort_all();
            while let Some(joined) = in_flight.join_next_with_id().await {
                settle(store, &mut running, joined).await;
            }
        }

        tracing::info!("Analysis runner stopped");
    }

    /// Close the queue and fail every task that never started.
    async fn fail_queued(&mut self) {
        self.receiver.close();
        while let Ok(task) = self.receiver.try_recv() {
            finalize(self.store.as_ref(), task.job_id, JobUpdate::failed(SHUTDOWN_MESSAGE)).await;
        }
    }
}

/// Run one analysis and record its outcome.
pub async fn execute(
    store: &dyn JobStore,
    analyzer: &dyn Analyzer,
    timeout: Duration,
    task: AnalysisTask,
) {
    let started = Instant::now();
    tracing::debug!(url = %task.input.url, "Analysis started");

    let outcome = tokio::time::timeout(
        timeout,
        AssertUnwindSafe(analyzer.analyze(&task.input)).catch_unwind(),
    )
    .await;

    let update = match outcome {
        Ok(Ok(Ok(result))) => JobUpdate::completed(result),
        Ok(Ok(Err(e))) => JobUpdate::failed(e.to_string()),
        Ok(Err(panic)) => JobUpdate::failed(format!(
            "Analysis aborted unexpectedly: {}",
            panic_message(panic.as_ref())
        )),
        Err(_) => JobUpdate::failed(format!(
            "Analysis timed out after {} ms",
            timeout.as_millis()
        )),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &update.error_message {
        None => tracing::info!(duration_ms, "Analysis completed"),
        Some(error) => tracing::warn!(duration_ms, error = %error, "Analysis failed"),
    }

    finalize(store, task.job_id, update).await;
}

/// Apply the terminal update for `job_id`.
async fn finalize(store: &dyn JobStore, job_id: JobId, update: JobUpdate) {
    match store.update(job_id, update).await {
        Ok(Some(job)) => {
            tracing::debug!(job_id = %job.id, status = %job.status, "Job finalized");
        }
        Ok(None) => {
            tracing::warn!(job_id = %job_id, "Job disappeared before it could be finalized");
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to finalize job");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Forget a joined task. A task that was aborted or panicked outside the
/// analyzer never finalized its job, so fail the job here.
async fn settle(
    store: &dyn JobStore,
    running: &mut HashMap<TaskId, JobId>,
    joined: Result<(TaskId, ()), JoinError>,
) {
    let err = match joined {
        Ok((id, ())) => {
            running.remove(&id);
            return;
        }
        Err(e) => e,
    };
    let Some(job_id) = running.remove(&err.id()) else {
        return;
    };

    let message = if err.is_cancelled() {
        INTERRUPTED_MESSAGE.to_string()
    } else {
        format!("Analysis aborted unexpectedly: {err}")
    };
    tracing::error!(job_id = %job_id, error = %err, "Analysis task ended without finalizing its job");
    finalize(store, job_id, JobUpdate::failed(message)).await;
}
