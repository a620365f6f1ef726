//! Periodic purge of finished analysis jobs.
//!
//! Completed and failed jobs older than the retention window are deleted on
//! a fixed interval. Pending jobs are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use perfscope_db::repositories::{JobStore, StoreError};
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the retention loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn JobStore>, retention: chrono::Duration, cancel: CancellationToken) {
    tracing::info!(
        retention_hours = retention.num_hours(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Job retention task started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(store.as_ref(), retention).await {
                    Ok(0) => tracing::debug!("Job retention: nothing to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Job retention: purged finished jobs"),
                    Err(e) => tracing::error!(error = %e, "Job retention: sweep failed"),
                }
            }
        }
    }
}

/// Delete finished jobs created more than `retention` ago.
///
/// A window reaching past the earliest representable time purges nothing.
pub async fn sweep_once(store: &dyn JobStore, retention: chrono::Duration) -> Result<u64, StoreError> {
    let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
        tracing::debug!(
            retention_hours = retention.num_hours(),
            "Job retention: window exceeds representable time, nothing to purge"
        );
        return Ok(0);
    };
    store.purge_finished_before(cutoff).await
}
