//! Handlers for the analysis job protocol.
//!
//! Submit creates a `pending` job, hands it to the runner and returns the id
//! without waiting. Poll returns the job as currently stored.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use perfscope_core::analysis::SubmitAnalysis;
use perfscope_core::error::CoreError;
use perfscope_core::job::JobUpdate;
use perfscope_core::types::JobId;
use perfscope_db::repositories::clamp_limit;
use serde::{Deserialize, Serialize};

use crate::engine::AnalysisTask;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a successful submit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
}

/// Query parameters for `GET /api/analysis`.
#[derive(Debug, Deserialize)]
pub struct AnalysisListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/analyze
///
/// Validates the body before any job exists. Malformed JSON, an unknown
/// `device`, or a non-absolute `url` all answer 400.
pub async fn submit_analysis(
    State(state): State<AppState>,
    payload: Result<Json<SubmitAnalysis>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = payload.map_err(|e| CoreError::Validation(e.body_text()))?;
    let input = body.into_input()?;

    let job = state.store.create(input.clone()).await?;

    let task = AnalysisTask {
        job_id: job.id,
        input,
    };
    if let Err(e) = state.queue.enqueue(task) {
        tracing::error!(job_id = %job.id, error = %e, "Failed to enqueue analysis");

        let update = JobUpdate::failed(format!("Analysis could not be scheduled: {e}"));
        if let Err(update_err) = state.store.update(job.id, update).await {
            tracing::error!(
                job_id = %job.id,
                error = %update_err,
                "Failed to mark unscheduled job as failed",
            );
        }

        return Err(AppError::ServiceUnavailable(
            "Analysis queue is unavailable, try again later".into(),
        ));
    }

    tracing::info!(
        job_id = %job.id,
        url = %job.input.url,
        device = %job.input.device,
        "Analysis job submitted",
    );

    Ok(Json(SubmitResponse { job_id: job.id }))
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// GET /api/analysis/{id}
///
/// Returns the job whatever its status. Ids that were never issued,
/// including ones that are not UUIDs, answer 404.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "AnalysisJob",
            id: raw_id.clone(),
        })
    };

    let id: JobId = raw_id.parse().map_err(|_| not_found())?;
    let job = state.store.get(id).await?.ok_or_else(not_found)?;

    Ok(Json(job))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/analysis
///
/// Most recent jobs first.
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(params): Query<AnalysisListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.store.list(clamp_limit(params.limit)).await?;
    Ok(Json(DataResponse { data: jobs }))
}
