//! Route definitions for the analysis job protocol.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::analysis;
use crate::state::AppState;

/// Routes mounted under `/api`.
///
/// ```text
/// POST   /analyze           -> submit_analysis
/// GET    /analysis          -> list_analyses
/// GET    /analysis/{id}     -> get_analysis
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analysis::submit_analysis))
        .route("/analysis", get(analysis::list_analyses))
        .route("/analysis/{id}", get(analysis::get_analysis))
}
