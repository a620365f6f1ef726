pub mod analysis;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /analyze                 submit analysis (POST)
/// /analysis                list recent jobs (GET)
/// /analysis/{id}           poll job (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(analysis::router())
}
