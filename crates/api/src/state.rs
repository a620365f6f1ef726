use std::sync::Arc;

use perfscope_db::repositories::JobStore;

use crate::config::ServerConfig;
use crate::engine::AnalysisQueue;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Job Store; the only shared mutable resource.
    pub store: Arc<dyn JobStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Hand-off to the analysis runner.
    pub queue: AnalysisQueue,
}
