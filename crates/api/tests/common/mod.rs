#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use perfscope_api::config::{AnalysisConfig, ServerConfig};
use perfscope_api::engine::{
    AnalysisQueue, AnalysisRunner, AnalysisTask, Analyzer, SimulatedAnalyzer,
};
use perfscope_api::router::build_app_router;
use perfscope_api::state::AppState;
use perfscope_db::repositories::{JobStore, MemoryJobStore};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Build a test `ServerConfig` with a short simulated analysis.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        analysis: AnalysisConfig {
            simulated_delay: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
            concurrency: 4,
            queue_capacity: 16,
            ..AnalysisConfig::default()
        },
    }
}

/// A router backed by an in-memory store, plus handles into its internals.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn JobStore>,
    cancel: CancellationToken,
    /// Held by apps built without a runner so the queue stays open.
    receiver: Option<mpsc::Receiver<AnalysisTask>>,
}

impl TestApp {
    /// Drop the queue's receiving side, as if the runner had stopped.
    pub fn close_queue(&mut self) {
        self.receiver = None;
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Full app with the simulated analyzer.
pub fn spawn_app() -> TestApp {
    let delay = test_config().analysis.simulated_delay;
    spawn_app_with(Arc::new(SimulatedAnalyzer::new(delay)))
}

/// Full app with a custom analyzer running behind the real runner.
pub fn spawn_app_with(analyzer: Arc<dyn Analyzer>) -> TestApp {
    let config = test_config();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let (queue, receiver) = AnalysisQueue::bounded(config.analysis.queue_capacity);
    let cancel = CancellationToken::new();

    let runner = AnalysisRunner::new(receiver, Arc::clone(&store), analyzer, &config.analysis);
    tokio::spawn(runner.run(cancel.clone(), Duration::from_secs(1)));

    TestApp {
        router: build_router(Arc::clone(&store), queue, config),
        store,
        cancel,
        receiver: None,
    }
}

/// App whose queue is never consumed. Jobs stay pending.
pub fn app_without_runner(queue_capacity: usize) -> TestApp {
    let config = test_config();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let (queue, receiver) = AnalysisQueue::bounded(queue_capacity);

    TestApp {
        router: build_router(Arc::clone(&store), queue, config),
        store,
        cancel: CancellationToken::new(),
        receiver: Some(receiver),
    }
}

fn build_router(store: Arc<dyn JobStore>, queue: AnalysisQueue, config: ServerConfig) -> Router {
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        queue,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit `body` and return the new job id, asserting a 200.
pub async fn submit(app: &Router, body: Value) -> String {
    let response = post_json(app, "/api/analyze", body).await;
    assert_eq!(response.status(), 200);
    let json = body_json(response).await;
    json["jobId"].as_str().unwrap().to_string()
}

/// Poll `GET /api/analysis/{id}` until the job is terminal.
pub async fn poll_until_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..200 {
        let json = body_json(get(app, &format!("/api/analysis/{job_id}")).await).await;
        if json["status"] != "pending" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}
