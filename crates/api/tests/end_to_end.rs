//! Drives the real HTTP client and poller against a served app.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use perfscope_api::engine::{Analyzer, AnalyzerError};
use perfscope_client::{AnalysisClient, PollError, PollState, Poller, PollerConfig};
use perfscope_core::analysis::{AnalysisInput, Device, SubmitAnalysis};
use perfscope_core::report::AnalysisResult;
use tokio_util::sync::CancellationToken;

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: &common::TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn poll_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(20),
        max_attempts: 100,
    }
}

struct BrokenAnalyzer;

#[async_trait]
impl Analyzer for BrokenAnalyzer {
    async fn analyze(&self, _input: &AnalysisInput) -> Result<AnalysisResult, AnalyzerError> {
        panic!("injected analyzer fault");
    }
}

#[tokio::test]
async fn submitted_analysis_completes_with_four_scores() {
    let app = common::spawn_app();
    let client = AnalysisClient::new(serve(&app).await);
    let poller = Poller::new(client, poll_config(), CancellationToken::new());

    let request = SubmitAnalysis {
        url: "https://example.com".to_string(),
        device: Some(Device::Desktop),
    };
    let result = poller.run(&request).await.unwrap();

    assert_eq!(poller.state(), PollState::Succeeded);
    assert_eq!(result.analyzed_url, "https://example.com");
    assert_eq!(result.device, Device::Desktop);
    assert_eq!(result.scores.values().len(), 4);
    assert!(result.scores.is_within_range());
}

#[tokio::test]
async fn runner_failure_reaches_the_poller_as_job_failure() {
    let app = common::spawn_app_with(Arc::new(BrokenAnalyzer));
    let client = AnalysisClient::new(serve(&app).await);
    let poller = Poller::new(client, poll_config(), CancellationToken::new());

    let request = SubmitAnalysis {
        url: "https://example.com".to_string(),
        device: None,
    };
    let err = poller.run(&request).await.unwrap_err();

    assert_matches!(err, PollError::JobFailed(ref msg) if !msg.is_empty());
    assert_eq!(poller.state(), PollState::Failed);
}

#[tokio::test]
async fn invalid_submit_never_starts_polling() {
    let app = common::app_without_runner(4);
    let client = AnalysisClient::new(serve(&app).await);
    let poller = Poller::new(client, poll_config(), CancellationToken::new());

    let request = SubmitAnalysis {
        url: "not-a-url".to_string(),
        device: None,
    };
    let err = poller.run(&request).await.unwrap_err();

    assert_matches!(
        err,
        PollError::Submit(perfscope_client::ClientError::Api { status: 400, .. })
    );
    assert_eq!(poller.state(), PollState::Failed);
}

#[tokio::test]
async fn poller_times_out_on_a_job_that_never_finishes() {
    let app = common::app_without_runner(4);
    let client = AnalysisClient::new(serve(&app).await);
    let config = PollerConfig {
        interval: Duration::from_millis(5),
        max_attempts: 3,
    };
    let poller = Poller::new(client.clone(), config, CancellationToken::new());

    let request = SubmitAnalysis {
        url: "https://example.com".to_string(),
        device: None,
    };
    let err = poller.run(&request).await.unwrap_err();
    assert_matches!(err, PollError::TimedOut { attempts: 3 });

    // Giving up is client-side only; the job itself is untouched.
    let jobs = client.recent(10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(!jobs[0].is_terminal());
}
