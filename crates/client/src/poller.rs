//! Submit-then-poll state machine.
//!
//! A [`Poller`] submits an analysis (or picks up an existing job id) and
//! re-reads the job at a fixed interval until it observes a terminal status,
//! the attempt budget runs out, or its [`CancellationToken`] fires.
//!
//! ```text
//! Idle -> Submitting -> Polling{attempt} -> Succeeded | Failed | TimedOut
//!                  \-> Failed          any non-terminal -> Cancelled
//! ```
//!
//! Cancelling only stops this client from waiting. The job keeps running on
//! the server.

use std::time::Duration;

use async_trait::async_trait;
use perfscope_core::analysis::SubmitAnalysis;
use perfscope_core::job::{AnalysisJob, JobStatus};
use perfscope_core::report::AnalysisResult;
use perfscope_core::types::JobId;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{AnalysisClient, ClientError};

/// Where jobs are submitted and read back from.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn submit(&self, request: &SubmitAnalysis) -> Result<JobId, ClientError>;

    /// `Ok(None)` means the id is unknown to the server.
    async fn fetch(&self, job_id: JobId) -> Result<Option<AnalysisJob>, ClientError>;
}

#[async_trait]
impl JobSource for AnalysisClient {
    async fn submit(&self, request: &SubmitAnalysis) -> Result<JobId, ClientError> {
        AnalysisClient::submit(self, request).await
    }

    async fn fetch(&self, job_id: JobId) -> Result<Option<AnalysisJob>, ClientError> {
        AnalysisClient::fetch(self, job_id).await
    }
}

/// Interval and attempt ceiling. The client gives up after roughly
/// `interval * max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Submitting,
    Polling { job_id: JobId, attempt: u32 },
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::Failed | PollState::TimedOut | PollState::Cancelled
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The submit call itself failed; no job was polled.
    #[error("Failed to submit analysis: {0}")]
    Submit(#[source] ClientError),

    /// The server ran the analysis and it failed.
    #[error("Analysis failed: {0}")]
    JobFailed(String),

    /// The client stopped waiting. Says nothing about the server-side job.
    #[error("Analysis is taking too long, gave up after {attempts} polls")]
    TimedOut { attempts: u32 },

    #[error("Analysis job {0} not found")]
    NotFound(JobId),

    /// A poll request failed.
    #[error("Failed to fetch analysis status: {0}")]
    Transport(#[source] ClientError),

    #[error("Polling was cancelled")]
    Cancelled,
}

pub struct Poller<S> {
    source: S,
    config: PollerConfig,
    cancel: CancellationToken,
    state: watch::Sender<PollState>,
}

impl<S: JobSource> Poller<S> {
    pub fn new(source: S, config: PollerConfig, cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            source,
            config,
            cancel,
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Observe state changes, e.g. to drive a progress display.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Submit `request` and poll the new job to completion.
    pub async fn run(&self, request: &SubmitAnalysis) -> Result<AnalysisResult, PollError> {
        if self.cancel.is_cancelled() {
            return self.finish(PollState::Cancelled, Err(PollError::Cancelled));
        }

        self.set(PollState::Submitting);
        let submitted = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return self.finish(PollState::Cancelled, Err(PollError::Cancelled));
            }
            submitted = self.source.submit(request) => submitted,
        };

        match submitted {
            Ok(job_id) => {
                tracing::debug!(%job_id, url = %request.url, "Analysis submitted");
                self.watch(job_id).await
            }
            Err(e) => self.finish(PollState::Failed, Err(PollError::Submit(e))),
        }
    }

    /// Poll an already-submitted job until it reaches a terminal status.
    ///
    /// Each attempt waits `interval` and then issues one read. Stops on the
    /// first terminal observation. After `max_attempts` pending reads it
    /// times out without issuing another.
    pub async fn watch(&self, job_id: JobId) -> Result<AnalysisResult, PollError> {
        for attempt in 1..=self.config.max_attempts {
            self.set(PollState::Polling { job_id, attempt });

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                fetched = self.wait_then_fetch(job_id) => Some(fetched),
            };
            let Some(fetched) = fetched else {
                tracing::debug!(%job_id, attempt, "Polling cancelled");
                return self.finish(PollState::Cancelled, Err(PollError::Cancelled));
            };

            let job = match fetched {
                Ok(Some(job)) => job,
                Ok(None) => {
                    return self.finish(PollState::Failed, Err(PollError::NotFound(job_id)));
                }
                Err(e) => {
                    return self.finish(PollState::Failed, Err(PollError::Transport(e)));
                }
            };

            match job.status {
                JobStatus::Pending => {
                    tracing::trace!(%job_id, attempt, "Analysis still pending");
                }
                JobStatus::Completed => {
                    let outcome = job
                        .result
                        .ok_or_else(|| PollError::JobFailed("completed job has no result".into()));
                    let state = if outcome.is_ok() {
                        PollState::Succeeded
                    } else {
                        PollState::Failed
                    };
                    return self.finish(state, outcome);
                }
                JobStatus::Failed => {
                    let message = job
                        .error_message
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "unknown error".to_string());
                    return self.finish(PollState::Failed, Err(PollError::JobFailed(message)));
                }
            }
        }

        let attempts = self.config.max_attempts;
        tracing::warn!(%job_id, attempts, "Gave up waiting for analysis");
        self.finish(PollState::TimedOut, Err(PollError::TimedOut { attempts }))
    }

    async fn wait_then_fetch(&self, job_id: JobId) -> Result<Option<AnalysisJob>, ClientError> {
        tokio::time::sleep(self.config.interval).await;
        self.source.fetch(job_id).await
    }

    fn set(&self, state: PollState) {
        self.state.send_replace(state);
    }

    fn finish<T>(&self, state: PollState, outcome: Result<T, PollError>) -> Result<T, PollError> {
        self.set(state);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use chrono::Utc;
    use perfscope_core::analysis::{AnalysisInput, Device};
    use perfscope_core::job::JobUpdate;
    use perfscope_core::report::{Scores, WebVitals};
    use perfscope_core::types::new_job_id;

    use super::*;

    #[derive(Clone, Copy)]
    enum Reply {
        Pending,
        Completed,
        Failed(&'static str),
        Missing,
        Error,
    }

    /// Serves scripted replies, then `Pending` forever.
    struct FakeSource {
        job_id: JobId,
        submit_fails: bool,
        replies: Mutex<VecDeque<Reply>>,
        submits: Arc<AtomicU32>,
        fetches: Arc<AtomicU32>,
    }

    impl FakeSource {
        fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                job_id: new_job_id(),
                submit_fails: false,
                replies: Mutex::new(replies.into_iter().collect()),
                submits: Arc::new(AtomicU32::new(0)),
                fetches: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl JobSource for FakeSource {
        async fn submit(&self, _request: &SubmitAnalysis) -> Result<JobId, ClientError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if self.submit_fails {
                return Err(ClientError::Api {
                    status: 400,
                    body: r#"{"error":"url must be an absolute URL","code":"VALIDATION_ERROR"}"#
                        .to_string(),
                });
            }
            Ok(self.job_id)
        }

        async fn fetch(&self, job_id: JobId) -> Result<Option<AnalysisJob>, ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Pending);
            match reply {
                Reply::Missing => Ok(None),
                Reply::Error => Err(ClientError::Api {
                    status: 500,
                    body: "oops".to_string(),
                }),
                other => Ok(Some(job(job_id, other))),
            }
        }
    }

    fn input() -> AnalysisInput {
        AnalysisInput {
            url: "https://example.com".to_string(),
            device: Device::Desktop,
        }
    }

    fn report() -> AnalysisResult {
        AnalysisResult {
            analyzed_url: "https://example.com".to_string(),
            device: Device::Desktop,
            scores: Scores {
                performance: 90,
                accessibility: 95,
                best_practices: 100,
                seo: 88,
            },
            metrics: WebVitals {
                lcp_ms: 1800,
                fid_ms: 40,
                cls: 0.02,
                fcp_ms: 900,
                ttfb_ms: 200,
                tbt_ms: 120,
                speed_index_ms: 2100,
            },
            recommendations: Vec::new(),
            duration_ms: 3000,
        }
    }

    fn job(id: JobId, reply: Reply) -> AnalysisJob {
        let now = Utc::now();
        let mut job = AnalysisJob::new(input(), now);
        job.id = id;
        match reply {
            Reply::Completed => job.apply(JobUpdate::completed(report()), now).unwrap(),
            Reply::Failed(msg) => job.apply(JobUpdate::failed(msg), now).unwrap(),
            _ => {}
        }
        job
    }

    fn request() -> SubmitAnalysis {
        SubmitAnalysis {
            url: "https://example.com".to_string(),
            device: Some(Device::Desktop),
        }
    }

    fn fast(max_attempts: u32) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn pending_reads_are_retried_until_completed() {
        let source = FakeSource::new([Reply::Pending, Reply::Pending, Reply::Completed]);
        let fetches = Arc::clone(&source.fetches);
        let poller = Poller::new(source, fast(10), CancellationToken::new());

        let result = poller.run(&request()).await.unwrap();

        assert_eq!(result, report());
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        assert_eq!(poller.state(), PollState::Succeeded);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_without_another_poll() {
        let source = FakeSource::new([]);
        let fetches = Arc::clone(&source.fetches);
        let poller = Poller::new(source, fast(3), CancellationToken::new());

        let err = poller.run(&request()).await.unwrap_err();

        assert_matches!(err, PollError::TimedOut { attempts: 3 });
        assert_eq!(poller.state(), PollState::TimedOut);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_job_surfaces_its_error_message() {
        let source = FakeSource::new([Reply::Pending, Reply::Failed("Target unreachable: DNS")]);
        let fetches = Arc::clone(&source.fetches);
        let poller = Poller::new(source, fast(10), CancellationToken::new());

        let err = poller.run(&request()).await.unwrap_err();

        assert_matches!(err, PollError::JobFailed(ref msg) if msg == "Target unreachable: DNS");
        assert_eq!(poller.state(), PollState::Failed);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_job_is_not_polled_forever() {
        let source = FakeSource::new([Reply::Missing]);
        let job_id = source.job_id;
        let fetches = Arc::clone(&source.fetches);
        let poller = Poller::new(source, fast(10), CancellationToken::new());

        let err = poller.watch(job_id).await.unwrap_err();

        assert_matches!(err, PollError::NotFound(id) if id == job_id);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_error_stops_polling() {
        let source = FakeSource::new([Reply::Pending, Reply::Error]);
        let fetches = Arc::clone(&source.fetches);
        let poller = Poller::new(source, fast(10), CancellationToken::new());

        let err = poller.run(&request()).await.unwrap_err();

        assert_matches!(err, PollError::Transport(ClientError::Api { status: 500, .. }));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(poller.state(), PollState::Failed);
    }

    #[tokio::test]
    async fn submit_failure_never_polls() {
        let mut source = FakeSource::new([]);
        source.submit_fails = true;
        let fetches = Arc::clone(&source.fetches);
        let poller = Poller::new(source, fast(10), CancellationToken::new());

        let err = poller.run(&request()).await.unwrap_err();

        assert_matches!(err, PollError::Submit(ClientError::Api { status: 400, .. }));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(poller.state(), PollState::Failed);
    }

    #[tokio::test]
    async fn cancel_stops_waiting_between_polls() {
        let source = FakeSource::new([]);
        let job_id = source.job_id;
        let fetches = Arc::clone(&source.fetches);
        let cancel = CancellationToken::new();
        let config = PollerConfig {
            interval: Duration::from_secs(3600),
            max_attempts: 5,
        };
        let poller = Poller::new(source, config, cancel.clone());

        let (outcome, ()) = tokio::join!(poller.watch(job_id), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        assert_matches!(outcome, Err(PollError::Cancelled));
        assert_eq!(poller.state(), PollState::Cancelled);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_before_run_does_not_submit() {
        let source = FakeSource::new([]);
        let submits = Arc::clone(&source.submits);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let poller = Poller::new(source, fast(3), cancel);

        assert_matches!(poller.run(&request()).await, Err(PollError::Cancelled));
        assert_eq!(submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscribers_see_polling_progress() {
        let source = FakeSource::new([Reply::Pending, Reply::Completed]);
        let job_id = source.job_id;
        let poller = Poller::new(source, fast(10), CancellationToken::new());
        let mut states = poller.subscribe();
        assert_eq!(*states.borrow_and_update(), PollState::Idle);

        poller.watch(job_id).await.unwrap();

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), PollState::Succeeded);
        assert!(poller.state().is_terminal());
    }
}
