use perfscope_core::analysis::AnalysisInput;
use perfscope_core::types::JobId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One unit of work handed from the submit handler to the runner.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub job_id: JobId,
    pub input: AnalysisInput,
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("analysis queue is full")]
    Full,

    #[error("analysis runner has stopped")]
    Closed,
}

/// Sending half of the bounded submit -> runner queue.
///
/// Enqueueing never waits: a full queue is reported immediately so the
/// submit handler stays independent of analysis duration.
#[derive(Clone)]
pub struct AnalysisQueue {
    sender: mpsc::Sender<AnalysisTask>,
}

impl AnalysisQueue {
    /// Create a queue and the receiver the runner consumes.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<AnalysisTask>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, task: AnalysisTask) -> Result<(), EnqueueError> {
        self.sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}
