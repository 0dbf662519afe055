use std::sync::Arc;

use tokio::sync::mpsc;

use super::{TranscriptionJob, TranscriptionRunner};

const PANIC_ERROR: &str = "internal error during transcription";

/// Receives queued jobs and runs each on its own tokio task, so a long
/// model load never holds up the next submission.
pub struct TranscriptionWorker {
    receiver: mpsc::Receiver<TranscriptionJob>,
    runner: Arc<TranscriptionRunner>,
}

impl TranscriptionWorker {
    pub fn new(receiver: mpsc::Receiver<TranscriptionJob>, runner: Arc<TranscriptionRunner>) -> Self {
        Self { receiver, runner }
    }

    pub async fn run(mut self) {
        tracing::info!("Transcription worker started");
        while let Some(job) = self.receiver.recv().await {
            tracing::debug!(task_id = %job.task_id, "Dispatching transcription job");
            tokio::spawn(supervise(Arc::clone(&self.runner), job));
        }
        tracing::info!("Transcription worker stopped: channel closed");
    }
}

/// Runs the job on a child task so a panic inside an engine still ends with
/// the task marked `Failed`.
async fn supervise(runner: Arc<TranscriptionRunner>, job: TranscriptionJob) {
    let task_id = job.task_id;
    let store = runner.task_store();

    match tokio::spawn(async move { runner.run(job).await }).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(task_id = %task_id, error = %e, "Transcription run failed"),
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Transcription run panicked");
            if let Err(e) = store.fail_task(task_id, PANIC_ERROR).await {
                tracing::error!(task_id = %task_id, error = %e, "Could not record panicked run");
            }
        }
    }
}
