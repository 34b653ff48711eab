//! Progress as an event stream.
//!
//! The engine and the pipeline push percentages into a [`JobProgress`] sink,
//! which only forwards them over a channel. A single consumer task per job
//! applies them to the registry, so the job record has one writer.

use std::sync::Arc;

use prism_core::progress::ProgressSink;
use prism_core::types::JobId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::JobRegistry;

/// Progress sink handed to the work of one job.
///
/// Sending never blocks, so it is safe to call from the blocking render
/// thread.
#[derive(Debug, Clone)]
pub struct JobProgress {
    tx: mpsc::UnboundedSender<u8>,
    cancel: CancellationToken,
}

impl JobProgress {
    /// Create a sink and the receiving end of its event stream.
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<u8>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel }, rx)
    }
}

impl ProgressSink for JobProgress {
    fn report(&self, percent: u8) {
        // The consumer is gone once the job has ended; late updates are moot.
        let _ = self.tx.send(percent);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Spawn the consumer that applies `job_id`'s progress events.
///
/// The task ends when every sender has been dropped.
pub fn spawn_consumer(
    registry: Arc<JobRegistry>,
    job_id: JobId,
    mut rx: mpsc::UnboundedReceiver<u8>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(percent) = rx.recv().await {
            registry.update_progress(job_id, percent).await;
        }
    })
}
