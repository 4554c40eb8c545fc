use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::database::chat_log::{ChatLog, NewChatLog};

/// Per-request buffered writer for failed-attempt logs. The dispatch loop
/// sends records and moves on; a single background task drains them to the
/// store. `finish` closes the channel and joins the writer, so no buffered
/// record is lost when the request returns early.
pub(super) struct ChatLogSink {
    tx: mpsc::Sender<NewChatLog>,
    writer: JoinHandle<()>,
}

impl ChatLogSink {
    pub fn spawn(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<NewChatLog>(capacity.max(1));
        let writer = tokio::spawn(async move {
            while let Some(log) = rx.recv().await {
                if let Err(e) = ChatLog::insert(&log) {
                    error!("failed to save chat log: {:?}", e);
                }
            }
        });
        Self { tx, writer }
    }

    pub async fn emit(&self, log: NewChatLog) {
        if self.tx.send(log).await.is_err() {
            error!("chat log writer is gone, dropping record");
        }
    }

    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.writer.await {
            error!("chat log writer task failed: {}", e);
        }
    }
}

/// Records the attempt that was in flight if the client hangs up and the
/// request future is dropped mid-call. Armed around the upstream call,
/// disarmed once the outcome has been classified.
pub(super) struct CancelLogGuard {
    log: Option<NewChatLog>,
}

impl CancelLogGuard {
    pub fn arm(log: NewChatLog) -> Self {
        Self { log: Some(log) }
    }

    pub fn disarm(&mut self) {
        self.log = None;
    }
}

impl Drop for CancelLogGuard {
    fn drop(&mut self) {
        if let Some(log) = self.log.take() {
            warn!(
                model = %log.name, provider = %log.provider_name,
                "request cancelled by client during upstream call"
            );
            tokio::spawn(async move {
                let log = log.with_error("request cancelled by client".to_string());
                if let Err(e) = ChatLog::insert(&log) {
                    error!("failed to save cancelled chat log: {:?}", e);
                }
            });
        }
    }
}
