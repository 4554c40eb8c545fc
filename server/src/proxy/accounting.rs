use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{body::Body, response::Response};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tracing::{error, warn};

use super::providers::{Adapter, Usage};
use crate::database::chat_log::{ChatLog, ChatLogCompletion};

const CLIENT_CHANNEL_CAPACITY: usize = 32;
// The accounting side never holds more than this many chunks in flight;
// with ~1 KiB SSE frames that is the 64 KiB bound on tee memory.
const TEE_CHANNEL_CAPACITY: usize = 64;

/// Timing and error state shared between the pump (writer) and the
/// accounting task (reader). The pump observes the stream; accounting
/// reads the final values once the tee closes.
#[derive(Debug, Default)]
pub(super) struct StreamStats {
    first_chunk_ms: AtomicI64,
    total_ms: AtomicI64,
    lossy: AtomicBool,
    error: Mutex<Option<String>>,
}

impl StreamStats {
    fn mark_first_chunk(&self, elapsed: Duration) {
        let ms = (elapsed.as_millis() as i64).max(1);
        let _ = self
            .first_chunk_ms
            .compare_exchange(0, ms, Ordering::Relaxed, Ordering::Relaxed);
    }

    fn mark_total(&self, elapsed: Duration) {
        let ms = (elapsed.as_millis() as i64).max(1);
        self.total_ms.store(ms, Ordering::Relaxed);
    }

    fn mark_lossy(&self) {
        self.lossy.store(true, Ordering::Relaxed);
    }

    fn set_error(&self, message: &str) {
        let mut slot = self.error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(message.to_string());
        }
    }

    pub fn first_chunk_ms(&self) -> Option<i64> {
        match self.first_chunk_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn total_ms(&self) -> Option<i64> {
        match self.total_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy.load(Ordering::Relaxed)
    }

    pub fn take_error(&self) -> Option<String> {
        self.error.lock().unwrap().take()
    }
}

/// Builds the client response for a successful upstream call and spawns the
/// tee: one detached task pumps upstream bytes to the client and the
/// accounting channel, a second one parses usage and finalizes the chat
/// log. Both outlive the request future, so a client disconnect never
/// loses the log update.
pub(super) fn stream_response(
    upstream: reqwest::Response,
    adapter: Adapter,
    is_stream: bool,
    log_id: i64,
    call_start: Instant,
) -> Response {
    let status = upstream.status();
    let stats = Arc::new(StreamStats::default());
    let (client_tx, mut client_rx) =
        mpsc::channel::<Result<Bytes, std::io::Error>>(CLIENT_CHANNEL_CAPACITY);
    let (tee_tx, tee_rx) = mpsc::channel::<Bytes>(TEE_CHANNEL_CAPACITY);

    tokio::spawn(pump_upstream(
        upstream.bytes_stream(),
        client_tx,
        tee_tx,
        call_start,
        stats.clone(),
    ));
    tokio::spawn(account_stream(adapter, tee_rx, is_stream, log_id, stats));

    let body = async_stream::stream! {
        while let Some(item) = client_rx.recv().await {
            yield item;
        }
    };

    let builder = Response::builder().status(status);
    let builder = if is_stream {
        builder
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
    } else {
        builder.header(CONTENT_TYPE, "application/json")
    };
    builder.body(Body::from_stream(body)).unwrap()
}

/// Forwards upstream chunks verbatim to the client channel (awaited, so
/// client back-pressure reaches the upstream) and mirrors them into the
/// tee with `try_send`: a lagging accounting reader costs token counts,
/// never client bytes. Returning drops both senders, which closes the
/// client stream and lets accounting finish; dropping the upstream stream
/// closes the provider connection.
async fn pump_upstream<S, E>(
    mut upstream: S,
    client_tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    tee_tx: mpsc::Sender<Bytes>,
    call_start: Instant,
    stats: Arc<StreamStats>,
) where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(item) = upstream.next().await {
        match item {
            Ok(chunk) => {
                stats.mark_first_chunk(call_start.elapsed());
                if let Err(mpsc::error::TrySendError::Full(_)) = tee_tx.try_send(chunk.clone()) {
                    stats.mark_lossy();
                }
                if client_tx.send(Ok(chunk)).await.is_err() {
                    stats.set_error("client disconnected before stream end");
                    break;
                }
            }
            Err(e) => {
                let message = format!("upstream stream error: {}", e);
                error!("{}", message);
                stats.set_error(&message);
                let _ = client_tx
                    .send(Err(std::io::Error::other(message)))
                    .await;
                break;
            }
        }
    }
    stats.mark_total(call_start.elapsed());
}

async fn account_stream(
    adapter: Adapter,
    mut tee_rx: mpsc::Receiver<Bytes>,
    was_stream: bool,
    log_id: i64,
    stats: Arc<StreamStats>,
) {
    let mut usage = adapter.parse_usage(&mut tee_rx, was_stream).await;
    if stats.is_lossy() {
        warn!(log_id, "accounting fell behind the client stream, dropping token counts");
        usage = Usage::default();
    }
    let completion = ChatLogCompletion {
        first_chunk_time: stats.first_chunk_ms(),
        total_time: stats.total_ms(),
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        error: stats.take_error(),
    };
    if let Err(e) = ChatLog::update_completion(log_id, &completion) {
        error!(log_id, "failed to finalize chat log: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, std::io::Error>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn client_receives_upstream_bytes_in_order() {
        let upstream = stream::iter(chunks(&["data: a\n\n", "data: b\n\n", "data: c\n\n"]));
        let (client_tx, mut client_rx) = mpsc::channel(8);
        let (tee_tx, mut tee_rx) = mpsc::channel(8);
        let stats = Arc::new(StreamStats::default());

        pump_upstream(upstream, client_tx, tee_tx, Instant::now(), stats.clone()).await;

        let mut client_bytes = Vec::new();
        while let Some(item) = client_rx.recv().await {
            client_bytes.extend_from_slice(&item.unwrap());
        }
        assert_eq!(client_bytes, b"data: a\n\ndata: b\n\ndata: c\n\n");

        let mut tee_bytes = Vec::new();
        while let Some(chunk) = tee_rx.recv().await {
            tee_bytes.extend_from_slice(&chunk);
        }
        assert_eq!(tee_bytes, client_bytes);

        assert!(stats.first_chunk_ms().is_some());
        assert!(stats.total_ms().is_some());
        assert!(!stats.is_lossy());
        assert!(stats.take_error().is_none());
    }

    #[tokio::test]
    async fn slow_accounting_reader_sets_lossy_flag_without_losing_client_bytes() {
        let upstream = stream::iter(chunks(&["1", "2", "3", "4"]));
        let (client_tx, mut client_rx) = mpsc::channel(8);
        // Accounting side bounded at one chunk and never read until the end.
        let (tee_tx, mut tee_rx) = mpsc::channel(1);
        let stats = Arc::new(StreamStats::default());

        pump_upstream(upstream, client_tx, tee_tx, Instant::now(), stats.clone()).await;

        let mut client_bytes = Vec::new();
        while let Some(item) = client_rx.recv().await {
            client_bytes.extend_from_slice(&item.unwrap());
        }
        assert_eq!(client_bytes, b"1234");
        assert!(stats.is_lossy());

        // Only the chunk that fit is on the tee.
        assert_eq!(tee_rx.recv().await, Some(Bytes::from("1")));
        assert_eq!(tee_rx.recv().await, None);
    }

    #[tokio::test]
    async fn client_disconnect_stops_pump_and_closes_tee() {
        let upstream = stream::iter(chunks(&["a", "b", "c"]));
        let (client_tx, client_rx) = mpsc::channel(1);
        let (tee_tx, mut tee_rx) = mpsc::channel(8);
        let stats = Arc::new(StreamStats::default());

        drop(client_rx);
        pump_upstream(upstream, client_tx, tee_tx, Instant::now(), stats.clone()).await;

        assert_eq!(
            stats.take_error().as_deref(),
            Some("client disconnected before stream end")
        );
        assert!(stats.total_ms().is_some());
        // The tee closed; accounting sees at most the bytes captured so far.
        while tee_rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn upstream_error_reaches_client_and_stats() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from("partial")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let (client_tx, mut client_rx) = mpsc::channel(8);
        let (tee_tx, _tee_rx) = mpsc::channel(8);
        let stats = Arc::new(StreamStats::default());

        pump_upstream(upstream, client_tx, tee_tx, Instant::now(), stats.clone()).await;

        assert_eq!(client_rx.recv().await.unwrap().unwrap(), Bytes::from("partial"));
        assert!(client_rx.recv().await.unwrap().is_err());
        assert!(stats
            .take_error()
            .is_some_and(|e| e.contains("connection reset")));
    }

    #[test]
    fn first_chunk_mark_is_latched() {
        let stats = StreamStats::default();
        stats.mark_first_chunk(Duration::from_millis(5));
        stats.mark_first_chunk(Duration::from_millis(500));
        assert_eq!(stats.first_chunk_ms(), Some(5));
    }

    #[test]
    fn zero_duration_first_chunk_still_registers() {
        let stats = StreamStats::default();
        stats.mark_first_chunk(Duration::from_millis(0));
        assert_eq!(stats.first_chunk_ms(), Some(1));
    }
}
