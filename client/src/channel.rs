//! The server-push event channel.
//!
//! One [`EventChannel`] owns at most one live stream task. The task connects,
//! decodes frames into [`ChannelEvent`]s and forwards them over a bounded queue
//! to the single [`Subscription`]. On any failure it reports
//! [`ChannelState::Retrying`], waits the fixed retry delay and connects again.
//! It never gives up.
//!
//! Every event is tagged with the generation of the connection that produced
//! it. `connect()` bumps the generation after tearing down the previous task,
//! and the subscription drops anything older, so events from a superseded
//! connection can never interleave with the new one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use scriptdeck_types::{ChannelEvent, ChannelState, LogRecord, StatusPayload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::error::ChannelError;
use crate::sse::{SseDecoder, SseFrame};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Raw byte chunks of an open event stream.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChannelError>> + Send>>;

/// Opens the underlying byte stream. Abstracted so the channel can run
/// against scripted streams in tests.
pub trait Connector: Send + Sync + 'static {
    fn open(&self) -> impl Future<Output = Result<FrameStream, ChannelError>> + Send;
}

/// `GET /api/logs/stream` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    url: Url,
}

impl HttpConnector {
    #[must_use]
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for HttpConnector {
    fn open(&self) -> impl Future<Output = Result<FrameStream, ChannelError>> + Send {
        let request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        async move {
            let response = request.send().await.map_err(ChannelError::Connect)?;
            let status = response.status();
            if !status.is_success() {
                return Err(ChannelError::Status(status));
            }
            let chunks = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChannelError::Stream));
            Ok(Box::pin(chunks) as FrameStream)
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Connection lifecycle without any IO.
///
/// Time is passed in explicitly so transitions can be driven with fabricated
/// instants. At most one retry deadline exists at a time.
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    retry_delay: Duration,
    retry_at: Option<Instant>,
    failures: u64,
}

impl ChannelMachine {
    #[must_use]
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: ChannelState::Connecting,
            retry_delay,
            retry_at: None,
            failures: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    #[must_use]
    pub fn pending_retry(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Consecutive failures since the last successful open.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn connecting(&mut self) {
        self.retry_at = None;
        self.state = ChannelState::Connecting;
    }

    pub fn opened(&mut self) {
        self.retry_at = None;
        self.failures = 0;
        self.state = ChannelState::Open;
    }

    /// Record a failure and return when the next attempt is due.
    ///
    /// A failure while a retry is already pending keeps the existing deadline.
    pub fn failed(&mut self, now: Instant) -> Instant {
        if let Some(deadline) = self.retry_at {
            return deadline;
        }
        self.failures += 1;
        self.state = ChannelState::Retrying;
        let deadline = now + self.retry_delay;
        self.retry_at = Some(deadline);
        deadline
    }

    /// Fire the pending retry if its deadline has passed.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        match self.retry_at {
            Some(deadline) if now >= deadline => {
                self.connecting();
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub retry_delay: Duration,
    /// A connection that delivers no bytes for this long is considered dead.
    pub idle_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct Tagged {
    generation: u64,
    event: ChannelEvent,
}

/// Receiving half handed to the single consumer.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Tagged>,
    generation: Arc<AtomicU64>,
}

impl Subscription {
    /// Next event from the current connection.
    ///
    /// Returns `None` only after the channel itself has been dropped.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            let tagged = self.rx.recv().await?;
            if tagged.generation == self.generation.load(Ordering::Acquire) {
                return Some(tagged.event);
            }
            tracing::trace!(
                stale = tagged.generation,
                "Discarding event from superseded connection"
            );
        }
    }
}

pub struct EventChannel<C: Connector> {
    connector: Arc<C>,
    config: ChannelConfig,
    generation: Arc<AtomicU64>,
    tx: mpsc::Sender<Tagged>,
    task: Option<JoinHandle<()>>,
}

impl<C: Connector> EventChannel<C> {
    /// Create an idle channel. Nothing is opened until [`connect`](Self::connect).
    pub fn new(connector: C, config: ChannelConfig) -> (Self, Subscription) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let generation = Arc::new(AtomicU64::new(0));
        let channel = Self {
            connector: Arc::new(connector),
            config,
            generation: Arc::clone(&generation),
            tx,
            task: None,
        };
        (channel, Subscription { rx, generation })
    }

    /// Open the stream, replacing any existing connection or pending retry.
    ///
    /// The previous stream task is fully torn down before the new one starts.
    pub async fn connect(&mut self) {
        self.shutdown().await;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, "Starting event stream");
        let worker = StreamWorker {
            connector: Arc::clone(&self.connector),
            tx: self.tx.clone(),
            generation,
            machine: ChannelMachine::new(self.config.retry_delay),
            idle_timeout: self.config.idle_timeout,
        };
        self.task = Some(tokio::spawn(worker.run()));
    }

    /// Close the stream and cancel any pending retry.
    pub async fn disconnect(&mut self) {
        self.shutdown().await;
        // Anything still queued belongs to the closed connection.
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancellation is the expected outcome.
            let _ = task.await;
        }
    }
}

impl<C: Connector> Drop for EventChannel<C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum PumpEnd {
    SubscriberGone,
    Failed(ChannelError),
}

struct StreamWorker<C> {
    connector: Arc<C>,
    tx: mpsc::Sender<Tagged>,
    generation: u64,
    machine: ChannelMachine,
    idle_timeout: Duration,
}

impl<C: Connector> StreamWorker<C> {
    async fn run(mut self) {
        loop {
            self.machine.connecting();
            if !self.emit(ChannelEvent::Status(ChannelState::Connecting)).await {
                return;
            }

            let failure = match self.connector.open().await {
                Ok(stream) => {
                    self.machine.opened();
                    tracing::info!(generation = self.generation, "Event stream open");
                    if !self.emit(ChannelEvent::Status(ChannelState::Open)).await {
                        return;
                    }
                    match self.pump(stream).await {
                        PumpEnd::SubscriberGone => return,
                        PumpEnd::Failed(e) => e,
                    }
                }
                Err(e) => e,
            };

            let deadline = self.machine.failed(Instant::now());
            tracing::warn!(
                error = %failure,
                generation = self.generation,
                failures = self.machine.failures(),
                retry_in_ms = deadline.saturating_duration_since(Instant::now()).as_millis(),
                "Event stream failed; reconnecting"
            );
            if !self.emit(ChannelEvent::Status(ChannelState::Retrying)).await {
                return;
            }
            while !self.machine.poll_retry(Instant::now()) {
                tokio::time::sleep_until(deadline).await;
            }
        }
    }

    async fn pump(&mut self, mut stream: FrameStream) -> PumpEnd {
        let mut decoder = SseDecoder::new();

        loop {
            let Ok(next) = tokio::time::timeout(self.idle_timeout, stream.next()).await else {
                return PumpEnd::Failed(ChannelError::IdleTimeout(self.idle_timeout));
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return PumpEnd::Failed(e),
                None => return PumpEnd::Failed(ChannelError::Closed),
            };
            if let Err(e) = decoder.extend(&chunk) {
                return PumpEnd::Failed(e);
            }

            while let Some(frame) = decoder.next_frame() {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(%e, "Dropping undecodable stream frame");
                        continue;
                    }
                };
                let Some(event) = decode_event(&frame) else {
                    continue;
                };
                if !self.emit(event).await {
                    return PumpEnd::SubscriberGone;
                }
            }
        }
    }

    async fn emit(&self, event: ChannelEvent) -> bool {
        let tagged = Tagged {
            generation: self.generation,
            event,
        };
        self.tx.send(tagged).await.is_ok()
    }
}

/// Map a frame to a typed event. Malformed and unknown frames yield `None`.
pub(crate) fn decode_event(frame: &SseFrame) -> Option<ChannelEvent> {
    match frame.event.as_str() {
        "log" => match serde_json::from_str::<LogRecord>(&frame.data) {
            Ok(record) => Some(ChannelEvent::Log(record)),
            Err(e) => {
                tracing::warn!(%e, event = "log", "Dropping malformed stream event");
                None
            }
        },
        "script_status" => match serde_json::from_str::<StatusPayload>(&frame.data) {
            Ok(payload) => Some(ChannelEvent::ScriptStatus(payload.scripts)),
            Err(e) => {
                tracing::warn!(%e, event = "script_status", "Dropping malformed stream event");
                None
            }
        },
        other => {
            tracing::debug!(event = other, "Ignoring unknown stream event");
            None
        }
    }
}
