//! Live event stream with auto-reconnect.
//!
//! [`EventStreamClient`] owns at most one subscription to the server's
//! `text/event-stream` endpoint. Each frame is decoded into a typed
//! [`StreamEvent`] and handed to an [`EventSink`] in arrival order; frames
//! that fail to decode are dropped without touching the connection state.
//!
//! Connection state machine:
//!
//! ```text
//! Disconnected --connect()--> (open) --> Connected
//! Connected/any --transport error, retries < max--> Reconnecting --delay--> (open)
//! Connected/any --transport error, retries >= max--> Disconnected (terminal until connect())
//! any --close()--> Disconnected
//! ```
//!
//! `delay = min(initial * 2^retries, max)`; the retry counter resets only
//! when a connection opens.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stackwatch_api::{EventStreamClient, ReconnectConfig};
//!
//! let client = EventStreamClient::new(http, events_url, ReconnectConfig::default(), Arc::new(sink));
//! client.connect();
//! // ... later
//! client.close();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::sse::{SseFrame, SseParser};
use crate::types::{RefreshSnapshot, StackRecord};

// ── Event names on the wire ──────────────────────────────────────────

pub const EVENT_STACK_SNAPSHOT: &str = "stack.snapshot";
pub const EVENT_STACK_UPSERT: &str = "stack.upsert";
pub const EVENT_STACK_DELETE: &str = "stack.delete";
pub const EVENT_REFRESH_STATUS: &str = "refresh.status";

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state of the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    #[default]
    Disconnected,
}

// ── StreamEvent / EventSink ──────────────────────────────────────────

/// A decoded push event. Payloads are forwarded verbatim; no business
/// validation happens at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Full authoritative record list.
    Snapshot(Vec<StackRecord>),
    /// One record to insert or overwrite.
    Upsert(StackRecord),
    /// Path of a record to remove.
    Delete(String),
    /// New refresh summary.
    RefreshStatus(RefreshSnapshot),
}

impl StreamEvent {
    /// Wire name of this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => EVENT_STACK_SNAPSHOT,
            Self::Upsert(_) => EVENT_STACK_UPSERT,
            Self::Delete(_) => EVENT_STACK_DELETE,
            Self::RefreshStatus(_) => EVENT_REFRESH_STATUS,
        }
    }
}

/// Receiver of decoded events and connection-state transitions.
///
/// Called from the stream worker task, one call at a time, in arrival order.
/// Implementations must not block. No client lock is held during a call, so
/// a sink may query or close the client from inside `connection_changed`.
pub trait EventSink: Send + Sync + 'static {
    fn handle(&self, event: StreamEvent);

    /// Invoked once per actual state transition.
    fn connection_changed(&self, _state: ConnectionState) {}
}

#[derive(Deserialize)]
struct SnapshotPayload {
    #[serde(default)]
    records: Vec<StackRecord>,
}

#[derive(Deserialize)]
struct UpsertPayload {
    record: StackRecord,
}

#[derive(Deserialize)]
struct DeletePayload {
    path: String,
}

/// Decode one SSE frame. `Ok(None)` means the frame is not one of ours
/// (keepalive, unknown event name).
pub fn parse_event(frame: &SseFrame) -> Result<Option<StreamEvent>, Error> {
    let event = match frame.event_type.as_deref() {
        Some(EVENT_STACK_SNAPSHOT) => {
            StreamEvent::Snapshot(decode::<SnapshotPayload>(&frame.data)?.records)
        }
        Some(EVENT_STACK_UPSERT) => StreamEvent::Upsert(decode::<UpsertPayload>(&frame.data)?.record),
        Some(EVENT_STACK_DELETE) => StreamEvent::Delete(decode::<DeletePayload>(&frame.data)?.path),
        Some(EVENT_REFRESH_STATUS) => StreamEvent::RefreshStatus(decode(&frame.data)?),
        None | Some("") => return Ok(None),
        Some(unknown) => {
            tracing::debug!(event_type = %unknown, "unknown event type, ignoring");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn decode<T: DeserializeOwned>(data: &str) -> Result<T, Error> {
    serde_json::from_str(data).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: data.to_owned(),
    })
}

// ── ReconnectConfig / Backoff ────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Reconnections scheduled before giving up. Default: 50.
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: 50,
        }
    }
}

impl ReconnectConfig {
    /// `min(initial * 2^retries, max)`, saturating at `max` on overflow.
    pub fn delay_for(&self, retries: u32) -> Duration {
        2u32.checked_pow(retries)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Retry bookkeeping for the reconnect loop, free of any I/O.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    retries: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// Reconnects scheduled since the last successful open.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// A connection opened.
    pub fn reset(&mut self) {
        self.retries = 0;
    }

    /// A connection failed. Returns the delay before the next attempt, or
    /// `None` once the retry budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.config.max_retries {
            return None;
        }
        let delay = self.config.delay_for(self.retries);
        self.retries += 1;
        Some(delay)
    }
}

// ── EventStreamClient ────────────────────────────────────────────────

/// Handle to the live event stream.
///
/// [`connect`](Self::connect) and [`close`](Self::close) are synchronous and
/// must be called from within a Tokio runtime. Dropping the client closes
/// the stream.
pub struct EventStreamClient {
    shared: Arc<Shared>,
    active: ArcSwapOption<Worker>,
}

struct Shared {
    http: reqwest::Client,
    url: Url,
    sink: Arc<dyn EventSink>,
    state: watch::Sender<ConnectionState>,
    /// Guards retry bookkeeping and every state transition, so a worker
    /// that was cancelled can never publish after `close()` has.
    backoff: Mutex<Backoff>,
    /// Transitions recorded under the backoff lock, delivered to the sink
    /// after it is released.
    transitions: Mutex<VecDeque<ConnectionState>>,
    delivering: AtomicBool,
}

struct Worker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Worker {
    fn stop(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl EventStreamClient {
    /// Create a client in the `Disconnected` state. Nothing is spawned
    /// until [`connect`](Self::connect).
    ///
    /// `http` should have no overall request timeout
    /// (see [`TransportConfig::build_stream_client`](crate::TransportConfig::build_stream_client)).
    pub fn new(
        http: reqwest::Client,
        url: Url,
        reconnect: ReconnectConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                http,
                url,
                sink,
                state,
                backoff: Mutex::new(Backoff::new(reconnect)),
                transitions: Mutex::new(VecDeque::new()),
                delivering: AtomicBool::new(false),
            }),
            active: ArcSwapOption::empty(),
        }
    }

    /// Tear down any existing connection or pending reconnect, then open a
    /// new one in a background task.
    pub fn connect(&self) {
        self.close();

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            stream_loop(shared, task_cancel).await;
        });

        // A concurrent connect() may have stored its own worker in between.
        if let Some(stale) = self.active.swap(Some(Arc::new(Worker { cancel, task }))) {
            stale.stop();
        }
    }

    /// Cancel any pending reconnect, drop the active connection, and force
    /// the state to `Disconnected`. Safe to call repeatedly.
    pub fn close(&self) {
        if let Some(worker) = self.active.swap(None) {
            worker.stop();
        }
        {
            let _guard = self.shared.lock_backoff();
            self.shared.set_state(ConnectionState::Disconnected);
        }
        self.shared.deliver_transitions();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions. Only actual changes are published.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Reconnects scheduled since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.shared.lock_backoff().retries()
    }

    /// The endpoint this client subscribes to.
    pub fn url(&self) -> &Url {
        &self.shared.url
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        if let Some(worker) = self.active.swap(None) {
            worker.stop();
        }
    }
}

impl Shared {
    fn lock_backoff(&self) -> std::sync::MutexGuard<'_, Backoff> {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_transitions(&self) -> std::sync::MutexGuard<'_, VecDeque<ConnectionState>> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `next` if it differs from the current state and queue it for
    /// the sink. Callers hold the backoff lock and call
    /// [`deliver_transitions`](Self::deliver_transitions) once it is released.
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::debug!(state = %next, "event stream state changed");
            self.lock_transitions().push_back(next);
        }
    }

    /// Hand queued transitions to the sink in order, one deliverer at a
    /// time. A nested call (a sink closing the client) only queues; the
    /// outer loop picks its transition up.
    fn deliver_transitions(&self) {
        loop {
            if self.delivering.swap(true, Ordering::Acquire) {
                return;
            }
            loop {
                let next = self.lock_transitions().pop_front();
                let Some(state) = next else { break };
                self.sink.connection_changed(state);
            }
            self.delivering.store(false, Ordering::Release);
            // Something queued between the last pop and the flag reset.
            if self.lock_transitions().is_empty() {
                return;
            }
        }
    }

    fn mark_open(&self, cancel: &CancellationToken) {
        {
            let mut backoff = self.lock_backoff();
            if cancel.is_cancelled() {
                return;
            }
            backoff.reset();
            self.set_state(ConnectionState::Connected);
        }
        self.deliver_transitions();
    }

    /// Decide what follows a transport error. `None` means stop.
    fn schedule_reconnect(&self, cancel: &CancellationToken) -> Option<Duration> {
        let next = self.next_reconnect(cancel);
        self.deliver_transitions();
        next
    }

    fn next_reconnect(&self, cancel: &CancellationToken) -> Option<Duration> {
        let mut backoff = self.lock_backoff();
        if cancel.is_cancelled() {
            return None;
        }
        let attempt = backoff.retries();
        if let Some(delay) = backoff.next_delay() {
            self.set_state(ConnectionState::Reconnecting);
            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "waiting before reconnect"
            );
            Some(delay)
        } else {
            self.set_state(ConnectionState::Disconnected);
            tracing::error!(
                max_retries = attempt,
                "event stream reconnection limit reached, giving up"
            );
            None
        }
    }

    fn dispatch(&self, frame: &SseFrame, cancel: &CancellationToken) {
        match parse_event(frame) {
            Ok(Some(event)) => {
                if cancel.is_cancelled() {
                    return;
                }
                tracing::trace!(kind = event.kind(), id = ?frame.id, "event received");
                self.sink.handle(event);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    event_type = ?frame.event_type,
                    "dropping malformed event"
                );
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn stream_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut parser = SseParser::new();

    loop {
        parser.reset();

        let err = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&shared, &mut parser, &cancel) => match result {
                Ok(()) => Error::StreamClosed,
                Err(e) => e,
            },
        };
        tracing::warn!(error = %err, url = %shared.url, "event stream error");

        let Some(delay) = shared.schedule_reconnect(&cancel) else {
            break;
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("event stream worker exiting");
}

/// Open one connection and pump frames to the sink until it drops.
/// `Ok(())` means the server ended the body.
async fn connect_and_read(
    shared: &Shared,
    parser: &mut SseParser,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %shared.url, "connecting to event stream");

    let resp = shared
        .http
        .get(shared.url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Status {
            context: "Event stream rejected",
            status: status.as_u16(),
        });
    }

    shared.mark_open(cancel);
    tracing::info!("event stream connected");

    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let bytes = chunk?;
        for frame in parser.feed(&bytes)? {
            shared.dispatch(&frame, cancel);
        }
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
