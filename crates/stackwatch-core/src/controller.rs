// ── Controller abstraction ──
//
// Bootstrap coordinator: owns the REST client, the event stream, and the
// DataStore the stream feeds. The initial fetch and the stream are started
// independently and race; whichever lands later wins.

use std::sync::Arc;

use stackwatch_api::{ApiClient, EventSink, EventStreamClient};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{
    ConnectionState, ContainerInfo, RefreshSnapshot, StackRecord, StackStatus, StatusTally,
};
use crate::store::DataStore;
use crate::stream::StoreSubscription;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Construct once per
/// process, call [`start()`](Self::start), and [`shutdown()`](Self::shutdown)
/// before exit.
///
/// Only the initial load and the event stream write the stack map. The
/// store itself is not reachable from outside:
///
/// ```compile_fail
/// fn rewrite(controller: &stackwatch_core::Controller) {
///     let _ = controller.store();
/// }
/// ```
///
/// and its reconciliation methods are crate-private:
///
/// ```compile_fail
/// use stackwatch_core::{DataStore, StackRecord, StackStatus};
///
/// let store = DataStore::new();
/// store.apply_upsert(StackRecord::new("rogue", "dc.yml", "h", StackStatus::Synced));
/// ```
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<DataStore>,
    api: ApiClient,
    stream: EventStreamClient,
}

impl Controller {
    /// Build the clients and an empty store. Does NOT connect: call
    /// [`start()`](Self::start) or [`connect_stream()`](Self::connect_stream).
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let api = ApiClient::new(config.url.clone(), &transport)?;
        let events_url = api.events_url()?;
        let stream_http = transport.build_stream_client()?;

        let store = Arc::new(DataStore::new());
        let sink: Arc<dyn EventSink> = store.clone();
        let stream =
            EventStreamClient::new(stream_http, events_url, config.reconnect.clone(), sink);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                api,
                stream,
            }),
        })
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the event stream and run the initial load.
    ///
    /// The stream connects in the background; this resolves when the
    /// load finishes. A load failure is recorded in the store and also
    /// returned. The stream keeps running either way.
    pub async fn start(&self) -> Result<(), CoreError> {
        info!(url = %self.inner.config.url, "starting");
        self.connect_stream();
        self.load_initial().await
    }

    /// Fetch everything once and install it in the store.
    pub async fn load_initial(&self) -> Result<(), CoreError> {
        self.inner.store.load_initial(&self.inner.api).await
    }

    /// Tear down any existing stream worker, then open a fresh one.
    pub fn connect_stream(&self) {
        self.inner.stream.close();
        self.inner.stream.connect();
        debug!(url = %self.inner.stream.url(), "event stream started");
    }

    /// Close the event stream. The store keeps its contents.
    pub fn shutdown(&self) {
        self.inner.stream.close();
        info!("event stream closed");
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Ask the server to re-read its source of truth. The result arrives
    /// later as a refresh-status event.
    pub async fn trigger_refresh(&self) -> Result<(), CoreError> {
        self.inner.api.trigger_refresh().await?;
        info!("refresh requested");
        Ok(())
    }

    /// Containers belonging to one stack.
    pub async fn list_containers(&self, path: &str) -> Result<Vec<ContainerInfo>, CoreError> {
        self.inner.api.list_containers(path).await.map_err(|e| {
            if e.is_not_found() {
                CoreError::StackNotFound { path: path.into() }
            } else {
                e.into()
            }
        })
    }

    pub fn set_filter_status(&self, status: Option<StackStatus>) {
        self.inner.store.set_filter_status(status);
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.inner.store.set_search_query(query);
    }

    // ── Read accessors ───────────────────────────────────────────────

    pub fn filtered_view(&self) -> Vec<Arc<StackRecord>> {
        self.inner.store.filtered_view()
    }

    pub fn tally(&self) -> StatusTally {
        self.inner.store.tally()
    }

    pub fn get_stack(&self, path: &str) -> Option<Arc<StackRecord>> {
        self.inner.store.get_stack(path)
    }

    pub fn refresh_status(&self) -> Option<Arc<RefreshSnapshot>> {
        self.inner.store.refresh_status()
    }

    /// Connection state as reported by the stream client.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.stream.state()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.stream.subscribe_state()
    }

    /// Whether the store's mirror of the stream state reads `Connected`.
    pub fn is_connected(&self) -> bool {
        self.inner.store.is_connected()
    }

    /// Whether the store's mirror of the stream state reads `Reconnecting`.
    pub fn is_reconnecting(&self) -> bool {
        self.inner.store.is_reconnecting()
    }

    /// Refresh summary updates, from the initial load and the stream.
    pub fn subscribe_refresh(&self) -> watch::Receiver<Option<Arc<RefreshSnapshot>>> {
        self.inner.store.subscribe_refresh()
    }

    /// When the last successful initial load finished.
    pub fn last_loaded_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.inner.store.last_loaded_at()
    }

    /// Reconnects scheduled since the stream last opened.
    pub fn retry_count(&self) -> u32 {
        self.inner.stream.retry_count()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.store.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.store.error()
    }

    pub fn subscribe(&self) -> StoreSubscription {
        self.inner.store.subscribe()
    }
}
