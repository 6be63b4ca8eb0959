// ── Central reactive data store ──
//
// Canonical stack map plus the small pieces of observable state around
// it: refresh summary, mirrored connection state, loading flag, last
// error, and view filters. Every mutation bumps a version that
// `StoreSubscription`s observe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use super::view::{self, StackFilter};
use crate::model::{ConnectionState, RefreshSnapshot, StackRecord, StackStatus, StatusTally};
use crate::stream::StoreSubscription;

/// Central reactive store for the stack mirror.
///
/// Thread-safe: reads are wait-free snapshot clones, writes are
/// serialized per collection. Constructed once and shared behind an
/// `Arc`; the event stream feeds it through its `EventSink` impl.
pub struct DataStore {
    pub(crate) stacks: EntityCollection<StackRecord>,
    pub(crate) refresh: watch::Sender<Option<Arc<RefreshSnapshot>>>,
    pub(crate) connection: watch::Sender<ConnectionState>,
    pub(crate) loading: watch::Sender<bool>,
    pub(crate) error: watch::Sender<Option<String>>,
    pub(crate) filter: watch::Sender<StackFilter>,
    pub(crate) last_loaded_at: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) version: watch::Sender<u64>,
}

impl DataStore {
    pub fn new() -> Self {
        let (refresh, _) = watch::channel(None);
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let (loading, _) = watch::channel(false);
        let (error, _) = watch::channel(None);
        let (filter, _) = watch::channel(StackFilter::default());
        let (last_loaded_at, _) = watch::channel(None);
        let (version, _) = watch::channel(0u64);

        Self {
            stacks: EntityCollection::new(),
            refresh,
            connection,
            loading,
            error,
            filter,
            last_loaded_at,
            version,
        }
    }

    // ── Canonical map reads ──────────────────────────────────────────

    /// All stacks, in no particular order (cheap `Arc` clone).
    pub fn stacks(&self) -> Arc<Vec<Arc<StackRecord>>> {
        self.stacks.snapshot()
    }

    /// Point lookup by path. Absent paths yield `None`, never an error.
    pub fn get_stack(&self, path: &str) -> Option<Arc<StackRecord>> {
        self.stacks.get(path)
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Paths currently in the map, unordered.
    pub fn paths(&self) -> Vec<String> {
        self.stacks.keys()
    }

    // ── Derived views ────────────────────────────────────────────────

    /// Stacks matching the current filter, sorted by path.
    ///
    /// Recomputed on every call from the latest snapshot and filter.
    pub fn filtered_view(&self) -> Vec<Arc<StackRecord>> {
        let filter = self.filter.borrow().clone();
        view::filter_and_sort(&self.stacks.snapshot(), &filter)
    }

    /// Count per status over the whole map, ignoring filters.
    pub fn tally(&self) -> StatusTally {
        let snapshot = self.stacks.snapshot();
        StatusTally::from_records(snapshot.iter().map(Arc::as_ref))
    }

    // ── Refresh / connection / load state ────────────────────────────

    pub fn refresh_status(&self) -> Option<Arc<RefreshSnapshot>> {
        self.refresh.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn is_reconnecting(&self) -> bool {
        self.connection_state() == ConnectionState::Reconnecting
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Message from the most recent failed initial load, if the last
    /// load failed.
    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    /// When the last successful initial load completed. After a failed
    /// load the map is kept, so this tells consumers how stale it may be.
    pub fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        *self.last_loaded_at.borrow()
    }

    // ── Filters ──────────────────────────────────────────────────────

    pub fn filter(&self) -> StackFilter {
        self.filter.borrow().clone()
    }

    /// Restrict the view to one status, or clear with `None`.
    pub fn set_filter_status(&self, status: Option<StackStatus>) {
        let changed = self.filter.send_if_modified(|f| {
            let changed = f.status != status;
            f.status = status;
            changed
        });
        if changed {
            self.bump_version();
        }
    }

    /// Restrict the view to paths containing `query` (case-insensitive).
    /// An empty query clears the search.
    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        let changed = self.filter.send_if_modified(|f| {
            if f.query == query {
                false
            } else {
                f.query = query;
                true
            }
        });
        if changed {
            self.bump_version();
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Notified after every mutation. Drop the handle to unsubscribe.
    pub fn subscribe(&self) -> StoreSubscription {
        StoreSubscription::new(self.version.subscribe())
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn subscribe_refresh(&self) -> watch::Receiver<Option<Arc<RefreshSnapshot>>> {
        self.refresh.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Internal setters ─────────────────────────────────────────────

    pub(crate) fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        if self.loading.send_if_modified(|l| std::mem::replace(l, loading) != loading) {
            self.bump_version();
        }
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        self.error.send_replace(error);
        self.bump_version();
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        if self.connection.send_if_modified(|c| std::mem::replace(c, state) != state) {
            self.bump_version();
        }
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
