// ── Reconciliation ──
//
// Applies fetch results and live events to the store. Snapshots replace
// the map wholesale, upserts overwrite one key, deletes are idempotent.
// No ordering is imposed between sources: the last applied write wins.

use std::sync::Arc;

use chrono::Utc;
use stackwatch_api::{ConnectionState, EventSink, StreamEvent};
use tracing::{debug, info, warn};

use super::DataStore;
use crate::error::CoreError;
use crate::model::{RefreshSnapshot, StackRecord};
use crate::source::StackSource;

/// Holds the loading flag up for its lifetime, clearing it on every exit
/// path including early returns and cancellation.
struct LoadingGuard<'a> {
    store: &'a DataStore,
}

impl<'a> LoadingGuard<'a> {
    fn begin(store: &'a DataStore) -> Self {
        store.set_loading(true);
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_loading(false);
    }
}

impl DataStore {
    /// Replace the map with exactly `records`, keyed by path.
    pub(crate) fn apply_snapshot(&self, records: Vec<StackRecord>) {
        let count = records.len();
        self.stacks
            .replace_all(records.into_iter().map(|r| (r.path.clone(), r)).collect());
        self.bump_version();
        debug!(count, "applied stack snapshot");
    }

    /// Insert or overwrite the entry at `record.path`.
    pub(crate) fn apply_upsert(&self, record: StackRecord) {
        let path = record.path.clone();
        let is_new = self.stacks.upsert(path.clone(), record);
        self.bump_version();
        debug!(%path, is_new, "applied stack upsert");
    }

    /// Remove the entry at `path`. Absent paths are a silent no-op.
    pub(crate) fn apply_delete(&self, path: &str) {
        if self.stacks.remove(path).is_some() {
            self.bump_version();
            debug!(%path, "applied stack delete");
        } else {
            debug!(%path, "delete for unknown stack ignored");
        }
    }

    /// Replace the refresh summary wholesale.
    pub(crate) fn apply_refresh_status(&self, snapshot: RefreshSnapshot) {
        debug!(
            revision = %snapshot.revision,
            status = %snapshot.refresh_status,
            "applied refresh status"
        );
        self.refresh.send_replace(Some(Arc::new(snapshot)));
        self.bump_version();
    }

    /// Fetch the stack list and refresh summary concurrently and install
    /// both.
    ///
    /// On failure the error message is recorded (replacing any previous
    /// one) and returned; the map and refresh summary are left as they
    /// were. The loading flag is cleared on every path out.
    pub async fn load_initial<S: StackSource>(&self, source: &S) -> Result<(), CoreError> {
        let _loading = LoadingGuard::begin(self);
        self.set_error(None);

        let (stacks, refresh) =
            tokio::join!(source.fetch_stacks(), source.fetch_refresh_status());

        match (stacks, refresh) {
            (Ok(stacks), Ok(refresh)) => {
                let count = stacks.len();
                self.apply_snapshot(stacks);
                self.apply_refresh_status(refresh);
                self.last_loaded_at.send_replace(Some(Utc::now()));
                info!(count, "initial load complete");
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                let err = CoreError::from(e);
                warn!(error = %err, "initial load failed");
                self.set_error(Some(err.to_string()));
                Err(err)
            }
        }
    }
}

// ── Event stream sink ────────────────────────────────────────────────

impl EventSink for DataStore {
    fn handle(&self, event: StreamEvent) {
        match event {
            StreamEvent::Snapshot(records) => self.apply_snapshot(records),
            StreamEvent::Upsert(record) => self.apply_upsert(record),
            StreamEvent::Delete(path) => self.apply_delete(&path),
            StreamEvent::RefreshStatus(snapshot) => self.apply_refresh_status(snapshot),
        }
    }

    fn connection_changed(&self, state: ConnectionState) {
        self.set_connection_state(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use stackwatch_api::{Error, RefreshState};

    use super::*;
    use crate::model::StackStatus;

    // ── Helpers ─────────────────────────────────────────────────────

    fn record(path: &str, status: StackStatus) -> StackRecord {
        StackRecord::new(path, "docker-compose.yml", format!("hash-{path}"), status)
    }

    fn refresh(revision: &str) -> RefreshSnapshot {
        RefreshSnapshot {
            revision: revision.into(),
            commit_message: None,
            git_ref: "main".into(),
            ref_type: "branch".into(),
            refreshed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            refresh_status: RefreshState::Completed,
            refresh_error: None,
        }
    }

    fn sorted_paths(store: &DataStore) -> Vec<String> {
        let mut paths = store.paths();
        paths.sort();
        paths
    }

    /// In-memory source; each fetch pops the next scripted response.
    struct FakeSource {
        stacks: Mutex<Vec<Result<Vec<StackRecord>, Error>>>,
        refresh: Mutex<Vec<Result<RefreshSnapshot, Error>>>,
    }

    impl FakeSource {
        fn new(
            stacks: Result<Vec<StackRecord>, Error>,
            refresh: Result<RefreshSnapshot, Error>,
        ) -> Self {
            Self {
                stacks: Mutex::new(vec![stacks]),
                refresh: Mutex::new(vec![refresh]),
            }
        }
    }

    impl StackSource for FakeSource {
        async fn fetch_stacks(&self) -> Result<Vec<StackRecord>, Error> {
            self.stacks.lock().unwrap().pop().unwrap()
        }

        async fn fetch_refresh_status(&self) -> Result<RefreshSnapshot, Error> {
            self.refresh.lock().unwrap().pop().unwrap()
        }
    }

    fn status_err(context: &'static str, status: u16) -> Error {
        Error::Status { context, status }
    }

    // ── Reconciliation ──────────────────────────────────────────────

    #[test]
    fn snapshot_replaces_unrelated_records() {
        let store = DataStore::new();
        store.apply_snapshot(vec![
            record("a", StackStatus::Synced),
            record("b", StackStatus::Synced),
            record("c", StackStatus::Synced),
        ]);
        store.apply_snapshot(vec![record("z", StackStatus::Failed)]);

        assert_eq!(sorted_paths(&store), vec!["z"]);
        assert_eq!(store.stacks().len(), 1);
    }

    #[test]
    fn upsert_touches_only_its_key() {
        let store = DataStore::new();
        store.apply_snapshot(vec![
            record("a", StackStatus::Synced),
            record("b", StackStatus::Synced),
        ]);
        store.apply_upsert(record("a", StackStatus::Deleting));
        store.apply_upsert(record("c", StackStatus::Missing));

        assert_eq!(store.get_stack("a").unwrap().status, StackStatus::Deleting);
        assert_eq!(store.get_stack("b").unwrap().status, StackStatus::Synced);
        assert_eq!(store.get_stack("c").unwrap().status, StackStatus::Missing);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn delete_absent_path_is_noop() {
        let store = DataStore::new();
        store.apply_upsert(record("a", StackStatus::Synced));
        let version = store.version();

        store.apply_delete("nope");
        assert_eq!(store.version(), version);
        assert_eq!(sorted_paths(&store), vec!["a"]);

        store.apply_delete("a");
        store.apply_delete("a");
        assert!(store.is_empty());
        assert!(store.get_stack("a").is_none());
    }

    #[test]
    fn refresh_status_replaced_wholesale() {
        let store = DataStore::new();
        let mut first = refresh("r1");
        first.commit_message = Some("initial".into());
        store.apply_refresh_status(first);
        store.apply_refresh_status(refresh("r2"));

        let current = store.refresh_status().unwrap();
        assert_eq!(current.revision, "r2");
        assert!(current.commit_message.is_none());
    }

    #[test]
    fn every_mutation_notifies_subscribers() {
        let store = DataStore::new();
        let mut sub = store.subscribe();

        store.apply_upsert(record("a", StackStatus::Synced));
        assert!(sub.has_changed());
        let v = tokio_test::block_on(sub.changed()).unwrap();
        assert_eq!(v, store.version());

        store.apply_delete("a");
        assert!(sub.has_changed());
    }

    #[test]
    fn sink_routes_events() {
        let store = DataStore::new();
        let sink: &dyn EventSink = &store;

        sink.handle(StreamEvent::Snapshot(vec![record("a", StackStatus::Synced)]));
        sink.handle(StreamEvent::Upsert(record("b", StackStatus::Syncing)));
        sink.handle(StreamEvent::Delete("a".into()));
        sink.handle(StreamEvent::RefreshStatus(refresh("r9")));
        sink.connection_changed(ConnectionState::Connected);

        assert_eq!(sorted_paths(&store), vec!["b"]);
        assert_eq!(store.refresh_status().unwrap().revision, "r9");
        assert!(store.is_connected());
    }

    /// Replays an operation sequence against a plain reference map and
    /// checks the store ends up identical.
    #[test]
    fn replay_matches_reference_map() {
        enum Op {
            Snapshot(Vec<StackRecord>),
            Upsert(StackRecord),
            Delete(&'static str),
        }

        let statuses = [
            StackStatus::Missing,
            StackStatus::Syncing,
            StackStatus::Synced,
            StackStatus::Deleting,
            StackStatus::Failed,
        ];
        let names = ["apps/api", "apps/web", "infra/db", "infra/cache", "tools/ci"];

        // Deterministic pseudo-random sequence (LCG).
        let mut seed: u64 = 0x5eed;
        let mut next = |bound: usize| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            usize::try_from(seed >> 33).unwrap() % bound
        };

        let mut ops = Vec::new();
        for _ in 0..500 {
            let op = match next(10) {
                0 => {
                    let n = next(names.len() + 1);
                    Op::Snapshot(
                        (0..n)
                            .map(|_| record(names[next(names.len())], statuses[next(5)]))
                            .collect(),
                    )
                }
                1..=5 => Op::Upsert(record(names[next(names.len())], statuses[next(5)])),
                _ => Op::Delete(names[next(names.len())]),
            };
            ops.push(op);
        }

        let store = DataStore::new();
        let mut reference: BTreeMap<String, StackRecord> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Snapshot(records) => {
                    reference = records.iter().map(|r| (r.path.clone(), r.clone())).collect();
                    store.apply_snapshot(records);
                }
                Op::Upsert(r) => {
                    reference.insert(r.path.clone(), r.clone());
                    store.apply_upsert(r);
                }
                Op::Delete(path) => {
                    reference.remove(path);
                    store.apply_delete(path);
                }
            }

            assert_eq!(sorted_paths(&store), reference.keys().cloned().collect::<Vec<_>>());
            for (path, expected) in &reference {
                assert_eq!(&*store.get_stack(path).unwrap(), expected);
            }
            let tally = store.tally();
            assert_eq!(tally.total(), reference.len());
        }
    }

    // ── Initial load ────────────────────────────────────────────────

    #[tokio::test]
    async fn load_initial_installs_both_payloads() {
        let store = DataStore::new();
        let source = FakeSource::new(
            Ok(vec![
                record("a", StackStatus::Synced),
                record("b", StackStatus::Failed),
            ]),
            Ok(refresh("abc")),
        );

        store.load_initial(&source).await.unwrap();

        let tally = store.tally();
        assert_eq!(tally.get(StackStatus::Synced), 1);
        assert_eq!(tally.get(StackStatus::Failed), 1);
        assert_eq!(tally.get(StackStatus::Syncing), 0);
        assert_eq!(tally.get(StackStatus::Missing), 0);
        assert_eq!(tally.get(StackStatus::Deleting), 0);
        assert_eq!(store.refresh_status().unwrap().revision, "abc");
        assert!(store.last_loaded_at().is_some());
        assert!(store.error().is_none());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn load_initial_failure_keeps_map_and_records_error() {
        let store = DataStore::new();
        store.apply_snapshot(vec![record("kept", StackStatus::Synced)]);
        store.apply_refresh_status(refresh("old"));

        let source = FakeSource::new(
            Err(status_err("Failed to fetch stacks", 500)),
            Ok(refresh("new")),
        );
        let err = store.load_initial(&source).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to fetch stacks: 500");
        assert_eq!(store.error().as_deref(), Some("Failed to fetch stacks: 500"));
        assert_eq!(sorted_paths(&store), vec!["kept"]);
        assert_eq!(store.refresh_status().unwrap().revision, "old");
        assert!(store.last_loaded_at().is_none());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn load_initial_refresh_failure_is_reported() {
        let store = DataStore::new();
        let source = FakeSource::new(
            Ok(vec![record("a", StackStatus::Synced)]),
            Err(status_err("Failed to fetch refresh status", 503)),
        );

        assert!(store.load_initial(&source).await.is_err());
        assert_eq!(
            store.error().as_deref(),
            Some("Failed to fetch refresh status: 503")
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn error_replaced_then_cleared() {
        let store = DataStore::new();

        let failing = FakeSource::new(
            Err(status_err("Failed to fetch stacks", 500)),
            Ok(refresh("x")),
        );
        let _ = store.load_initial(&failing).await;
        let failing = FakeSource::new(
            Err(status_err("Failed to fetch stacks", 502)),
            Ok(refresh("x")),
        );
        let _ = store.load_initial(&failing).await;
        assert_eq!(store.error().as_deref(), Some("Failed to fetch stacks: 502"));

        let ok = FakeSource::new(Ok(vec![]), Ok(refresh("y")));
        store.load_initial(&ok).await.unwrap();
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn loading_flag_observed_during_load() {
        let store = DataStore::new();
        let mut loading = store.subscribe_loading();
        let source = FakeSource::new(Ok(vec![]), Ok(refresh("x")));

        store.load_initial(&source).await.unwrap();

        // true then false coalesce into a single pending change ending at false.
        assert!(loading.has_changed().unwrap());
        assert!(!*loading.borrow_and_update());
    }
}
