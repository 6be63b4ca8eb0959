// ── Reactive data store ──
//
// Concurrent stack storage with push-based change notification,
// reconciliation of fetch results and live events, and derived views.

mod collection;
mod data_store;
mod reconcile;
mod view;

pub use data_store::DataStore;
pub use view::{StackFilter, compare_paths, filter_and_sort};
