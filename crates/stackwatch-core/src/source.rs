// ── Fetch collaborators ──
//
// The store loads from anything that can produce the two initial
// payloads. `ApiClient` is the production implementation; tests
// substitute in-memory sources.

use std::future::Future;

use stackwatch_api::{ApiClient, Error, RefreshSnapshot, StackRecord};

/// One-shot source of the full stack list and the refresh summary.
pub trait StackSource: Sync {
    /// Every stack the server currently tracks.
    fn fetch_stacks(&self) -> impl Future<Output = Result<Vec<StackRecord>, Error>> + Send;

    /// The most recent refresh summary.
    fn fetch_refresh_status(&self) -> impl Future<Output = Result<RefreshSnapshot, Error>> + Send;
}

impl StackSource for ApiClient {
    fn fetch_stacks(&self) -> impl Future<Output = Result<Vec<StackRecord>, Error>> + Send {
        self.list_stacks()
    }

    fn fetch_refresh_status(&self) -> impl Future<Output = Result<RefreshSnapshot, Error>> + Send {
        self.refresh_status()
    }
}
