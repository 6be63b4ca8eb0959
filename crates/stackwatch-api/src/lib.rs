//! Async client for a stack deployment server.
//!
//! Two surfaces are covered:
//!
//! - **[`ApiClient`]** -- one-shot REST fetches (`/api/stacks`,
//!   `/api/refresh-status`, `/api/refresh`, container detail).
//! - **[`EventStreamClient`]** -- a single long-lived subscription to the
//!   server's `text/event-stream` endpoint with typed event parsing and
//!   exponential-backoff reconnection.
//!
//! Neither surface keeps any state about stacks. Parsed events are handed
//! verbatim to an [`EventSink`]; reconciliation lives in `stackwatch-core`.

pub mod client;
pub mod error;
pub mod sse;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use error::Error;
pub use stream::{
    Backoff, ConnectionState, EventSink, EventStreamClient, ReconnectConfig, StreamEvent,
};
pub use transport::{TlsMode, TransportConfig};
pub use types::{ContainerInfo, RefreshSnapshot, RefreshState, StackRecord, StackStatus};
