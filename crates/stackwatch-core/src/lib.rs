// stackwatch-core: Reactive data layer between stackwatch-api and consumers (CLI).

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, TlsVerification};
pub use controller::Controller;
pub use error::CoreError;
pub use source::StackSource;
pub use store::{DataStore, StackFilter};
pub use stream::StoreSubscription;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConnectionState, ContainerInfo, ReconnectConfig, RefreshSnapshot, RefreshState, StackRecord,
    StackStatus, StatusTally,
};
