// ── Runtime connection configuration ──
//
// These types describe *how* to reach a deployment server. They never
// touch disk: the CLI builds a `ControllerConfig` (usually through
// stackwatch-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use stackwatch_api::{ReconnectConfig, TlsMode, TransportConfig};
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for talking to a single server.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Server base URL (e.g., `http://localhost:8080`).
    pub url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    /// Backoff tuning for the event stream.
    pub reconnect: ReconnectConfig,
}

impl ControllerConfig {
    /// Defaults for everything but the server URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Transport settings shared by the REST and stream clients.
    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}
