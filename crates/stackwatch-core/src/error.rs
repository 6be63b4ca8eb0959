// ── Core error types ──
//
// User-facing errors from stackwatch-core. The `From<stackwatch_api::Error>`
// impl translates transport-layer failures into domain variants while
// keeping the server-facing message intact, since that message is what
// the store records as its last error.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Server request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Stack not found: {path}")]
    StackNotFound { path: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("{message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// HTTP status carried by the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<stackwatch_api::Error> for CoreError {
    fn from(err: stackwatch_api::Error) -> Self {
        match err {
            stackwatch_api::Error::Transport(ref e) if e.is_timeout() => CoreError::Timeout,
            stackwatch_api::Error::Transport(ref e) if e.is_connect() => {
                CoreError::ConnectionFailed {
                    url: e
                        .url()
                        .map_or_else(|| "<unknown>".into(), ToString::to_string),
                    reason: e.to_string(),
                }
            }
            stackwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            stackwatch_api::Error::Tls(message) => CoreError::Config { message },
            other => CoreError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_server_message() {
        let err: CoreError = stackwatch_api::Error::Status {
            context: "Failed to fetch stacks",
            status: 500,
        }
        .into();
        assert_eq!(err.to_string(), "Failed to fetch stacks: 500");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn tls_error_maps_to_config() {
        let err: CoreError = stackwatch_api::Error::Tls("bad pem".into()).into();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn stream_closed_maps_to_api() {
        let err: CoreError = stackwatch_api::Error::StreamClosed.into();
        assert!(matches!(err, CoreError::Api { status: None, .. }));
    }
}
