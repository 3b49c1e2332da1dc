// ── Core error types ──
//
// User-facing errors from autohub-core. Consumers never see raw HTTP
// status codes or JSON parse failures: the `From<autohub_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Hub request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not connected to the hub")]
    NotConnected,

    #[error("A live status subscription is already active")]
    AlreadySubscribed,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    /// Pasted or received payload could not be understood.
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<autohub_api::Error> for CoreError {
    fn from(err: autohub_api::Error) -> Self {
        match err {
            autohub_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            autohub_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            autohub_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            autohub_api::Error::InvalidHeader { header } => CoreError::Config {
                message: format!("Invalid value for header {header}"),
            },
            autohub_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            autohub_api::Error::EventStreamConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Event stream connection failed: {reason}"),
            },
            autohub_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
