use thiserror::Error;

/// Top-level error type for the `autohub-api` crate.
///
/// Covers every failure mode of the hub surfaces this crate talks to:
/// the REST API, the editor plugin, and the server-sent event stream.
/// `autohub-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Header value rejected while building the client (e.g. a token with
    /// control characters).
    #[error("Invalid header value for {header}")]
    InvalidHeader { header: &'static str },

    // ── HTTP status ─────────────────────────────────────────────────
    /// Non-success response from the hub. `message` is the server-provided
    /// error text when the body carries one, else the raw body.
    #[error("Hub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The event stream handshake failed (bad status or content type).
    #[error("Event stream connection failed: {0}")]
    EventStreamConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::EventStreamConnect(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the underlying request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}
