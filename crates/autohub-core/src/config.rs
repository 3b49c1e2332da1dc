// ── Runtime connection configuration ──
//
// These types describe *how* to reach a hub and its editor plugin.
// They carry the API token and connection tuning, but never touch disk.
// Callers construct a `HubConfig` (usually via `autohub-config`) and hand it in.

use std::time::Duration;

use autohub_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::sync::ReconnectConfig;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed lab hubs).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one hub project.
///
/// Built by the embedding application, passed to `Hub`. Core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// API root (e.g., `http://hub.local:8002/api/`).
    pub url: Url,
    /// Project identifier used in every device path.
    pub project: String,
    /// Editor plugin address. `None` disables the test-function fetch.
    pub editor_url: Option<Url>,
    /// Token sent as `X-Auth-Token`, if the hub requires one.
    pub api_token: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout; also bounds universe fetches.
    pub timeout: Duration,
    /// Subscribe to the event stream for live device status.
    pub live_updates: bool,
    /// Reconnect policy for the live subscription. `None` = stay
    /// disconnected after the stream ends.
    pub reconnect: Option<ReconnectConfig>,
}

impl HubConfig {
    /// Config with defaults for everything except the address and project.
    pub fn new(url: Url, project: impl Into<String>) -> Self {
        Self {
            url,
            project: project.into(),
            editor_url: None,
            api_token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            live_updates: true,
            reconnect: Some(ReconnectConfig::default()),
        }
    }

    /// Transport settings shared by every client built from this config.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
            auth_token: self.api_token.clone(),
            ..TransportConfig::default()
        }
    }
}
