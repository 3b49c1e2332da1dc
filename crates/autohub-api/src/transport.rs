// Shared transport configuration for building reqwest::Client instances.
//
// The REST, editor, and event-stream clients share TLS, timeout, and
// token settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Header the hub reads access tokens from.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

const USER_AGENT: &str = concat!("autohub/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode (api-level mirror of core's TlsVerification).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed hubs on a lab network).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Total request timeout for request/response calls.
    pub timeout: Duration,
    /// Connect timeout, also the only bound applied to streaming clients.
    pub connect_timeout: Duration,
    /// Project access token sent as `X-Auth-Token`.
    pub auth_token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            auth_token: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for request/response calls.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()?
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Build a `reqwest::Client` for long-lived streams.
    ///
    /// A total request timeout would cut the event stream off mid-body,
    /// so only the connect timeout applies here.
    pub fn build_streaming_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()?
            .build()
            .map_err(|e| Error::Tls(format!("failed to build streaming client: {e}")))
    }

    /// Attach an access token.
    pub fn with_auth_token(mut self, token: SecretString) -> Self {
        self.auth_token = Some(token);
        self
    }

    fn builder(&self) -> Result<reqwest::ClientBuilder, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .default_headers(self.default_headers()?);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        Ok(builder)
    }

    fn default_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = self.auth_token {
            let mut value = HeaderValue::from_str(token.expose_secret()).map_err(|_| {
                Error::InvalidHeader {
                    header: AUTH_TOKEN_HEADER,
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTH_TOKEN_HEADER, value);
        }
        Ok(headers)
    }
}
