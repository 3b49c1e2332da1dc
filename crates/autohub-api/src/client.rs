// Hub REST client
//
// Wraps `reqwest::Client` with project-scoped URL construction and the
// hub's `{"error": "..."}` failure envelope. Only the reads the
// dashboard state core consumes live here; CRUD calls belong to the
// form layer.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{DeviceRecord, ErrorBody};
use crate::transport::TransportConfig;

/// Async client for the hub's REST API.
///
/// `base_url` is the API root, e.g. `http://hub.local:8002/api/`.
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HubClient {
    /// Build a client from a transport config.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages headers).
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// List the devices of a project, optionally restricted to one
    /// platform code.
    ///
    /// `GET {base}/{project}/devices[?platform=P]`
    pub async fn list_devices(
        &self,
        project: &str,
        platform: Option<u32>,
    ) -> Result<Vec<DeviceRecord>, Error> {
        let url = join_segments(&self.base_url, &[project, "devices"]);
        let params: Vec<(&str, String)> = platform
            .map(|p| vec![("platform", p.to_string())])
            .unwrap_or_default();
        self.get_with_params(url, &params).await
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        debug!("GET {url} params={params:?}");
        let resp = self.http.get(url).query(params).send().await?;
        decode_json(resp).await
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

/// Parse a base URL and make sure it ends with `/` so joins append.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Append percent-encoded path segments to a base URL.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Base URLs from `normalize_base_url` always have a hierarchical path.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Turn a response into `T`, mapping non-2xx into [`Error::Api`].
pub(crate) async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| body.clone());
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
