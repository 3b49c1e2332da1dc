// Editor plugin client
//
// The game-engine editor plugin exposes the test functions of the open
// project on a small local HTTP server. The dashboard reads them to seed
// the test-function picker.

use tracing::debug;
use url::Url;

use crate::client::{decode_json, join_segments, normalize_base_url};
use crate::error::Error;
use crate::models::TestFunctionRecord;
use crate::transport::TransportConfig;

/// Default address of the editor plugin's HTTP server.
pub const DEFAULT_EDITOR_URL: &str = "http://localhost:7109/";

/// Async client for the editor plugin.
pub struct EditorClient {
    http: reqwest::Client,
    base_url: Url,
}

impl EditorClient {
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// List the test functions exported by the editor.
    ///
    /// `GET {base}/tests`
    pub async fn list_tests(&self) -> Result<Vec<TestFunctionRecord>, Error> {
        let url = join_segments(&self.base_url, &["tests"]);
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        decode_json(resp).await
    }
}
