//! Server-sent event stream from the hub.
//!
//! The hub publishes live notifications (device status changes, new test
//! runs, log entries) on a single `text/event-stream` endpoint, one SSE
//! event name per topic. [`EventStreamClient::connect`] performs the
//! handshake and returns a stream of decoded [`SseEvent`]s; topic
//! filtering and payload parsing are left to the consumer.
//!
//! There is no reconnect logic here: a stream that ends or errors is
//! finished, and the owner decides whether to open a new one.
//!
//! # Example
//!
//! ```rust,ignore
//! use autohub_api::{EventStreamClient, TransportConfig};
//! use futures_util::StreamExt;
//!
//! let client = EventStreamClient::new("http://hub.local:8002/api/", &TransportConfig::default())?;
//! let mut events = client.connect().await?;
//! while let Some(Ok(event)) = events.next().await {
//!     println!("{}: {}", event.event, event.data);
//! }
//! ```

use std::pin::Pin;

use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::client::{join_segments, normalize_base_url};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Event name used when a frame carries no `event:` field.
const DEFAULT_EVENT_NAME: &str = "message";

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// A boxed stream of decoded events. Ends after the first transport error.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, Error>> + Send>>;

// ── SseEvent ─────────────────────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (the hub uses it as the topic, e.g. `"devices"`).
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream, if the server sends ids.
    pub id: Option<String>,
}

// ── EventStreamClient ────────────────────────────────────────────────

/// Opens the hub's event stream.
pub struct EventStreamClient {
    http: reqwest::Client,
    url: Url,
}

impl EventStreamClient {
    /// `base_url` is the API root; the stream lives at `{base}/sse/`.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_streaming_client()?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base = normalize_base_url(base_url)?;
        Ok(Self {
            http,
            url: join_segments(&base, &["sse", ""]),
        })
    }

    /// The stream endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Perform the handshake and return the decoded event stream.
    ///
    /// The handshake succeeds only on a 2xx response whose content type
    /// is `text/event-stream`.
    pub async fn connect(&self) -> Result<EventStream, Error> {
        tracing::info!(url = %self.url, "Connecting to event stream");

        let resp = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, EVENT_STREAM_MIME)
            .send()
            .await
            .map_err(|e| Error::EventStreamConnect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::EventStreamConnect(format!("HTTP {status}")));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with(EVENT_STREAM_MIME) {
            return Err(Error::EventStreamConnect(format!(
                "unexpected content type '{content_type}'"
            )));
        }

        tracing::info!("Event stream connected");

        let mut body = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.feed(&bytes) {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Event stream read failed");
                        yield Err(Error::Transport(e));
                        break;
                    }
                }
            }
            tracing::debug!("Event stream ended");
        };

        Ok(Box::pin(stream))
    }
}

// ── SseDecoder ───────────────────────────────────────────────────────

/// Incremental `text/event-stream` decoder.
///
/// Accepts arbitrary byte chunks (lines and UTF-8 sequences may be split
/// across chunks) and yields each event once its terminating blank line
/// arrives. Handles `\n`, `\r\n`, and bare `\r` line endings, comment
/// lines, multi-line data, and the optional space after the field colon.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    /// Feed a chunk and collect every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        let mut pos = 0;

        while let Some(&byte) = self.buf.get(pos) {
            let line_end = pos;
            match byte {
                b'\n' => pos += 1,
                b'\r' => match self.buf.get(pos + 1) {
                    // Wait for the next chunk: this may be half of a CRLF.
                    None => break,
                    Some(b'\n') => pos += 2,
                    Some(_) => pos += 1,
                },
                _ => {
                    pos += 1;
                    continue;
                }
            }

            let line = String::from_utf8_lossy(&self.buf[start..line_end]).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            start = pos;
        }

        self.buf.drain(..start);
        events
    }

    /// Reconnection delay the server asked for, if any.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_owned()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_owned()),
            data,
            id: self.last_id.clone(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
