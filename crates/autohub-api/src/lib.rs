// autohub-api: Async client for the automation hub (REST + server-sent events)

pub mod client;
pub mod editor;
pub mod error;
pub mod events;
pub mod models;
pub mod transport;

pub use client::HubClient;
pub use editor::EditorClient;
pub use error::Error;
pub use events::{EventStream, EventStreamClient, SseDecoder, SseEvent};
pub use transport::{TlsMode, TransportConfig};
