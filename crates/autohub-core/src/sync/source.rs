// ── Event-stream patch source ──
//
// Adapts the hub's server-sent event stream into status patches: keeps
// `devices` events, parses their payload, and drops anything malformed.

use autohub_api::models::DeviceStatusChanged;
use autohub_api::{EventStreamClient, SseEvent};
use futures_util::StreamExt;
use futures_util::future;
use tracing::debug;

use super::{PatchSource, PatchStream};
use crate::error::CoreError;
use crate::model::StatusPatch;

/// Event name the hub publishes device status changes under.
pub const DEVICES_TOPIC: &str = "devices";

/// `PatchSource` backed by the hub's event stream.
pub struct HubStatusSource {
    client: EventStreamClient,
}

impl HubStatusSource {
    pub fn new(client: EventStreamClient) -> Self {
        Self { client }
    }
}

impl PatchSource for HubStatusSource {
    async fn open(&self) -> Result<PatchStream, CoreError> {
        let events = self.client.connect().await?;
        let patches = events.filter_map(|item| {
            future::ready(match item {
                Ok(event) => parse_status_event(&event).map(Ok),
                Err(e) => Some(Err(CoreError::from(e))),
            })
        });
        Ok(patches.boxed())
    }
}

/// Turn one event into a patch, or `None` if it is another topic or
/// its payload does not parse.
pub fn parse_status_event(event: &SseEvent) -> Option<StatusPatch> {
    if event.event != DEVICES_TOPIC {
        return None;
    }
    match serde_json::from_str::<DeviceStatusChanged>(&event.data) {
        Ok(change) => match StatusPatch::try_from(change) {
            Ok(patch) => Some(patch),
            Err(code) => {
                debug!(code, data = %event.data, "dropping status event with unknown state");
                None
            }
        },
        Err(e) => {
            debug!(error = %e, data = %event.data, "dropping malformed status event");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceId, DeviceState};

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.into(),
            data: data.into(),
            id: None,
        }
    }

    #[test]
    fn parses_devices_event() {
        let patch = parse_status_event(&event("devices", r#"{"DeviceID":4,"DeviceState":2}"#));
        assert_eq!(
            patch,
            Some(StatusPatch {
                id: DeviceId(4),
                status: DeviceState::Shutdown,
            })
        );
    }

    #[test]
    fn ignores_other_topics() {
        assert!(parse_status_event(&event("test_created", r#"{"DeviceID":4}"#)).is_none());
    }

    #[test]
    fn drops_malformed_payloads() {
        assert!(parse_status_event(&event("devices", "not json")).is_none());
        assert!(parse_status_event(&event("devices", r#"{"DeviceID":"x"}"#)).is_none());
    }

    #[test]
    fn drops_unknown_state_codes() {
        let unknown = event("devices", r#"{"DeviceID":1,"DeviceState":42}"#);
        assert!(parse_status_event(&unknown).is_none());

        // Code 1 is the hub's own `Unknown` and still applies.
        let patch = parse_status_event(&event("devices", r#"{"DeviceID":1,"DeviceState":1}"#));
        assert_eq!(patch.map(|p| p.status), Some(DeviceState::Unknown));
    }
}
