// Wire types for the hub REST API and event stream.
//
// Field names mirror the hub's JSON exactly (Go-style PascalCase with
// upper-case acronyms). Everything beyond the fields the dashboard
// reads is captured in `extra` so nothing is silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device as returned by `GET /{project}/devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceRecord {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(default)]
    pub device_identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(rename = "OS", default)]
    pub os: String,
    #[serde(rename = "OSVersion", default)]
    pub os_version: String,
    /// Raw device state code (see the core `DeviceState` enum).
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub platform_type: Option<u32>,
    #[serde(default)]
    pub manager: String,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_acknowledged: bool,
    #[serde(rename = "NodeID", default)]
    pub node_id: Option<u64>,
    #[serde(default)]
    pub node: Option<NodeRecord>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// All remaining fields the hub sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The remote node a device is attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeRecord {
    #[serde(rename = "ID", default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A test function exported by the editor plugin or pasted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestFunctionRecord {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub assembly: String,
    pub class: String,
    pub method: String,
}

/// Payload of a `devices` event on the hub's event stream.
///
/// The hub serializes Go field names (`DeviceID`); some older builds
/// emitted camelCase, which the aliases accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatusChanged {
    #[serde(rename = "DeviceID", alias = "deviceId")]
    pub device_id: u64,
    #[serde(rename = "DeviceState", alias = "deviceState")]
    pub device_state: u32,
}

/// Error body shape used by the hub (`{"error": "..."}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_device_record() {
        let json = r#"{
            "ID": 7,
            "CreatedAt": "2024-03-01T10:00:00.123+01:00",
            "UpdatedAt": "2024-03-02T10:00:00Z",
            "DeletedAt": null,
            "DeviceIdentifier": "emulator-5554",
            "Alias": "Pixel lab",
            "Name": "Pixel 7",
            "OS": "android",
            "OSVersion": "14",
            "Status": 4,
            "PlatformType": 1,
            "NodeID": 2,
            "Node": { "ID": 2, "Name": "rack-a" },
            "ConnectionType": 1
        }"#;

        let device: DeviceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(device.id, 7);
        assert_eq!(device.device_identifier, "emulator-5554");
        assert_eq!(device.os, "android");
        assert_eq!(device.os_version, "14");
        assert_eq!(device.status, 4);
        assert_eq!(device.platform_type, Some(1));
        assert_eq!(device.node.as_ref().unwrap().name, "rack-a");
        assert!(device.created_at.is_some());
        assert_eq!(device.extra["ConnectionType"], 1);
    }

    #[test]
    fn device_record_tolerates_missing_optional_fields() {
        let device: DeviceRecord = serde_json::from_str(r#"{"ID": 1}"#).unwrap();
        assert_eq!(device.status, 0);
        assert!(device.node.is_none());
        assert!(device.name.is_empty());
    }

    #[test]
    fn status_change_accepts_both_casings() {
        let go: DeviceStatusChanged =
            serde_json::from_str(r#"{"DeviceID": 3, "DeviceState": 5}"#).unwrap();
        let camel: DeviceStatusChanged =
            serde_json::from_str(r#"{"deviceId": 3, "deviceState": 5}"#).unwrap();
        assert_eq!(go, camel);
        assert_eq!(go.device_state, 5);
    }

    #[test]
    fn test_function_without_id() {
        let f: TestFunctionRecord = serde_json::from_str(
            r#"{"Assembly": "Game.Tests", "Class": "Game.Tests.LoginTests", "Method": "System.Void Login()"}"#,
        )
        .unwrap();
        assert!(f.id.is_none());
        assert_eq!(f.class, "Game.Tests.LoginTests");
    }
}
