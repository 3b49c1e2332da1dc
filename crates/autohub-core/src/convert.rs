// ── API-to-domain type conversions ──
//
// Bridges raw `autohub_api` wire records into canonical `autohub_core::model`
// types. Codes are mapped into enums and empty nested objects into `None`.

use autohub_api::models::{DeviceRecord, DeviceStatusChanged, TestFunctionRecord};

use crate::model::{
    Device, DeviceId, DeviceState, PlatformType, StatusPatch, TestFunction, TestFunctionKey,
};

impl From<DeviceRecord> for Device {
    fn from(r: DeviceRecord) -> Self {
        // The hub serializes an unloaded association as a zero-value node.
        let node = r
            .node
            .filter(|n| n.id != 0 && !n.name.is_empty())
            .map(|n| n.name);

        Device {
            id: DeviceId(r.id),
            identifier: r.device_identifier,
            name: r.name,
            alias: r.alias,
            os: r.os,
            os_version: r.os_version,
            status: DeviceState::from(r.status),
            platform: r.platform_type.and_then(PlatformType::from_code),
            manager: r.manager,
            is_locked: r.is_locked,
            is_acknowledged: r.is_acknowledged,
            node,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<TestFunctionRecord> for TestFunction {
    fn from(r: TestFunctionRecord) -> Self {
        TestFunction {
            key: TestFunctionKey {
                assembly: r.assembly,
                class: r.class,
                method: r.method,
            },
            id: r.id,
        }
    }
}

/// Fails with the raw code when the state is not one the hub defines.
impl TryFrom<DeviceStatusChanged> for StatusPatch {
    type Error = u32;

    fn try_from(ev: DeviceStatusChanged) -> Result<Self, Self::Error> {
        let status = DeviceState::from_code(ev.device_state).ok_or(ev.device_state)?;
        Ok(StatusPatch {
            id: DeviceId(ev.device_id),
            status,
        })
    }
}
