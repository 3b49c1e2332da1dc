// ── Filter predicates for device snapshots ──
//
// Lets list views narrow a snapshot without re-querying the hub.

use crate::model::{Device, DeviceState, PlatformType};

/// Filter predicate for device collections.
pub enum DeviceFilter {
    All,
    ByState(DeviceState),
    ByPlatform(PlatformType),
    /// Devices listed under this node name (`"Master"` for local ones).
    ByNode(String),
    /// Booted and not reserved by a running test.
    Ready,
    Custom(Box<dyn Fn(&Device) -> bool + Send + Sync>),
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            Self::All => true,
            Self::ByState(state) => device.status == *state,
            Self::ByPlatform(platform) => device.platform == Some(*platform),
            Self::ByNode(node) => device.node_name() == node,
            Self::Ready => device.status.is_ready() && !device.is_locked,
            Self::Custom(f) => f(device),
        }
    }
}
