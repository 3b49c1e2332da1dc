// ── Device domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Group label for devices attached directly to the hub.
pub const DEFAULT_NODE_NAME: &str = "Master";

// ── DeviceId ────────────────────────────────────────────────────────

/// Hub-assigned numeric device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ── DeviceState ─────────────────────────────────────────────────────

/// Device connection state as reported by the hub.
///
/// Wire codes are positional: `None = 0` through `NodeDisconnected = 6`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, Serialize, Deserialize,
)]
pub enum DeviceState {
    #[default]
    None,
    Unknown,
    Shutdown,
    #[strum(to_string = "Disconnected")]
    RemoteDisconnected,
    Booted,
    Locked,
    #[strum(to_string = "Node Disconnected")]
    NodeDisconnected,
}

impl DeviceState {
    /// The hub's numeric code for this state.
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Unknown => 1,
            Self::Shutdown => 2,
            Self::RemoteDisconnected => 3,
            Self::Booted => 4,
            Self::Locked => 5,
            Self::NodeDisconnected => 6,
        }
    }

    /// Strict inverse of [`code`](Self::code).
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Unknown),
            2 => Some(Self::Shutdown),
            3 => Some(Self::RemoteDisconnected),
            4 => Some(Self::Booted),
            5 => Some(Self::Locked),
            6 => Some(Self::NodeDisconnected),
            _ => None,
        }
    }

    /// Whether the device can take a test run right now.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Booted)
    }
}

/// Codes outside the known range map to `Unknown`.
impl From<u32> for DeviceState {
    fn from(code: u32) -> Self {
        Self::from_code(code).unwrap_or(Self::Unknown)
    }
}

// ── PlatformType ────────────────────────────────────────────────────

/// Target platform of a device or test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum PlatformType {
    #[strum(to_string = "iOS")]
    Ios,
    Android,
    Mac,
    Windows,
    Linux,
    Web,
    Editor,
}

impl PlatformType {
    /// The hub's numeric code, used in the `platform` query parameter.
    pub fn code(self) -> u32 {
        match self {
            Self::Ios => 0,
            Self::Android => 1,
            Self::Mac => 2,
            Self::Windows => 3,
            Self::Linux => 4,
            Self::Web => 5,
            Self::Editor => 6,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Ios),
            1 => Some(Self::Android),
            2 => Some(Self::Mac),
            3 => Some(Self::Windows),
            4 => Some(Self::Linux),
            5 => Some(Self::Web),
            6 => Some(Self::Editor),
            _ => None,
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// Immutable snapshot of one registered device.
///
/// The live status merge never mutates a `Device`; it replaces the cached
/// `Arc<Device>` with a copy produced by [`Device::with_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Device {
    pub id: DeviceId,
    /// Serial or emulator identifier (e.g., `emulator-5554`).
    pub identifier: String,
    pub name: String,
    pub alias: String,
    pub os: String,
    pub os_version: String,
    pub status: DeviceState,
    pub platform: Option<PlatformType>,
    pub manager: String,
    pub is_locked: bool,
    pub is_acknowledged: bool,
    /// Name of the remote node the device hangs off, if any.
    pub node: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Alias when set, otherwise the reported name.
    pub fn display_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.name
        } else {
            &self.alias
        }
    }

    /// Node group this device is listed under.
    pub fn node_name(&self) -> &str {
        self.node.as_deref().unwrap_or(DEFAULT_NODE_NAME)
    }

    /// Copy of this record with only the status replaced.
    pub fn with_status(&self, status: DeviceState) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

// ── StatusPatch ─────────────────────────────────────────────────────

/// A pushed status change for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPatch {
    pub id: DeviceId,
    pub status: DeviceState,
}
