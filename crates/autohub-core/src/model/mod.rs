// ── Domain model ──
//
// Canonical types consumed by the stores and pickers. Wire records from
// `autohub-api` are converted into these in `crate::convert`.

mod device;
mod test_function;

pub use device::{Device, DeviceId, DeviceState, PlatformType, StatusPatch, DEFAULT_NODE_NAME};
pub use test_function::{TestFunction, TestFunctionKey};
