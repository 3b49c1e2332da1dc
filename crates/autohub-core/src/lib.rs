//! Reactive state core between `autohub-api` and dashboard surfaces.
//!
//! - **[`PartitionStore`]**: two-pane picker state (available / selected)
//!   driven by a pure reducer over [`Operation`]s. Every operation
//!   publishes the selected list to subscribers.
//!
//! - **[`UniverseBootstrap`]**: feeds a partition store from a fetch
//!   (hub devices, editor test functions) or a pasted JSON export, keeping
//!   the saved selection through every reload.
//!
//! - **[`DeviceCache`]** and **[`LiveStatusSync`]**: last-known device
//!   list for a project, kept current by status patches pushed over the
//!   hub's event stream.
//!
//! - **[`Hub`]**: facade that owns the clients, the cache, and the live
//!   subscription for one project.

pub mod bootstrap;
pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod model;
pub mod partition;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bootstrap::{
    BootstrapStatus, EditorTestSource, FromPaste, HubDeviceSource, PasteOutcome, Selectable,
    UniverseBootstrap, UniverseSource,
};
pub use config::{HubConfig, TlsVerification};
pub use error::CoreError;
pub use hub::Hub;
pub use partition::{ItemId, Operation, Partition, PartitionStore, Selection, SelectionStream};
pub use store::DeviceCache;
pub use stream::{DeviceFilter, EntityStream, SnapshotStream};
pub use sync::{
    LiveStatusSync, PatchSource, PatchStream, ReconnectConfig, SessionEnd, Subscription,
    SyncState,
};

pub use model::{
    Device, DeviceId, DeviceState, PlatformType, StatusPatch, TestFunction, TestFunctionKey,
};
