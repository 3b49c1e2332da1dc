// ── Universe bootstrap ──
//
// Feeds a `PartitionStore` its universe. The preferred path is a fetch
// (hub devices, editor test functions); when that yields nothing the
// user can paste an exported JSON list instead. Every new universe goes
// through `replace_universe`, so an existing selection survives reloads.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use autohub_api::models::{DeviceRecord, TestFunctionRecord};
use autohub_api::{EditorClient, HubClient};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{Device, DeviceId, PlatformType, TestFunction, TestFunctionKey};
use crate::partition::{ItemId, PartitionStore};

// ── Traits ──────────────────────────────────────────────────────────

/// An item that can sit in a picker pane.
pub trait Selectable: Send + Sync + 'static {
    type Id: ItemId;

    fn item_id(&self) -> Self::Id;

    /// Text shown in the pane.
    fn label(&self) -> String;
}

impl Selectable for Device {
    type Id = DeviceId;

    fn item_id(&self) -> DeviceId {
        self.id
    }

    /// `identifier(name)`, e.g. `emulator-5554(Pixel 7)`.
    fn label(&self) -> String {
        format!("{}({})", self.identifier, self.name)
    }
}

impl Selectable for TestFunction {
    type Id = TestFunctionKey;

    fn item_id(&self) -> TestFunctionKey {
        self.key.clone()
    }

    fn label(&self) -> String {
        self.display_name()
    }
}

/// Items that can be parsed from a pasted JSON export.
pub trait FromPaste: Sized {
    fn from_paste(raw: &str) -> Result<Vec<Self>, serde_json::Error>;
}

impl FromPaste for TestFunction {
    fn from_paste(raw: &str) -> Result<Vec<Self>, serde_json::Error> {
        let records: Vec<TestFunctionRecord> = serde_json::from_str(raw)?;
        Ok(records.into_iter().map(TestFunction::from).collect())
    }
}

impl FromPaste for Device {
    fn from_paste(raw: &str) -> Result<Vec<Self>, serde_json::Error> {
        let records: Vec<DeviceRecord> = serde_json::from_str(raw)?;
        Ok(records.into_iter().map(Device::from).collect())
    }
}

/// Where a universe is fetched from.
pub trait UniverseSource<T>: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Vec<T>, CoreError>> + Send;
}

// ── Sources ─────────────────────────────────────────────────────────

/// Devices of one project, optionally restricted to a platform.
pub struct HubDeviceSource {
    client: Arc<HubClient>,
    project: String,
    platform: Option<PlatformType>,
}

impl HubDeviceSource {
    pub fn new(client: Arc<HubClient>, project: impl Into<String>) -> Self {
        Self {
            client,
            project: project.into(),
            platform: None,
        }
    }

    pub fn with_platform(mut self, platform: PlatformType) -> Self {
        self.platform = Some(platform);
        self
    }
}

impl UniverseSource<Device> for HubDeviceSource {
    async fn fetch(&self) -> Result<Vec<Device>, CoreError> {
        let records = self
            .client
            .list_devices(&self.project, self.platform.map(PlatformType::code))
            .await?;
        Ok(records.into_iter().map(Device::from).collect())
    }
}

/// Test functions exported by the editor plugin.
pub struct EditorTestSource {
    client: Arc<EditorClient>,
}

impl EditorTestSource {
    pub fn new(client: Arc<EditorClient>) -> Self {
        Self { client }
    }
}

impl UniverseSource<TestFunction> for EditorTestSource {
    async fn fetch(&self) -> Result<Vec<TestFunction>, CoreError> {
        let records = self.client.list_tests().await?;
        Ok(records.into_iter().map(TestFunction::from).collect())
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Where the current universe came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStatus {
    /// No universe loaded yet; only the initial selection is known.
    Pending,
    Fetched { count: usize },
    Pasted { count: usize },
    /// The fetch returned nothing; waiting for a pasted list.
    AwaitingPaste,
    /// The fetch failed. The selection is kept, nothing is available,
    /// and a paste is offered.
    Degraded { notice: String },
}

impl BootstrapStatus {
    /// Whether the picker should show the paste input.
    pub fn offers_paste(&self) -> bool {
        matches!(self, Self::AwaitingPaste | Self::Degraded { .. })
    }
}

impl fmt::Display for BootstrapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "loading"),
            Self::Fetched { count } => write!(f, "{count} items loaded"),
            Self::Pasted { count } => write!(f, "{count} items pasted"),
            Self::AwaitingPaste => write!(f, "nothing to load, paste a list instead"),
            Self::Degraded { notice } => write!(f, "{notice}"),
        }
    }
}

/// Result of a paste attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteOutcome {
    /// Blank input; nothing changed.
    Ignored,
    Applied { items: usize },
}

// ── UniverseBootstrap ───────────────────────────────────────────────

/// Picker state: a partition store plus the records behind its ids.
pub struct UniverseBootstrap<T: Selectable> {
    store: PartitionStore<T::Id>,
    catalog: IndexMap<T::Id, Arc<T>>,
    status: BootstrapStatus,
}

impl<T: Selectable> UniverseBootstrap<T> {
    /// Start with the previously saved selection as the whole universe.
    pub fn new(selected: impl IntoIterator<Item = impl Into<Arc<T>>>) -> Self {
        let catalog = index::<T>(selected);
        let ids: Vec<T::Id> = catalog.keys().cloned().collect();
        Self {
            store: PartitionStore::new(ids.clone(), ids),
            catalog,
            status: BootstrapStatus::Pending,
        }
    }

    /// Fetch a universe from `source`, bounded by `timeout` and `cancel`.
    ///
    /// Never fails: an error, timeout, or cancellation degrades to an
    /// empty available pane with the selection kept and paste offered.
    pub async fn bootstrap<S: UniverseSource<T>>(
        &mut self,
        source: &S,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> &BootstrapStatus {
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::Cancelled),
            result = tokio::time::timeout(timeout, source.fetch()) => {
                result.unwrap_or_else(|_| Err(CoreError::Timeout {
                    timeout_secs: timeout.as_secs(),
                }))
            }
        };

        match fetched {
            Ok(items) if items.is_empty() => {
                info!("universe fetch returned nothing, offering paste");
                self.degrade(BootstrapStatus::AwaitingPaste);
            }
            Ok(items) => {
                let count = self.apply_items(items);
                info!(count, "universe fetched");
                self.status = BootstrapStatus::Fetched { count };
            }
            Err(e) => {
                warn!(error = %e, "universe fetch failed, offering paste");
                self.degrade(BootstrapStatus::Degraded {
                    notice: format!(
                        "Could not load the list ({e}). Paste an exported list instead."
                    ),
                });
            }
        }
        &self.status
    }

    /// Replace the universe with an updated list (e.g. a fresh device
    /// snapshot carrying new statuses).
    pub fn refresh(&mut self, items: impl IntoIterator<Item = impl Into<Arc<T>>>) {
        let count = self.apply_items(items);
        debug!(count, "universe refreshed");
        if !matches!(self.status, BootstrapStatus::Pasted { .. }) {
            self.status = BootstrapStatus::Fetched { count };
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn status(&self) -> &BootstrapStatus {
        &self.status
    }

    pub fn store(&self) -> &PartitionStore<T::Id> {
        &self.store
    }

    /// Mutable access for the move/toggle operations.
    pub fn store_mut(&mut self) -> &mut PartitionStore<T::Id> {
        &mut self.store
    }

    pub fn item(&self, id: &T::Id) -> Option<&Arc<T>> {
        self.catalog.get(id)
    }

    /// Records of the available pane, in display order.
    pub fn available_items(&self) -> Vec<Arc<T>> {
        self.lookup(self.store.partition().available().iter())
    }

    /// Records of the selected pane, in display order.
    pub fn selected_items(&self) -> Vec<Arc<T>> {
        self.lookup(self.store.partition().selected().iter())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn apply_items(&mut self, items: impl IntoIterator<Item = impl Into<Arc<T>>>) -> usize {
        let catalog = index::<T>(items);
        let ids: Vec<T::Id> = catalog.keys().cloned().collect();
        self.store.replace_universe(ids);
        self.catalog = catalog;
        self.catalog.len()
    }

    /// Shrink the universe to the current selection.
    fn degrade(&mut self, status: BootstrapStatus) {
        let selected = self.store.selected();
        self.store.replace_universe(selected.to_vec());
        self.catalog.retain(|id, _| selected.contains(id));
        self.status = status;
    }

    fn lookup<'a>(&self, ids: impl Iterator<Item = &'a T::Id>) -> Vec<Arc<T>> {
        ids.filter_map(|id| self.catalog.get(id).cloned()).collect()
    }
}

impl<T: Selectable + FromPaste> UniverseBootstrap<T> {
    /// Use a pasted JSON list as the universe.
    ///
    /// Blank input is ignored. Input that does not parse is rejected with
    /// `InvalidPayload` and leaves everything unchanged.
    pub fn paste(&mut self, raw: &str) -> Result<PasteOutcome, CoreError> {
        if raw.trim().is_empty() {
            return Ok(PasteOutcome::Ignored);
        }

        let items = T::from_paste(raw).map_err(|e| CoreError::InvalidPayload {
            reason: format!("expected a JSON list of items: {e}"),
        })?;

        let count = self.apply_items(items);
        info!(count, "universe pasted");
        self.status = BootstrapStatus::Pasted { count };
        Ok(PasteOutcome::Applied { items: count })
    }
}

/// Key items by id; a repeated id keeps its first position and last record.
fn index<T: Selectable>(
    items: impl IntoIterator<Item = impl Into<Arc<T>>>,
) -> IndexMap<T::Id, Arc<T>> {
    items
        .into_iter()
        .map(|item| {
            let item: Arc<T> = item.into();
            (item.item_id(), item)
        })
        .collect()
}
