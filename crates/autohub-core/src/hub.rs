// ── Hub facade ──
//
// Owns the long-lived pieces for one hub project: HTTP clients, the
// device cache, and the live status subscription. Cheaply cloneable
// via `Arc<HubInner>`.

use std::future::{self, Future};
use std::sync::Arc;

use autohub_api::{EditorClient, EventStreamClient, HubClient};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bootstrap::{EditorTestSource, HubDeviceSource, UniverseBootstrap, UniverseSource};
use crate::config::HubConfig;
use crate::error::CoreError;
use crate::model::{Device, DeviceId, PlatformType, TestFunction};
use crate::store::DeviceCache;
use crate::stream::{DeviceFilter, EntityStream};
use crate::sync::{HubStatusSource, LiveStatusSync, Subscription, SyncState, supervise};

// ── Hub ─────────────────────────────────────────────────────────────

/// Entry point for dashboards: connect, read devices, build pickers.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    cache: Arc<DeviceCache>,
    sync: LiveStatusSync,
    client: Mutex<Option<Arc<HubClient>>>,
    /// Master cancellation token; fires once on drop of the last owner.
    cancel: CancellationToken,
    /// Child token for the current connection; replaced on disconnect.
    cancel_child: Mutex<CancellationToken>,
    live: Mutex<Option<LiveTask>>,
}

/// The running live-status arrangement.
enum LiveTask {
    /// A single subscription with no reconnect policy.
    Direct(Subscription),
    /// A reconnect supervisor task.
    Supervised(JoinHandle<()>),
}

impl Hub {
    /// Create a hub handle. No network I/O happens until `connect`.
    pub fn new(config: HubConfig) -> Self {
        let cache = Arc::new(DeviceCache::new());
        let sync = LiveStatusSync::new(Arc::clone(&cache));
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(HubInner {
                config,
                cache,
                sync,
                client: Mutex::new(None),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                live: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Fetch the device list and start live status updates.
    ///
    /// The initial fetch must succeed. A failed event-stream handshake is
    /// logged and leaves the cache static; with a reconnect policy the
    /// supervisor keeps retrying in the background.
    pub async fn connect(&self) -> Result<(), CoreError> {
        // Tear down any previous connection first.
        self.disconnect().await;

        let child = self.inner.cancel_child.lock().await.clone();

        let config = &self.inner.config;
        let transport = config.transport();

        let client = Arc::new(HubClient::new(config.url.as_str(), &transport)?);
        *self.inner.client.lock().await = Some(Arc::clone(&client));

        self.refresh().await?;

        if config.live_updates {
            let events = EventStreamClient::new(config.url.as_str(), &transport)?;
            let source = HubStatusSource::new(events);

            let task = if let Some(reconnect) = config.reconnect.clone() {
                Some(LiveTask::Supervised(tokio::spawn(supervise(
                    self.inner.sync.clone(),
                    source,
                    reconnect,
                    child,
                ))))
            } else {
                match self.inner.sync.start(&source).await {
                    Ok(subscription) => Some(LiveTask::Direct(subscription)),
                    Err(e) => {
                        warn!(error = %e, "live status unavailable, device list will not update");
                        None
                    }
                }
            };
            *self.inner.live.lock().await = task;
        }

        info!(project = %config.project, "connected to hub");
        Ok(())
    }

    /// Stop live updates and drop the HTTP client. The cache keeps its
    /// last contents.
    pub async fn disconnect(&self) {
        {
            let mut child = self.inner.cancel_child.lock().await;
            child.cancel();
            *child = self.inner.cancel.child_token();
        }

        let task = self.inner.live.lock().await.take();
        match task {
            Some(LiveTask::Direct(subscription)) => {
                let end = subscription.close().await;
                debug!(?end, "live subscription closed");
            }
            Some(LiveTask::Supervised(handle)) => {
                if let Err(e) = handle.await {
                    warn!(error = %e, "status supervisor task panicked");
                }
            }
            None => {}
        }

        *self.inner.client.lock().await = None;
        debug!("disconnected from hub");
    }

    /// Re-fetch the full device list into the cache.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let client = self.hub_client().await?;
        let devices = HubDeviceSource::new(client, self.inner.config.project.clone())
            .fetch()
            .await?;
        info!(count = devices.len(), "device list fetched");
        self.inner.cache.replace_all(devices);
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.client.lock().await.is_some()
    }

    // ── Device reads ─────────────────────────────────────────────────

    pub fn cache(&self) -> &Arc<DeviceCache> {
        &self.inner.cache
    }

    /// Subscribe to device list snapshots.
    pub fn devices(&self) -> EntityStream<Device> {
        self.inner.cache.subscribe_devices()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.cache.devices_snapshot()
    }

    pub fn filtered_devices(&self, filter: &DeviceFilter) -> Vec<Arc<Device>> {
        self.inner.cache.filtered(filter)
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.sync.state()
    }

    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.inner.sync.watch_state()
    }

    // ── Pickers ──────────────────────────────────────────────────────

    /// Device picker for the project, optionally limited to a platform.
    ///
    /// Saved ids the cache knows are seeded as the initial selection;
    /// ids it has never seen are dropped.
    pub async fn device_picker(
        &self,
        selected: &[DeviceId],
        platform: Option<PlatformType>,
    ) -> Result<UniverseBootstrap<Device>, CoreError> {
        let client = self.hub_client().await?;
        let seeded: Vec<Arc<Device>> = selected
            .iter()
            .filter_map(|id| self.inner.cache.device(*id))
            .collect();
        if seeded.len() < selected.len() {
            debug!(
                requested = selected.len(),
                known = seeded.len(),
                "dropping unknown devices from saved selection"
            );
        }

        let mut source = HubDeviceSource::new(client, self.inner.config.project.clone());
        if let Some(platform) = platform {
            source = source.with_platform(platform);
        }

        let mut picker = UniverseBootstrap::new(seeded);
        let cancel = self.inner.cancel_child.lock().await.clone();
        picker
            .bootstrap(&source, self.inner.config.timeout, &cancel)
            .await;
        Ok(picker)
    }

    /// Test-function picker fed by the editor plugin.
    ///
    /// Without a configured editor, or with the editor unreachable, the
    /// picker comes back degraded with the saved selection and a paste
    /// prompt.
    pub async fn test_function_picker(
        &self,
        selected: Vec<TestFunction>,
    ) -> UniverseBootstrap<TestFunction> {
        let config = &self.inner.config;
        let cancel = self.inner.cancel_child.lock().await.clone();
        let mut picker = UniverseBootstrap::new(selected);

        let editor = config.editor_url.as_ref().map(|url| {
            EditorClient::new(url.as_str(), &config.transport()).map_err(CoreError::from)
        });

        match editor {
            Some(Ok(client)) => {
                let source = EditorTestSource::new(Arc::new(client));
                picker.bootstrap(&source, config.timeout, &cancel).await;
            }
            Some(Err(e)) => {
                picker
                    .bootstrap(&Unavailable(e.to_string()), config.timeout, &cancel)
                    .await;
            }
            None => {
                picker
                    .bootstrap(
                        &Unavailable("no editor address configured".into()),
                        config.timeout,
                        &cancel,
                    )
                    .await;
            }
        }
        picker
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn hub_client(&self) -> Result<Arc<HubClient>, CoreError> {
        self.inner
            .client
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotConnected)
    }
}

impl Drop for HubInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Source that always fails with a fixed reason.
struct Unavailable(String);

impl UniverseSource<TestFunction> for Unavailable {
    fn fetch(&self) -> impl Future<Output = Result<Vec<TestFunction>, CoreError>> + Send {
        future::ready(Err(CoreError::Config {
            message: self.0.clone(),
        }))
    }
}
