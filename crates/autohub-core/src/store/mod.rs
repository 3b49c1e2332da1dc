// ── Device cache ──
//
// Last-known device list for one project. Seeded by a full fetch, then
// kept current by status patches from the live synchronizer. Readers
// subscribe to snapshots; every write publishes a complete new one.

mod cache;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;
use tracing::debug;

use self::cache::EntityCache;
use crate::model::{Device, DeviceId, StatusPatch};
use crate::stream::{DeviceFilter, EntityStream};

/// Reactive store for the devices of one project.
pub struct DeviceCache {
    devices: EntityCache<DeviceId, Device>,
    last_fetch: watch::Sender<Option<DateTime<Utc>>>,
    last_patch: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        let (last_fetch, _) = watch::channel(None);
        let (last_patch, _) = watch::channel(None);

        Self {
            devices: EntityCache::new(),
            last_fetch,
            last_patch,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace the cache with a freshly fetched device list.
    pub fn replace_all(&self, devices: Vec<Device>) {
        debug!(count = devices.len(), "replacing device cache");
        self.devices
            .replace_all(devices.into_iter().map(|d| (d.id, d)));
        self.last_fetch.send_replace(Some(Utc::now()));
    }

    /// Apply one status patch.
    ///
    /// A cached device is replaced by a copy that differs only in its
    /// status, and exactly one snapshot is published. Patches for unknown
    /// devices are dropped. Returns whether the patch was applied.
    pub fn apply_status_patch(&self, patch: StatusPatch) -> bool {
        let applied = self
            .devices
            .replace_with(&patch.id, |device| device.with_status(patch.status));

        if applied.is_none() {
            debug!(device_id = %patch.id, status = %patch.status, "dropping patch for unknown device");
            return false;
        }

        self.last_patch.send_replace(Some(Utc::now()));
        true
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.devices.get(&id)
    }

    /// Current devices in fetch order (cheap `Arc` clone).
    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    /// Subscribe to device list changes.
    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        EntityStream::new(self.devices.subscribe())
    }

    /// Devices matching `filter`, in fetch order.
    pub fn filtered(&self, filter: &DeviceFilter) -> Vec<Arc<Device>> {
        self.devices_snapshot()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    /// Devices grouped by the node they are attached to.
    ///
    /// Groups appear in order of first occurrence; devices without a node
    /// are listed under `"Master"`.
    pub fn group_by_node(&self) -> IndexMap<String, Vec<Arc<Device>>> {
        let mut groups: IndexMap<String, Vec<Arc<Device>>> = IndexMap::new();
        for device in self.devices_snapshot().iter() {
            groups
                .entry(device.node_name().to_owned())
                .or_default()
                .push(Arc::clone(device));
        }
        groups
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of writes applied so far (fetches plus patches).
    pub fn version(&self) -> u64 {
        self.devices.version()
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        *self.last_fetch.borrow()
    }

    pub fn last_patch(&self) -> Option<DateTime<Utc>> {
        *self.last_patch.borrow()
    }

    /// Time since the last full fetch, if one happened.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_fetch().map(|t| Utc::now() - t)
    }
}

impl Default for DeviceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{DeviceState, PlatformType};
    use pretty_assertions::assert_eq;

    pub(crate) fn device(id: u64, name: &str, status: DeviceState) -> Device {
        Device {
            id: DeviceId(id),
            identifier: format!("serial-{id}"),
            name: name.into(),
            alias: String::new(),
            os: "android".into(),
            os_version: "14".into(),
            status,
            platform: Some(PlatformType::Android),
            manager: String::new(),
            is_locked: false,
            is_acknowledged: true,
            node: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn statuses(cache: &DeviceCache) -> Vec<(u64, DeviceState)> {
        cache
            .devices_snapshot()
            .iter()
            .map(|d| (d.id.0, d.status))
            .collect()
    }

    #[test]
    fn patches_replace_status_only() {
        let cache = DeviceCache::new();
        let a = device(1, "A", DeviceState::Booted);
        let b = device(2, "B", DeviceState::Unknown);
        cache.replace_all(vec![a.clone(), b.clone()]);

        assert!(cache.apply_status_patch(StatusPatch {
            id: DeviceId(1),
            status: DeviceState::Locked,
        }));
        assert!(!cache.apply_status_patch(StatusPatch {
            id: DeviceId(3),
            status: DeviceState::Booted,
        }));
        assert!(cache.apply_status_patch(StatusPatch {
            id: DeviceId(2),
            status: DeviceState::Shutdown,
        }));

        assert_eq!(
            statuses(&cache),
            vec![(1, DeviceState::Locked), (2, DeviceState::Shutdown)]
        );
        assert_eq!(*cache.device(DeviceId(1)).unwrap(), a.with_status(DeviceState::Locked));
        assert_eq!(*cache.device(DeviceId(2)).unwrap(), b.with_status(DeviceState::Shutdown));
        assert!(cache.device(DeviceId(3)).is_none());
    }

    #[test]
    fn last_patch_wins() {
        let cache = DeviceCache::new();
        cache.replace_all(vec![device(1, "A", DeviceState::Booted)]);

        for status in [DeviceState::Locked, DeviceState::Shutdown, DeviceState::Booted] {
            cache.apply_status_patch(StatusPatch {
                id: DeviceId(1),
                status,
            });
        }
        assert_eq!(statuses(&cache), vec![(1, DeviceState::Booted)]);
    }

    #[test]
    fn each_applied_patch_publishes_once() {
        let cache = DeviceCache::new();
        cache.replace_all(vec![device(1, "A", DeviceState::Booted)]);
        let before = cache.version();

        cache.apply_status_patch(StatusPatch {
            id: DeviceId(1),
            status: DeviceState::Booted,
        });
        cache.apply_status_patch(StatusPatch {
            id: DeviceId(7),
            status: DeviceState::Booted,
        });

        assert_eq!(cache.version(), before + 1);
        assert!(cache.last_patch().is_some());
    }

    #[test]
    fn filter_and_group() {
        let cache = DeviceCache::new();
        let mut remote = device(2, "B", DeviceState::NodeDisconnected);
        remote.node = Some("rack-a".into());
        cache.replace_all(vec![
            device(1, "A", DeviceState::Booted),
            remote,
            device(3, "C", DeviceState::Booted),
        ]);

        let booted = cache.filtered(&DeviceFilter::ByState(DeviceState::Booted));
        assert_eq!(booted.len(), 2);

        let groups = cache.group_by_node();
        let names: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Master", "rack-a"]);
        assert_eq!(groups["Master"].len(), 2);
        assert!(cache.data_age().is_some());
    }
}
