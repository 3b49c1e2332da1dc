// ── Snapshot subscriptions ──
//
// One subscription type for every published value in the core: device
// lists from the cache and selections from a partition store. Publishers
// hold a `watch::Sender<Arc<V>>`; each send replaces the whole value.

mod filter;

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Device;

pub use filter::DeviceFilter;

/// Device list snapshots, in fetch order.
pub type EntityStream<T> = SnapshotStream<Vec<Arc<T>>>;

/// Subscription to a published `Arc<V>`.
///
/// `current()` is the value this handle last observed; `latest()` peeks
/// at whatever was published since. A slow reader that misses several
/// publishes sees only the newest value.
pub struct SnapshotStream<V: Send + Sync + 'static> {
    current: Arc<V>,
    receiver: watch::Receiver<Arc<V>>,
}

impl<V: Send + Sync + 'static> SnapshotStream<V> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<V>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    pub fn current(&self) -> &Arc<V> {
        &self.current
    }

    pub fn latest(&self) -> Arc<V> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. `None` once the publisher is dropped.
    pub async fn changed(&mut self) -> Option<Arc<V>> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&value);
        Some(value)
    }

    /// Wait until a published value satisfies `ready`, checking the
    /// latest value first.
    pub async fn wait_until(&mut self, mut ready: impl FnMut(&V) -> bool + Send) -> Option<Arc<V>> {
        let value = self
            .receiver
            .wait_for(|value| ready(value))
            .await
            .ok()?
            .clone();
        self.current = Arc::clone(&value);
        Some(value)
    }

    /// Stream yielding the current value first, then each publish.
    pub fn into_stream(self) -> WatchStream<Arc<V>> {
        WatchStream::new(self.receiver)
    }

    /// Stream yielding only publishes made after this call.
    pub fn into_changes(self) -> WatchStream<Arc<V>> {
        WatchStream::from_changes(self.receiver)
    }
}

impl SnapshotStream<Vec<Arc<Device>>> {
    /// Devices in the current snapshot that match `filter`.
    pub fn filtered(&self, filter: &DeviceFilter) -> Vec<Arc<Device>> {
        self.current
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }
}
