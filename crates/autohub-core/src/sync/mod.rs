// ── Live status synchronizer ──
//
// Consumes device status patches from a `PatchSource` and applies each
// one to the `DeviceCache` in arrival order. A subscription is a scoped
// resource: the `Subscription` guard releases it on `close()` or drop,
// and the connection state returns to `Disconnected` on every exit path.

mod reconnect;
mod source;

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::StatusPatch;
use crate::store::DeviceCache;

pub use reconnect::{ReconnectConfig, calculate_backoff, supervise};
pub use source::{DEVICES_TOPIC, HubStatusSource, parse_status_event};

/// Stream of patches from one established subscription. An `Err` item
/// is a transport failure and ends the subscription.
pub type PatchStream = BoxStream<'static, Result<StatusPatch, CoreError>>;

// ── SyncState ───────────────────────────────────────────────────────

/// Connection state of the live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// How a subscription ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Closed by the owner (`close()`, drop, or cancellation).
    Closed,
    /// The server ended the stream.
    StreamEnded,
    /// The transport failed.
    Failed(String),
}

// ── PatchSource ─────────────────────────────────────────────────────

/// Something that can open a stream of status patches.
///
/// `open` performs the handshake; it resolves once the stream is
/// established (or the attempt failed).
pub trait PatchSource: Send + Sync + 'static {
    fn open(&self) -> impl Future<Output = Result<PatchStream, CoreError>> + Send;
}

// ── LiveStatusSync ──────────────────────────────────────────────────

/// Applies pushed status patches to a device cache.
///
/// At most one subscription is active at a time. Cheap to clone; clones
/// share the cache and the connection state.
#[derive(Clone)]
pub struct LiveStatusSync {
    cache: Arc<DeviceCache>,
    state: Arc<watch::Sender<SyncState>>,
}

impl LiveStatusSync {
    pub fn new(cache: Arc<DeviceCache>) -> Self {
        let (state, _) = watch::channel(SyncState::Disconnected);
        Self {
            cache,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Open a subscription and start applying patches.
    ///
    /// Moves `Disconnected → Connecting`, then to `Subscribed` once the
    /// source's handshake succeeds. A failed handshake returns to
    /// `Disconnected` and surfaces the error.
    pub async fn start<S: PatchSource>(&self, source: &S) -> Result<Subscription, CoreError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == SyncState::Disconnected {
                *state = SyncState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(CoreError::AlreadySubscribed);
        }

        // From here on, the state resets when this guard drops.
        let reset = StateReset(Arc::clone(&self.state));

        let stream = match source.open().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "status subscription handshake failed");
                return Err(e);
            }
        };

        self.state.send_replace(SyncState::Subscribed);
        info!("live status subscription established");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(apply_loop(
            stream,
            Arc::clone(&self.cache),
            cancel.clone(),
            reset,
        ));

        Ok(Subscription {
            cancel,
            handle: Some(handle),
        })
    }
}

/// Read patches until the stream ends, fails, or is cancelled.
async fn apply_loop(
    mut stream: PatchStream,
    cache: Arc<DeviceCache>,
    cancel: CancellationToken,
    _reset: StateReset,
) -> SessionEnd {
    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break SessionEnd::Closed,
            item = stream.next() => match item {
                Some(Ok(patch)) => {
                    cache.apply_status_patch(patch);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "status stream failed");
                    break SessionEnd::Failed(e.to_string());
                }
                None => {
                    info!("status stream ended");
                    break SessionEnd::StreamEnded;
                }
            },
        }
    };
    debug!(?end, "status subscription released");
    end
}

/// Returns the shared state to `Disconnected` when dropped.
struct StateReset(Arc<watch::Sender<SyncState>>);

impl Drop for StateReset {
    fn drop(&mut self) {
        self.0.send_replace(SyncState::Disconnected);
    }
}

// ── Subscription ────────────────────────────────────────────────────

/// Guard for an active subscription. Dropping it cancels the subscription.
pub struct Subscription {
    cancel: CancellationToken,
    handle: Option<JoinHandle<SessionEnd>>,
}

impl Subscription {
    /// Whether the apply task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until the subscription ends on its own (or is cancelled).
    pub async fn finished(&mut self) -> SessionEnd {
        let Some(handle) = self.handle.as_mut() else {
            return SessionEnd::Closed;
        };
        let end = join_result(handle.await);
        self.handle = None;
        end
    }

    /// Cancel the subscription and wait for it to be released.
    ///
    /// The connection state is `Disconnected` once this returns.
    pub async fn close(mut self) -> SessionEnd {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => join_result(handle.await),
            None => SessionEnd::Closed,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn join_result(result: Result<SessionEnd, tokio::task::JoinError>) -> SessionEnd {
    result.unwrap_or_else(|e| SessionEnd::Failed(format!("status task aborted: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;
    use crate::model::{DeviceId, DeviceState};
    use crate::store::tests::device;

    pub(crate) type PatchTx = mpsc::UnboundedSender<Result<StatusPatch, CoreError>>;

    /// Source handing out one pre-wired channel per `open`.
    pub(crate) struct ChannelSource {
        receivers: Mutex<Vec<mpsc::UnboundedReceiver<Result<StatusPatch, CoreError>>>>,
    }

    impl ChannelSource {
        pub(crate) fn new(sessions: usize) -> (Self, Vec<PatchTx>) {
            let (txs, rxs): (Vec<_>, Vec<_>) =
                (0..sessions).map(|_| mpsc::unbounded_channel()).unzip();
            let mut receivers = rxs;
            receivers.reverse();
            (
                Self {
                    receivers: Mutex::new(receivers),
                },
                txs,
            )
        }

        /// Sessions not yet opened.
        pub(crate) fn remaining(&self) -> usize {
            self.receivers.lock().unwrap().len()
        }
    }

    impl PatchSource for ChannelSource {
        fn open(&self) -> impl Future<Output = Result<PatchStream, CoreError>> + Send {
            let rx = self.receivers.lock().unwrap().pop();
            async move {
                match rx {
                    Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
                    None => Err(CoreError::ConnectionFailed {
                        url: "test://".into(),
                        reason: "no more sessions".into(),
                    }),
                }
            }
        }
    }

    // Lets a test keep a handle on the source it hands to the supervisor.
    impl PatchSource for Arc<ChannelSource> {
        fn open(&self) -> impl Future<Output = Result<PatchStream, CoreError>> + Send {
            ChannelSource::open(self)
        }
    }

    fn patch(id: u64, status: DeviceState) -> Result<StatusPatch, CoreError> {
        Ok(StatusPatch {
            id: DeviceId(id),
            status,
        })
    }

    fn seeded_cache() -> Arc<DeviceCache> {
        let cache = Arc::new(DeviceCache::new());
        cache.replace_all(vec![
            device(1, "A", DeviceState::Booted),
            device(2, "B", DeviceState::Unknown),
        ]);
        cache
    }

    #[tokio::test]
    async fn patches_apply_in_order_and_skip_unknown_ids() {
        let cache = seeded_cache();
        let sync = LiveStatusSync::new(Arc::clone(&cache));
        let (source, txs) = ChannelSource::new(1);

        let mut sub = sync.start(&source).await.unwrap();
        assert_eq!(sync.state(), SyncState::Subscribed);

        let tx = &txs[0];
        tx.send(patch(1, DeviceState::Locked)).unwrap();
        tx.send(patch(3, DeviceState::Booted)).unwrap();
        tx.send(patch(2, DeviceState::Shutdown)).unwrap();
        drop(txs);

        assert_eq!(sub.finished().await, SessionEnd::StreamEnded);
        assert_eq!(sync.state(), SyncState::Disconnected);

        let snapshot: Vec<_> = cache
            .devices_snapshot()
            .iter()
            .map(|d| (d.id.0, d.name.clone(), d.status))
            .collect();
        assert_eq!(
            snapshot,
            vec![
                (1, "A".to_string(), DeviceState::Locked),
                (2, "B".to_string(), DeviceState::Shutdown),
            ]
        );
    }

    #[tokio::test]
    async fn each_patch_notifies_once() {
        let cache = seeded_cache();
        let sync = LiveStatusSync::new(Arc::clone(&cache));
        let (source, txs) = ChannelSource::new(1);
        let mut devices = cache.subscribe_devices();

        let sub = sync.start(&source).await.unwrap();
        txs[0].send(patch(2, DeviceState::Booted)).unwrap();

        let snap = devices.changed().await.unwrap();
        assert_eq!(snap[1].status, DeviceState::Booted);
        assert_eq!(cache.version(), 2);

        sub.close().await;
    }

    #[tokio::test]
    async fn close_releases_and_resets_state() {
        let sync = LiveStatusSync::new(seeded_cache());
        let (source, _txs) = ChannelSource::new(1);

        let sub = sync.start(&source).await.unwrap();
        assert!(sub.is_active());
        assert_eq!(sub.close().await, SessionEnd::Closed);
        assert_eq!(sync.state(), SyncState::Disconnected);
    }

    #[tokio::test]
    async fn drop_releases_subscription() {
        let sync = LiveStatusSync::new(seeded_cache());
        let (source, _txs) = ChannelSource::new(1);
        let mut state = sync.watch_state();

        let sub = sync.start(&source).await.unwrap();
        drop(sub);

        state
            .wait_for(|s| *s == SyncState::Disconnected)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn transport_failure_ends_subscription() {
        let sync = LiveStatusSync::new(seeded_cache());
        let (source, txs) = ChannelSource::new(1);

        let mut sub = sync.start(&source).await.unwrap();
        txs[0]
            .send(Err(CoreError::ConnectionFailed {
                url: String::new(),
                reason: "reset by peer".into(),
            }))
            .unwrap();

        assert!(matches!(sub.finished().await, SessionEnd::Failed(_)));
        assert_eq!(sync.state(), SyncState::Disconnected);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let sync = LiveStatusSync::new(seeded_cache());
        let (source, _txs) = ChannelSource::new(2);

        let sub = sync.start(&source).await.unwrap();
        assert!(matches!(
            sync.start(&source).await,
            Err(CoreError::AlreadySubscribed)
        ));

        sub.close().await;
        let again = sync.start(&source).await.unwrap();
        again.close().await;
    }

    #[tokio::test]
    async fn failed_handshake_returns_to_disconnected() {
        let sync = LiveStatusSync::new(seeded_cache());
        let (source, _txs) = ChannelSource::new(0);

        let err = sync.start(&source).await.err().unwrap();
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
        assert_eq!(sync.state(), SyncState::Disconnected);
    }
}
