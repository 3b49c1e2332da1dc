// ── Reconnect supervisor ──
//
// Optional owner policy on top of `LiveStatusSync`: keep a subscription
// open, backing off exponentially between failed attempts.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{LiveStatusSync, PatchSource, SessionEnd};

/// Exponential backoff configuration for re-subscribing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Keep `sync` subscribed to `source` until `cancel` fires.
///
/// Failed handshakes and sessions that end in a transport error count
/// against `max_retries`; a stream the server ends cleanly does not. Any
/// established session resets the count, so the limit only trips after
/// `max_retries + 1` failures in a row.
pub async fn supervise<S: PatchSource>(
    sync: LiveStatusSync,
    source: S,
    config: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let started = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = sync.start(&source) => result,
        };

        let failed = match started {
            Ok(mut subscription) => {
                failures = 0;
                let finished = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    end = subscription.finished() => Some(end),
                };
                let Some(end) = finished else {
                    subscription.close().await;
                    break;
                };

                match end {
                    SessionEnd::Closed => break,
                    SessionEnd::StreamEnded => {
                        info!("status stream ended cleanly, resubscribing");
                        false
                    }
                    SessionEnd::Failed(reason) => {
                        warn!(%reason, "status subscription failed");
                        true
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, failures, "status subscription attempt failed");
                true
            }
        };

        if failed {
            failures = failures.saturating_add(1);
            if let Some(max) = config.max_retries {
                if failures > max {
                    error!(max_retries = max, "status reconnect limit reached, giving up");
                    break;
                }
            }
        }

        let attempt = failures.saturating_sub(1);
        let delay = calculate_backoff(attempt, &config);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt, "Waiting before resubscribing"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("status supervisor exiting");
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
///
/// Jitter spreads out resubscribe storms from many dashboards.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::CoreError;
    use crate::model::{DeviceId, DeviceState, StatusPatch};
    use crate::store::DeviceCache;
    use crate::store::tests::device;
    use crate::sync::SyncState;
    use crate::sync::tests::ChannelSource;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        // With jitter factor up to 1.25, max effective is 12.5s.
        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_secs(13), "{d10:?} should be capped");

        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_secs(13), "{huge:?} should be capped");
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribes_after_stream_ends() {
        let cache = Arc::new(DeviceCache::new());
        cache.replace_all(vec![device(1, "A", DeviceState::Booted)]);
        let sync = LiveStatusSync::new(Arc::clone(&cache));
        let (source, mut txs) = ChannelSource::new(2);
        let second = txs.pop().unwrap();
        let first = txs.pop().unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(supervise(
            sync.clone(),
            source,
            ReconnectConfig::default(),
            cancel.clone(),
        ));

        let mut state = sync.watch_state();
        state.wait_for(|s| *s == SyncState::Subscribed).await.unwrap();
        drop(first);

        // The supervisor waits out the backoff and opens the second session.
        let mut devices = cache.subscribe_devices();
        second
            .send(Ok(StatusPatch {
                id: DeviceId(1),
                status: DeviceState::Locked,
            }))
            .unwrap();
        let snap = devices.changed().await.unwrap();
        assert_eq!(snap[0].status, DeviceState::Locked);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(sync.state(), SyncState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let sync = LiveStatusSync::new(Arc::new(DeviceCache::new()));
        let (source, _txs) = ChannelSource::new(0);

        let config = ReconnectConfig {
            max_retries: Some(2),
            ..ReconnectConfig::default()
        };

        // Every handshake fails; the supervisor returns on its own.
        supervise(sync.clone(), source, config, CancellationToken::new()).await;
        assert_eq!(sync.state(), SyncState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_stream_end_spends_no_retries() {
        let sync = LiveStatusSync::new(Arc::new(DeviceCache::new()));
        let (source, txs) = ChannelSource::new(3);
        let source = Arc::new(source);
        drop(txs);

        let config = ReconnectConfig {
            max_retries: Some(0),
            ..ReconnectConfig::default()
        };

        // Three sessions end cleanly; only the fourth, failed handshake
        // exhausts the budget.
        supervise(sync.clone(), Arc::clone(&source), config, CancellationToken::new()).await;
        assert_eq!(source.remaining(), 0);
        assert_eq!(sync.state(), SyncState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn established_session_resets_failure_budget() {
        let sync = LiveStatusSync::new(Arc::new(DeviceCache::new()));
        let (source, txs) = ChannelSource::new(3);
        let source = Arc::new(source);
        for tx in txs {
            tx.send(Err(CoreError::ConnectionFailed {
                url: "test://".into(),
                reason: "reset by peer".into(),
            }))
            .unwrap();
        }

        let config = ReconnectConfig {
            max_retries: Some(1),
            ..ReconnectConfig::default()
        };

        // Each session connects and then fails. The count never exceeds
        // one until the handshakes themselves start failing.
        supervise(sync.clone(), Arc::clone(&source), config, CancellationToken::new()).await;
        assert_eq!(source.remaining(), 0);
        assert_eq!(sync.state(), SyncState::Disconnected);
    }
}
