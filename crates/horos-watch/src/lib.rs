//! Watch Loop: detect a change in the database at bounded latency and fire
//! a reload callback exactly once per quiescent change burst.

pub mod detector;
pub mod error;

pub use detector::{CounterDetector, DataVersionDetector, Detector, MaxColumnDetector};
pub use error::WatchError;

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub interval: Duration,
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            debounce: Duration::from_millis(200),
        }
    }
}

type ReloadFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), WatchError>> + Send + Sync>;

/// Wraps a `Detector` + reload callback and drives `OnChange`'s poll/debounce/
/// fire loop. `WaitForVersion` lets callers block until a target version has
/// been observed and successfully reloaded.
pub struct Watch {
    config: WatchConfig,
    last_seen: Arc<AtomicI64>,
    version_tx: watch::Sender<i64>,
    version_rx: watch::Receiver<i64>,
}

impl Watch {
    pub fn new(config: WatchConfig) -> Self {
        let (version_tx, version_rx) = watch::channel(i64::MIN);
        Self {
            config,
            last_seen: Arc::new(AtomicI64::new(i64::MIN)),
            version_tx,
            version_rx,
        }
    }

    /// Current last-successfully-reloaded version.
    pub fn current_version(&self) -> i64 {
        self.last_seen.load(Ordering::SeqCst)
    }

    /// Block until the observed (and successfully reloaded) version reaches
    /// `target`, or `cancel` fires.
    pub async fn wait_for_version(&self, target: i64, cancel: &CancellationToken) {
        let mut rx = self.version_rx.clone();
        if *rx.borrow() >= target {
            return;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *rx.borrow() >= target {
                        return;
                    }
                }
            }
        }
    }

    /// Run the poll → debounce → fire loop until `cancel` fires.
    ///
    /// If `reload` returns an error, the last-seen version does **not**
    /// advance, so the next poll retries the same change.
    pub async fn on_change<D>(&self, detector: D, reload: ReloadFn, cancel: CancellationToken)
    where
        D: Detector + 'static,
    {
        let mut last_detected: Option<i64> = None;
        let mut pending: Option<i64> = None;
        let mut debounce_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("watch loop cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            match detector.detect() {
                Ok(v) => {
                    if last_detected != Some(v) {
                        last_detected = Some(v);
                        pending = Some(v);
                        debounce_deadline = Some(Instant::now() + self.config.debounce);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "watch: detector error, continuing");
                    continue;
                }
            }

            let Some(pending_v) = pending else { continue };
            let Some(deadline) = debounce_deadline else { continue };
            if Instant::now() < deadline {
                continue;
            }

            match reload().await {
                Ok(()) => {
                    self.last_seen.store(pending_v, Ordering::SeqCst);
                    let _ = self.version_tx.send(pending_v);
                    pending = None;
                    debounce_deadline = None;
                }
                Err(e) => {
                    warn!(error = %e, "watch: reload failed, not advancing version");
                    // Keep `pending`/`debounce_deadline` as-is so the very
                    // next poll retries the reload immediately.
                    debounce_deadline = Some(Instant::now());
                }
            }
        }
    }
}

/// Convenience constructor for a `ReloadFn` out of a boxed async closure.
pub fn reload_fn<F, Fut>(f: F) -> ReloadFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), WatchError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}
