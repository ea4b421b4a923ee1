//! Periodic maintenance tasks: token refill and stale key sweeping.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::registry::LimiterRegistry;

/// Handle to a periodic task running on the tokio runtime.
///
/// Dropping the handle aborts the task; [`shutdown`](Self::shutdown) stops
/// it after the current tick completes.
#[derive(Debug)]
pub struct BackgroundTask {
    name: String,
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Task name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the task loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signals the task to stop and waits for it.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!(task = %self.name, "background task stopped");
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Runs `tick` every `period`, first after one full period, until it returns
/// false or the task is shut down.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn_periodic<F>(name: impl Into<String>, period: Duration, mut tick: F) -> BackgroundTask
where
    F: FnMut() -> bool + Send + 'static,
{
    let name = name.into();
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let task_name = name.clone();

    let handle = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !tick() {
                        debug!(task = %task_name, "owner dropped, background task exiting");
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!(task = %task_name, "background task received shutdown signal");
                    break;
                }
            }
        }
    });

    BackgroundTask {
        name,
        shutdown_tx,
        handle: Some(handle),
    }
}

/// Starts a sweeper that evicts keys idle for `idle_ttl` from every limiter
/// in `registry`, every `interval`.
///
/// The sweeper holds only a weak reference; it exits once the registry is
/// dropped. Must be called from within a tokio runtime.
pub fn spawn_sweeper(registry: &Arc<LimiterRegistry>, idle_ttl: Duration, interval: Duration) -> BackgroundTask {
    let weak: Weak<LimiterRegistry> = Arc::downgrade(registry);
    info!(
        idle_ttl_secs = idle_ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "starting rate limiter key sweeper"
    );
    spawn_periodic("ratelimit-sweeper", interval, move || {
        let Some(registry) = weak.upgrade() else {
            return false;
        };
        let evicted = registry.evict_idle(idle_ttl);
        if evicted > 0 {
            debug!(evicted, "swept idle rate limiter keys");
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_after_each_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let task = spawn_periodic("counter", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        task.shutdown().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_exits_when_tick_returns_false() {
        let task = spawn_periodic("once", Duration::from_secs(1), || false);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(task.is_finished());
        assert_eq!(task.name(), "once");
    }
}
