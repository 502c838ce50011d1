//! Background execution monitor.
//!
//! Periodically sweeps the executor's registry: refreshes active entries
//! from the remote system and evicts terminal entries past the retention
//! window. A sweep failure for one entry never aborts the rest of the
//! sweep or the monitor loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::engine::WorkflowExecutor;
use crate::metrics;

/// Periodic sweeper over a [`WorkflowExecutor`]'s registry.
pub struct ExecutionMonitor {
    executor: Arc<WorkflowExecutor>,
    interval: Duration,
    retention: Duration,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionMonitor {
    /// Create a monitor over `executor` using its configured sweep interval
    /// and retention window.
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        let interval = executor.config().monitor_interval;
        let retention = executor.config().cleanup_completed_after;
        Self::with_intervals(executor, interval, retention)
    }

    /// Create a monitor with explicit sweep interval and retention window.
    pub fn with_intervals(
        executor: Arc<WorkflowExecutor>,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            executor,
            interval,
            retention,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    /// Whether the sweep task is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the background sweep task. A second call while running is a
    /// no-op.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Monitor already running, ignoring start");
            return;
        }

        let executor = self.executor.clone();
        let interval = self.interval;
        let retention = self.retention;
        let running = self.running.clone();
        let stop = self.stop.clone();

        let task = tokio::spawn(async move {
            info!(
                "Execution monitor started (interval {:?}, retention {:?})",
                interval, retention
            );
            loop {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = stop.notified() => break,
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                Self::sweep(&executor, retention).await;
            }
            running.store(false, Ordering::SeqCst);
            info!("Execution monitor stopped");
        });

        *self.handle.lock().await = Some(task);
    }

    /// Stop the sweep task, waiting for an in-flight sweep to complete.
    /// A call while stopped is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.notify_one();

        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Monitor task ended abnormally: {}", e);
            }
        }
    }

    /// Run one sweep immediately, outside the periodic schedule.
    pub async fn sweep_now(&self) {
        Self::sweep(&self.executor, self.retention).await;
    }

    async fn sweep(executor: &WorkflowExecutor, retention: Duration) {
        let started = Instant::now();

        executor.refresh_active_statuses().await;
        let evicted = executor.evict_stale(retention).await;
        if evicted > 0 {
            debug!("Sweep evicted {} completed execution(s)", evicted);
        }

        metrics::record_monitor_sweep(started.elapsed());
    }
}
