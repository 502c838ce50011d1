//! Workflow executor.
//!
//! Drives one remote workflow execution per `execute_workflow` call:
//! admission through a counting semaphore, dispatch with fixed-delay
//! retries, status polling until a terminal state or the deadline, and
//! result construction. Remote-side failures never raise; they are
//! normalized into the returned [`ExecutionResult`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn, Span};

use crate::client::{map_remote_status, RemoteExecutionClient};
use crate::engine::types::{ExecutionContext, ExecutionResult, ExecutionStatus, ExecutorConfig, ExecutorStats};
use crate::error::{Error, Result};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::workflow::WorkflowRef;

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
}

/// Bounded-concurrency executor for remote workflow executions.
///
/// Owns the registry of tracked executions and the admission semaphore.
/// The background [`super::ExecutionMonitor`] mutates registry entries only
/// through this type's crate-internal API.
pub struct WorkflowExecutor {
    client: Arc<dyn RemoteExecutionClient>,
    config: ExecutorConfig,
    registry: Arc<RwLock<HashMap<String, ExecutionContext>>>,
    admission: Arc<Semaphore>,
    counters: Counters,
    shutdown: Option<Arc<ShutdownCoordinator>>,
    started_at: Instant,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(client: Arc<dyn RemoteExecutionClient>, config: ExecutorConfig) -> Self {
        let admission = Arc::new(Semaphore::new(config.max_concurrent_executions.max(1)));
        Self {
            client,
            config,
            registry: Arc::new(RwLock::new(HashMap::new())),
            admission,
            counters: Counters::default(),
            shutdown: None,
            started_at: Instant::now(),
        }
    }

    /// Attach a shutdown coordinator so pending sleeps and admission waits
    /// cancel promptly on shutdown.
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The remote client this executor drives.
    pub fn client(&self) -> &Arc<dyn RemoteExecutionClient> {
        &self.client
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    async fn shutdown_wait(shutdown: &Option<Arc<ShutdownCoordinator>>) {
        match shutdown {
            Some(s) => s.wait_for_shutdown().await,
            None => std::future::pending().await,
        }
    }

    /// Execute a workflow and wait for its terminal outcome.
    ///
    /// Blocks (suspends) while no admission slot is free. All remote-side
    /// failures are captured in the returned [`ExecutionResult`]; `Err` is
    /// reserved for programmer misuse (invalid workflow reference) and
    /// shutdown during admission.
    #[instrument(
        name = "workflow.execute",
        skip(self, workflow, parameters, timeout),
        fields(
            workflow_id = %workflow.id,
            execution_id = tracing::field::Empty,
        )
    )]
    pub async fn execute_workflow(
        &self,
        workflow: &WorkflowRef,
        parameters: Value,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        workflow.validate()?;

        // Admission: one slot per in-flight execution. The permit is held
        // for the rest of this call and released on every exit path.
        let _permit = tokio::select! {
            permit = self.admission.clone().acquire_owned() => {
                permit.map_err(|_| Error::Internal("admission semaphore closed".to_string()))?
            }
            _ = Self::shutdown_wait(&self.shutdown) => {
                return Err(Error::Execution("executor is shutting down".to_string()));
            }
        };

        let execution_id = uuid::Uuid::new_v4().to_string();
        Span::current().record("execution_id", execution_id.as_str());

        let effective_timeout = timeout.unwrap_or(self.config.execution_timeout);

        let mut ctx = ExecutionContext::new(&workflow.id, &execution_id, parameters.clone())
            .with_metadata(workflow.metadata.clone());
        if let Some(t) = timeout {
            ctx = ctx.with_timeout(t);
        }
        self.insert_context(ctx).await;

        info!(
            "Admitted execution {} of workflow '{}'",
            execution_id,
            workflow.display_name()
        );
        self.counters.started.fetch_add(1, Ordering::Relaxed);
        metrics::inc_active_executions();

        // Dispatch, retrying transient failures with a fixed delay. The
        // retry budget is retry_attempts on top of the initial attempt.
        let mut attempt: u32 = 0;
        let mut last_error;
        let remote_id = loop {
            if self.is_shutdown_requested() {
                let result = ExecutionResult::cancelled(&execution_id, None, None);
                return Ok(self.finish(&execution_id, &workflow.id, result).await);
            }

            let outcome = self.client.start_execution(&workflow.id, &parameters).await;
            if outcome.success {
                match outcome.remote_execution_id {
                    Some(id) => break id,
                    None => {
                        last_error = "Dispatch succeeded without a remote execution id".to_string()
                    }
                }
            } else {
                last_error = outcome
                    .error
                    .unwrap_or_else(|| "Dispatch failed".to_string());
            }

            if attempt >= self.config.retry_attempts {
                warn!(
                    "Dispatch of workflow '{}' failed after {} attempt(s): {}",
                    workflow.id,
                    attempt + 1,
                    last_error
                );
                let result = ExecutionResult::failed(&execution_id, None, last_error, None);
                return Ok(self.finish(&execution_id, &workflow.id, result).await);
            }

            attempt += 1;
            self.bump_retry_count(&execution_id, attempt).await;
            metrics::record_dispatch_retry(&workflow.id);
            warn!(
                "Dispatch attempt {} for workflow '{}' failed: {}. Retrying in {:?}",
                attempt, workflow.id, last_error, self.config.retry_delay
            );

            tokio::select! {
                _ = sleep(self.config.retry_delay) => {}
                _ = Self::shutdown_wait(&self.shutdown) => {
                    let result = ExecutionResult::cancelled(&execution_id, None, None);
                    return Ok(self.finish(&execution_id, &workflow.id, result).await);
                }
            }
        };

        self.stamp_running(&execution_id, &remote_id).await;
        info!(
            "Execution {} dispatched as remote execution {}",
            execution_id, remote_id
        );

        // Poll until terminal or deadline. The deadline is wall-clock,
        // measured from dispatch success.
        let dispatched = Instant::now();
        let deadline = dispatched + effective_timeout;

        loop {
            if self.is_shutdown_requested() {
                let result = ExecutionResult::cancelled(
                    &execution_id,
                    Some(&remote_id),
                    Some(dispatched.elapsed()),
                );
                return Ok(self.finish(&execution_id, &workflow.id, result).await);
            }

            let now = Instant::now();
            if now >= deadline {
                if self.config.cancel_on_timeout {
                    let stop = self.client.stop_execution(&remote_id).await;
                    if !stop.success {
                        warn!(
                            "Best-effort cancel of remote execution {} failed: {}",
                            remote_id,
                            stop.error.as_deref().unwrap_or("unknown")
                        );
                    }
                }
                let result = ExecutionResult::timed_out(
                    &execution_id,
                    Some(&remote_id),
                    effective_timeout,
                    dispatched.elapsed(),
                );
                return Ok(self.finish(&execution_id, &workflow.id, result).await);
            }

            let state = self.client.get_execution(&remote_id).await;
            if state.success {
                let raw = state.status.as_deref().unwrap_or("");
                let mapped = map_remote_status(raw, state.finished);
                if mapped.is_terminal() {
                    let elapsed = dispatched.elapsed();
                    let result = match mapped {
                        ExecutionStatus::Success => ExecutionResult::succeeded(
                            &execution_id,
                            &remote_id,
                            state.output_data.unwrap_or_else(|| json!({})),
                            elapsed,
                        ),
                        ExecutionStatus::Cancelled => ExecutionResult::cancelled(
                            &execution_id,
                            Some(&remote_id),
                            Some(elapsed),
                        ),
                        _ => ExecutionResult::failed(
                            &execution_id,
                            Some(&remote_id),
                            state
                                .error
                                .unwrap_or_else(|| "Remote execution failed".to_string()),
                            Some(elapsed),
                        ),
                    };
                    return Ok(self.finish(&execution_id, &workflow.id, result).await);
                }
            } else {
                // A failed status poll is transient; keep polling until the
                // deadline decides.
                warn!(
                    "Status poll for remote execution {} failed: {}",
                    remote_id,
                    state.error.as_deref().unwrap_or("unknown")
                );
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let nap = remaining.min(self.config.poll_interval);
            tokio::select! {
                _ = sleep(nap) => {}
                _ = Self::shutdown_wait(&self.shutdown) => {
                    let result = ExecutionResult::cancelled(
                        &execution_id,
                        Some(&remote_id),
                        Some(dispatched.elapsed()),
                    );
                    return Ok(self.finish(&execution_id, &workflow.id, result).await);
                }
            }
        }
    }

    /// Query the remote status of a tracked execution.
    ///
    /// Returns `None` for unknown execution ids and when the remote system
    /// reports the execution as not found.
    pub async fn get_execution_status(&self, execution_id: &str) -> Result<Option<ExecutionStatus>> {
        let remote_id = {
            let registry = self.registry.read().await;
            match registry.get(execution_id) {
                None => return Ok(None),
                Some(ctx) => match &ctx.remote_execution_id {
                    // Not yet dispatched; the remote system knows nothing.
                    None => return Ok(Some(ctx.status)),
                    Some(id) => id.clone(),
                },
            }
        };

        let state = self.client.get_execution(&remote_id).await;
        if !state.success {
            return Ok(None);
        }
        let raw = state.status.as_deref().unwrap_or("");
        Ok(Some(map_remote_status(raw, state.finished)))
    }

    /// Request cancellation of a tracked execution.
    ///
    /// Best-effort and asynchronous: returns `true` only on remote-confirmed
    /// success. The context status is not mutated here; the owning poll loop
    /// (or the monitor) observes the cancelled state on its next query.
    pub async fn cancel_execution(&self, execution_id: &str) -> Result<bool> {
        let remote_id = {
            let registry = self.registry.read().await;
            match registry.get(execution_id).and_then(|c| c.remote_execution_id.clone()) {
                Some(id) => id,
                None => return Ok(false),
            }
        };

        let outcome = self.client.stop_execution(&remote_id).await;
        if outcome.success {
            info!("Cancellation confirmed for execution {}", execution_id);
        } else {
            warn!(
                "Cancellation of execution {} rejected: {}",
                execution_id,
                outcome.error.as_deref().unwrap_or("unknown")
            );
        }
        Ok(outcome.success)
    }

    /// Snapshot of all non-terminal registry entries.
    ///
    /// The returned map is a copy; mutating it does not affect the registry.
    pub async fn get_active_executions(&self) -> HashMap<String, ExecutionContext> {
        let registry = self.registry.read().await;
        registry
            .iter()
            .filter(|(_, ctx)| !ctx.status.is_terminal())
            .map(|(id, ctx)| (id.clone(), ctx.clone()))
            .collect()
    }

    /// Derived executor statistics. Read-only, no side effects.
    pub async fn get_execution_statistics(&self) -> ExecutorStats {
        let registry = self.registry.read().await;
        let active = registry
            .values()
            .filter(|ctx| !ctx.status.is_terminal())
            .count();
        ExecutorStats {
            active_executions: active,
            tracked_executions: registry.len(),
            available_slots: self.admission.available_permits(),
            total_started: self.counters.started.load(Ordering::Relaxed),
            total_succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            total_failed: self.counters.failed.load(Ordering::Relaxed),
            total_timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            total_cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    /// Check connectivity to the remote system. Never raises.
    pub async fn health_check(&self) -> Value {
        let health = self.client.health_check().await;
        if health.success {
            let stats = self.get_execution_statistics().await;
            json!({
                "status": "healthy",
                "api_connection": true,
                "active_executions": stats.active_executions,
                "uptime_seconds": stats.uptime_seconds,
            })
        } else {
            json!({
                "status": "unhealthy",
                "api_connection": false,
                "error": health.error.unwrap_or_else(|| "unknown".to_string()),
            })
        }
    }

    // ------------------------------------------------------------------
    // Registry bookkeeping (also used by the monitor)
    // ------------------------------------------------------------------

    pub(crate) async fn insert_context(&self, ctx: ExecutionContext) {
        let mut registry = self.registry.write().await;

        // Enforce the history cap before inserting: evict the oldest
        // terminal entries first. Active entries are never evicted here.
        while registry.len() >= self.config.max_execution_history {
            let oldest = registry
                .values()
                .filter(|c| c.status.is_terminal())
                .min_by_key(|c| c.completed_at)
                .map(|c| c.execution_id.clone());
            match oldest {
                Some(id) => {
                    debug!("History cap reached, evicting completed execution {}", id);
                    registry.remove(&id);
                }
                None => break,
            }
        }

        registry.insert(ctx.execution_id.clone(), ctx);
    }

    async fn bump_retry_count(&self, execution_id: &str, retry_count: u32) {
        let mut registry = self.registry.write().await;
        if let Some(ctx) = registry.get_mut(execution_id) {
            ctx.retry_count = retry_count;
        }
    }

    async fn stamp_running(&self, execution_id: &str, remote_id: &str) {
        let mut registry = self.registry.write().await;
        if let Some(ctx) = registry.get_mut(execution_id) {
            if !ctx.status.is_terminal() {
                ctx.status = ExecutionStatus::Running;
                ctx.remote_execution_id = Some(remote_id.to_string());
            }
        }
    }

    /// Stamp a terminal status on a registry entry.
    ///
    /// No-ops (returns false) if the entry is unknown or already terminal,
    /// so a result is counted exactly once even when the monitor and the
    /// owning task race.
    pub(crate) async fn stamp_terminal(&self, execution_id: &str, status: ExecutionStatus) -> bool {
        debug_assert!(status.is_terminal());
        let mut registry = self.registry.write().await;
        let Some(ctx) = registry.get_mut(execution_id) else {
            return false;
        };
        if ctx.status.is_terminal() {
            return false;
        }
        ctx.status = status;
        ctx.completed_at = Some(Utc::now());

        let counter = match status {
            ExecutionStatus::Success => &self.counters.succeeded,
            ExecutionStatus::Timeout => &self.counters.timed_out,
            ExecutionStatus::Cancelled => &self.counters.cancelled,
            _ => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_execution(&status.to_string(), &ctx.workflow_id);
        true
    }

    /// Refresh every active entry from the remote system, isolating
    /// per-entry failures. Called by the monitor sweep.
    pub(crate) async fn refresh_active_statuses(&self) {
        let active: Vec<(String, String)> = {
            let registry = self.registry.read().await;
            registry
                .values()
                .filter(|ctx| !ctx.status.is_terminal())
                .filter_map(|ctx| {
                    ctx.remote_execution_id
                        .as_ref()
                        .map(|remote| (ctx.execution_id.clone(), remote.clone()))
                })
                .collect()
        };

        for (execution_id, remote_id) in active {
            let state = self.client.get_execution(&remote_id).await;
            if !state.success {
                warn!(
                    "Sweep failed to refresh execution {} ({}): {}",
                    execution_id,
                    remote_id,
                    state.error.as_deref().unwrap_or("unknown")
                );
                continue;
            }
            let raw = state.status.as_deref().unwrap_or("");
            let mapped = map_remote_status(raw, state.finished);
            if mapped.is_terminal() && self.stamp_terminal(&execution_id, mapped).await {
                debug!(
                    "Sweep stamped execution {} as {} from remote state",
                    execution_id, mapped
                );
            }
        }
    }

    /// Evict terminal entries whose completion is older than `retention`.
    /// Returns the number of evicted entries. Called by the monitor sweep.
    pub(crate) async fn evict_stale(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());

        let mut registry = self.registry.write().await;
        let before = registry.len();
        registry.retain(|_, ctx| match ctx.completed_at {
            Some(completed) => completed > cutoff,
            None => true,
        });
        before - registry.len()
    }

    async fn finish(
        &self,
        execution_id: &str,
        workflow_id: &str,
        result: ExecutionResult,
    ) -> ExecutionResult {
        self.stamp_terminal(execution_id, result.status).await;
        if let Some(duration) = result.execution_time {
            metrics::record_execution_duration(duration, workflow_id);
        }
        metrics::dec_active_executions();

        info!(
            "Execution {} finished with status {}{}",
            execution_id,
            result.status,
            result
                .execution_time
                .map(|d| format!(" ({}ms)", d.as_millis()))
                .unwrap_or_default()
        );
        result
    }
}
