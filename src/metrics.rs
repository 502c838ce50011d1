//! Prometheus metrics for flowgate.
//!
//! ## Metrics
//!
//! ### Counters
//! - `flowgate_executions_total` - Completed executions by status
//! - `flowgate_dispatch_retries_total` - Dispatch retries by workflow
//! - `flowgate_remote_requests_total` - Remote API calls by operation and outcome
//!
//! ### Histograms
//! - `flowgate_execution_duration_seconds` - Dispatch-to-terminal duration
//! - `flowgate_monitor_sweep_duration_seconds` - Monitor sweep duration
//!
//! ### Gauges
//! - `flowgate_active_executions` - Executions currently in flight

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics exporter.
///
/// Call once at application startup; returns the handle for rendering.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder")
        })
        .clone()
}

/// Render current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Record a completed execution.
pub fn record_execution(status: &str, workflow_id: &str) {
    counter!(
        "flowgate_executions_total",
        "status" => status.to_string(),
        "workflow" => workflow_id.to_string()
    )
    .increment(1);
}

/// Record dispatch-to-terminal duration.
pub fn record_execution_duration(duration: Duration, workflow_id: &str) {
    histogram!(
        "flowgate_execution_duration_seconds",
        "workflow" => workflow_id.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a dispatch retry.
pub fn record_dispatch_retry(workflow_id: &str) {
    counter!(
        "flowgate_dispatch_retries_total",
        "workflow" => workflow_id.to_string()
    )
    .increment(1);
}

/// Increment active executions gauge.
pub fn inc_active_executions() {
    gauge!("flowgate_active_executions").increment(1.0);
}

/// Decrement active executions gauge.
pub fn dec_active_executions() {
    gauge!("flowgate_active_executions").decrement(1.0);
}

/// Record a call to the remote API.
pub fn record_remote_request(operation: &str, success: bool) {
    counter!(
        "flowgate_remote_requests_total",
        "operation" => operation.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// Record a monitor sweep.
pub fn record_monitor_sweep(duration: Duration) {
    histogram!("flowgate_monitor_sweep_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_init() {
        // Metrics may already be initialized by another test; either way
        // rendering must not panic.
        let rendered = render_metrics();
        assert!(!rendered.is_empty());
    }
}
