//! Execution lifecycle types and executor configuration.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Execution status.
///
/// `Success`, `Failed`, `Timeout`, and `Cancelled` are terminal; once an
/// execution reaches one of them it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Timeout | Self::Cancelled
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Mutable lifecycle record for one admitted execution attempt.
///
/// Created when `execute_workflow` admits a request; mutated only by the
/// owning executor (and the monitor, through the executor's API) until the
/// monitor evicts it after the retention window.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Identifier of the workflow definition being run.
    pub workflow_id: String,
    /// Identifier assigned by this engine at admission time. Stable across
    /// dispatch retries of the same logical request.
    pub execution_id: String,
    /// Identifier returned by the remote system once dispatch succeeds.
    pub remote_execution_id: Option<String>,
    /// Caller-supplied input, bound at creation.
    pub parameters: Value,
    /// Caller-supplied tags.
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    /// Per-request override of the configured execution timeout.
    pub timeout: Option<Duration>,
    /// Incremented on each transient dispatch-failure retry.
    pub retry_count: u32,
    pub status: ExecutionStatus,
    /// Stamped when a terminal status is first observed; drives eviction.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionContext {
    pub fn new(workflow_id: &str, execution_id: &str, parameters: Value) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            execution_id: execution_id.to_string(),
            remote_execution_id: None,
            parameters,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            timeout: None,
            retry_count: 0,
            status: ExecutionStatus::Pending,
            completed_at: None,
        }
    }

    /// Set a per-request timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach caller-supplied metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Summarize this entry for API/CLI responses.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "execution_id": self.execution_id,
            "workflow_id": self.workflow_id,
            "remote_execution_id": self.remote_execution_id,
            "status": self.status.to_string(),
            "retry_count": self.retry_count,
            "created_at": self.created_at.to_rfc3339(),
            "completed_at": self.completed_at.map(|t| t.to_rfc3339()),
        })
    }
}

/// Immutable outcome of one logical `execute_workflow` call.
///
/// Exactly one of `output_data` / `error_message` is populated, consistent
/// with `success` and `status`. Construct through [`ExecutionResult::succeeded`]
/// and friends to keep that invariant.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub execution_id: String,
    pub remote_execution_id: Option<String>,
    pub status: ExecutionStatus,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    /// Wall-clock duration from dispatch success to terminal observation.
    /// `None` if the execution never started remotely.
    pub execution_time: Option<Duration>,
}

impl ExecutionResult {
    pub fn succeeded(
        execution_id: &str,
        remote_execution_id: &str,
        output_data: Value,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: true,
            execution_id: execution_id.to_string(),
            remote_execution_id: Some(remote_execution_id.to_string()),
            status: ExecutionStatus::Success,
            output_data: Some(output_data),
            error_message: None,
            execution_time: Some(execution_time),
        }
    }

    pub fn failed(
        execution_id: &str,
        remote_execution_id: Option<&str>,
        error_message: String,
        execution_time: Option<Duration>,
    ) -> Self {
        Self {
            success: false,
            execution_id: execution_id.to_string(),
            remote_execution_id: remote_execution_id.map(|s| s.to_string()),
            status: ExecutionStatus::Failed,
            output_data: None,
            error_message: Some(error_message),
            execution_time,
        }
    }

    pub fn timed_out(
        execution_id: &str,
        remote_execution_id: Option<&str>,
        timeout: Duration,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: false,
            execution_id: execution_id.to_string(),
            remote_execution_id: remote_execution_id.map(|s| s.to_string()),
            status: ExecutionStatus::Timeout,
            output_data: None,
            error_message: Some(format!(
                "Execution timeout after {:.1}s",
                timeout.as_secs_f64()
            )),
            execution_time: Some(execution_time),
        }
    }

    pub fn cancelled(
        execution_id: &str,
        remote_execution_id: Option<&str>,
        execution_time: Option<Duration>,
    ) -> Self {
        Self {
            success: false,
            execution_id: execution_id.to_string(),
            remote_execution_id: remote_execution_id.map(|s| s.to_string()),
            status: ExecutionStatus::Cancelled,
            output_data: None,
            error_message: Some("Execution cancelled".to_string()),
            execution_time,
        }
    }

    /// Convert to a structured JSON response.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "success": self.success,
            "execution_id": self.execution_id,
            "remote_execution_id": self.remote_execution_id,
            "status": self.status.to_string(),
            "output_data": self.output_data,
            "error_message": self.error_message,
            "execution_time_seconds": self.execution_time.map(|d| d.as_secs_f64()),
        })
    }
}

/// Executor configuration.
///
/// Durations are plain [`Duration`] values here; the config file layer in
/// [`crate::config`] reads them as seconds and converts.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Admission ceiling: how many executions may be in flight at once.
    pub max_concurrent_executions: usize,
    /// Default per-execution timeout, measured from dispatch success.
    pub execution_timeout: Duration,
    /// Max retries after the initial dispatch attempt.
    pub retry_attempts: u32,
    /// Fixed delay between dispatch retries.
    pub retry_delay: Duration,
    /// Interval between status polls while an execution runs.
    pub poll_interval: Duration,
    /// Whether the background monitor sweep runs.
    pub enable_monitoring: bool,
    /// Monitor sweep period.
    pub monitor_interval: Duration,
    /// Retention window for terminal registry entries.
    pub cleanup_completed_after: Duration,
    /// Registry size cap. Oldest terminal entries are evicted first when
    /// the cap is exceeded; active entries are never evicted by the cap.
    pub max_execution_history: usize,
    /// Issue a best-effort remote cancel when a local timeout fires.
    pub cancel_on_timeout: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            execution_timeout: Duration::from_secs(300),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            enable_monitoring: true,
            monitor_interval: Duration::from_secs(30),
            cleanup_completed_after: Duration::from_secs(3600),
            max_execution_history: 1000,
            cancel_on_timeout: false,
        }
    }
}

/// Derived executor statistics. Read-only snapshot, no side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorStats {
    pub active_executions: usize,
    pub tracked_executions: usize,
    pub available_slots: usize,
    pub total_started: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_timed_out: u64,
    pub total_cancelled: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Timeout.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Timeout,
            ExecutionStatus::Cancelled,
        ] {
            let parsed: ExecutionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("exploded".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_result_success_invariant() {
        let result = ExecutionResult::succeeded(
            "local-1",
            "exec_123",
            serde_json::json!({"result": "ok"}),
            Duration::from_millis(120),
        );
        assert!(result.success);
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.output_data.is_some());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_result_failure_invariant() {
        let result =
            ExecutionResult::failed("local-1", None, "connection refused".to_string(), None);
        assert!(!result.success);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.output_data.is_none());
        assert!(result.error_message.is_some());
        assert!(result.execution_time.is_none());
    }

    #[test]
    fn test_timeout_message_marker() {
        let result = ExecutionResult::timed_out(
            "local-1",
            Some("exec_9"),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.error_message.as_deref().unwrap().contains("timeout"));
    }

    #[test]
    fn test_context_builder() {
        let ctx = ExecutionContext::new("wf-1", "local-1", serde_json::json!({"k": 1}))
            .with_timeout(Duration::from_secs(10));
        assert_eq!(ctx.status, ExecutionStatus::Pending);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(ctx.timeout, Some(Duration::from_secs(10)));
        assert!(ctx.remote_execution_id.is_none());
        assert!(ctx.completed_at.is_none());
    }

    #[test]
    fn test_context_to_json_shape() {
        let mut ctx = ExecutionContext::new("wf-1", "local-1", serde_json::json!({}));
        ctx.remote_execution_id = Some("exec_9".to_string());
        ctx.retry_count = 2;

        let json = ctx.to_json();
        assert_eq!(json["execution_id"], "local-1");
        assert_eq!(json["workflow_id"], "wf-1");
        assert_eq!(json["remote_execution_id"], "exec_9");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["retry_count"], 2);
        assert!(json["created_at"].is_string());
        assert!(json["completed_at"].is_null());
    }

    #[test]
    fn test_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_concurrent_executions, 10);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.enable_monitoring);
        assert!(!config.cancel_on_timeout);
    }
}
