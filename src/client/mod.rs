//! Remote execution client contract.
//!
//! The executor drives the remote system through this trait. All four calls
//! report failure through a `success` flag plus error detail rather than by
//! returning `Err`, so the executor can branch uniformly on outcomes without
//! exception handling at the boundary. Implementations must be task-safe;
//! the engine shares one client across all in-flight executions.

mod n8n;

pub use n8n::N8nClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::ExecutionStatus;

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub success: bool,
    /// Identifier assigned by the remote system; present iff `success`.
    pub remote_execution_id: Option<String>,
    pub error: Option<String>,
    /// HTTP status code when the remote responded at all.
    pub status_code: Option<u16>,
}

impl StartOutcome {
    pub fn started(remote_execution_id: impl Into<String>) -> Self {
        Self {
            success: true,
            remote_execution_id: Some(remote_execution_id.into()),
            error: None,
            status_code: Some(200),
        }
    }

    pub fn rejected(error: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            success: false,
            remote_execution_id: None,
            error: Some(error.into()),
            status_code,
        }
    }
}

/// Snapshot of a remote execution's state.
#[derive(Debug, Clone)]
pub struct RemoteExecution {
    pub success: bool,
    /// Raw status string as reported by the remote system.
    pub status: Option<String>,
    pub finished: bool,
    pub output_data: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
}

impl RemoteExecution {
    pub fn not_found() -> Self {
        Self {
            success: false,
            status: None,
            finished: false,
            output_data: None,
            error: Some("execution not found".to_string()),
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            finished: false,
            output_data: None,
            error: Some(error.into()),
            started_at: None,
            stopped_at: None,
        }
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Remote health report.
#[derive(Debug, Clone)]
pub struct RemoteHealth {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Contract the executor consumes to drive remote executions.
#[async_trait]
pub trait RemoteExecutionClient: Send + Sync {
    /// Start a remote execution of `workflow_id` with the given parameters.
    async fn start_execution(&self, workflow_id: &str, parameters: &Value) -> StartOutcome;

    /// Fetch the current state of a remote execution.
    async fn get_execution(&self, remote_execution_id: &str) -> RemoteExecution;

    /// Request cancellation of a remote execution.
    async fn stop_execution(&self, remote_execution_id: &str) -> StopOutcome;

    /// Check connectivity and health of the remote system.
    async fn health_check(&self) -> RemoteHealth;
}

/// Map a raw remote status string to an [`ExecutionStatus`].
///
/// n8n reports `new`, `waiting`, `running`, `success`, `error`, `crashed`,
/// and `canceled`. Anything unrecognized while `finished` is true counts as
/// failed; unrecognized and unfinished counts as still running.
pub fn map_remote_status(raw: &str, finished: bool) -> ExecutionStatus {
    match raw {
        "new" | "waiting" => ExecutionStatus::Pending,
        "running" => ExecutionStatus::Running,
        "success" => ExecutionStatus::Success,
        "error" | "crashed" | "failed" => ExecutionStatus::Failed,
        "canceled" | "cancelled" => ExecutionStatus::Cancelled,
        _ if finished => ExecutionStatus::Failed,
        _ => ExecutionStatus::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_remote_status_known() {
        assert_eq!(map_remote_status("new", false), ExecutionStatus::Pending);
        assert_eq!(map_remote_status("waiting", false), ExecutionStatus::Pending);
        assert_eq!(map_remote_status("running", false), ExecutionStatus::Running);
        assert_eq!(map_remote_status("success", true), ExecutionStatus::Success);
        assert_eq!(map_remote_status("error", true), ExecutionStatus::Failed);
        assert_eq!(map_remote_status("crashed", true), ExecutionStatus::Failed);
        assert_eq!(
            map_remote_status("canceled", true),
            ExecutionStatus::Cancelled
        );
    }

    #[test]
    fn test_map_remote_status_unknown() {
        assert_eq!(map_remote_status("???", true), ExecutionStatus::Failed);
        assert_eq!(map_remote_status("???", false), ExecutionStatus::Running);
    }

    #[test]
    fn test_start_outcome_constructors() {
        let ok = StartOutcome::started("exec_1");
        assert!(ok.success);
        assert_eq!(ok.remote_execution_id.as_deref(), Some("exec_1"));
        assert!(ok.error.is_none());

        let bad = StartOutcome::rejected("boom", Some(500));
        assert!(!bad.success);
        assert!(bad.remote_execution_id.is_none());
        assert_eq!(bad.status_code, Some(500));
    }
}
