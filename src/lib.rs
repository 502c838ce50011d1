//! flowgate - bounded-concurrency execution engine for remote n8n workflows
//!
//! flowgate drives long-lived workflow executions against a rate- and
//! capacity-limited n8n instance. It admits requests through a counting
//! semaphore, dispatches them over the n8n REST API, polls each execution
//! until it reaches a terminal state, retries transient dispatch failures
//! with a fixed backoff, and enforces per-execution timeouts. A background
//! monitor keeps the in-memory registry fresh and evicts completed entries
//! after a retention window.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowgate::client::N8nClient;
//! use flowgate::engine::{ExecutorConfig, WorkflowExecutor};
//! use flowgate::workflow::WorkflowRef;
//!
//! # async fn example() -> flowgate::Result<()> {
//! let client = Arc::new(N8nClient::new("http://localhost:5678", None));
//! let executor = WorkflowExecutor::new(client, ExecutorConfig::default());
//!
//! let workflow = WorkflowRef::new("wf-42");
//! let result = executor
//!     .execute_workflow(&workflow, serde_json::json!({"order_id": 7}), None)
//!     .await?;
//! println!("{}", result.to_json());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod telemetry;
pub mod workflow;

pub use engine::{
    ExecutionContext, ExecutionMonitor, ExecutionResult, ExecutionStatus, ExecutorConfig,
    ExecutorStats, WorkflowExecutor,
};
pub use error::{Error, Result};
