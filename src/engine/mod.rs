//! Execution engine: the bounded-concurrency executor, the execution
//! registry data model, and the background monitor.

mod executor;
mod monitor;
mod types;

pub use executor::WorkflowExecutor;
pub use monitor::ExecutionMonitor;
pub use types::{ExecutionContext, ExecutionResult, ExecutionStatus, ExecutorConfig, ExecutorStats};

#[cfg(test)]
pub(crate) mod test_util {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::client::{
        RemoteExecution, RemoteExecutionClient, RemoteHealth, StartOutcome, StopOutcome,
    };

    /// Scripted remote client for engine tests.
    ///
    /// Dispatch and poll responses are popped from queues; once a queue
    /// runs dry the configurable default answers. Per-remote-id poll
    /// overrides take precedence over the queue.
    pub struct MockClient {
        start_queue: Mutex<VecDeque<StartOutcome>>,
        default_start: Mutex<StartOutcome>,
        poll_queue: Mutex<VecDeque<RemoteExecution>>,
        default_poll: Mutex<RemoteExecution>,
        poll_by_id: Mutex<HashMap<String, RemoteExecution>>,
        stop_success: AtomicBool,
        healthy: AtomicBool,
        start_calls: AtomicUsize,
        poll_calls: AtomicUsize,
        stop_calls: AtomicUsize,
    }

    impl MockClient {
        pub fn new() -> Self {
            Self {
                start_queue: Mutex::new(VecDeque::new()),
                default_start: Mutex::new(StartOutcome::started("exec_123")),
                poll_queue: Mutex::new(VecDeque::new()),
                default_poll: Mutex::new(Self::running()),
                poll_by_id: Mutex::new(HashMap::new()),
                stop_success: AtomicBool::new(true),
                healthy: AtomicBool::new(true),
                start_calls: AtomicUsize::new(0),
                poll_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
            }
        }

        pub fn running() -> RemoteExecution {
            RemoteExecution {
                success: true,
                status: Some("running".to_string()),
                finished: false,
                output_data: None,
                error: None,
                started_at: None,
                stopped_at: None,
            }
        }

        pub fn finished_success(output: Value) -> RemoteExecution {
            RemoteExecution {
                success: true,
                status: Some("success".to_string()),
                finished: true,
                output_data: Some(output),
                error: None,
                started_at: None,
                stopped_at: None,
            }
        }

        pub fn finished_error(message: &str) -> RemoteExecution {
            RemoteExecution {
                success: true,
                status: Some("error".to_string()),
                finished: true,
                output_data: None,
                error: Some(message.to_string()),
                started_at: None,
                stopped_at: None,
            }
        }

        pub fn queue_start(&self, outcome: StartOutcome) {
            self.start_queue.lock().unwrap().push_back(outcome);
        }

        pub fn set_default_start(&self, outcome: StartOutcome) {
            *self.default_start.lock().unwrap() = outcome;
        }

        pub fn queue_poll(&self, state: RemoteExecution) {
            self.poll_queue.lock().unwrap().push_back(state);
        }

        pub fn set_default_poll(&self, state: RemoteExecution) {
            *self.default_poll.lock().unwrap() = state;
        }

        pub fn set_poll_for(&self, remote_id: &str, state: RemoteExecution) {
            self.poll_by_id
                .lock()
                .unwrap()
                .insert(remote_id.to_string(), state);
        }

        pub fn set_stop_success(&self, success: bool) {
            self.stop_success.store(success, Ordering::SeqCst);
        }

        pub fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        pub fn start_calls(&self) -> usize {
            self.start_calls.load(Ordering::SeqCst)
        }

        pub fn poll_calls(&self) -> usize {
            self.poll_calls.load(Ordering::SeqCst)
        }

        pub fn stop_calls(&self) -> usize {
            self.stop_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteExecutionClient for MockClient {
        async fn start_execution(&self, _workflow_id: &str, _parameters: &Value) -> StartOutcome {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.start_queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_start.lock().unwrap().clone())
        }

        async fn get_execution(&self, remote_execution_id: &str) -> RemoteExecution {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(state) = self.poll_by_id.lock().unwrap().get(remote_execution_id) {
                return state.clone();
            }
            self.poll_queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_poll.lock().unwrap().clone())
        }

        async fn stop_execution(&self, _remote_execution_id: &str) -> StopOutcome {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            if self.stop_success.load(Ordering::SeqCst) {
                StopOutcome {
                    success: true,
                    error: None,
                }
            } else {
                StopOutcome {
                    success: false,
                    error: Some("stop rejected".to_string()),
                }
            }
        }

        async fn health_check(&self) -> RemoteHealth {
            if self.healthy.load(Ordering::SeqCst) {
                RemoteHealth {
                    success: true,
                    data: Some(json!({"status": "ok"})),
                    error: None,
                }
            } else {
                RemoteHealth {
                    success: false,
                    data: None,
                    error: Some("connection refused".to_string()),
                }
            }
        }
    }
}
