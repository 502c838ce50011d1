//! reqwest-backed client for the n8n REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{RemoteExecution, RemoteExecutionClient, RemoteHealth, StartOutcome, StopOutcome};
use crate::metrics;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for a single n8n instance.
pub struct N8nClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct StartResponse {
    #[serde(alias = "executionId")]
    id: String,
}

#[derive(Deserialize)]
struct ExecutionResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    finished: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default, alias = "startedAt")]
    started_at: Option<String>,
    #[serde(default, alias = "stoppedAt")]
    stopped_at: Option<String>,
}

impl N8nClient {
    /// Create a client with default timeouts.
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self::with_timeout(
            base_url,
            api_key,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Create a client with an explicit per-request timeout.
    pub fn with_timeout(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("X-N8N-API-KEY", key);
        }
        builder
    }

    /// Extract an error message from a non-success response body, falling
    /// back to the HTTP status line.
    async fn error_detail(response: reqwest::Response) -> (u16, String) {
        let status = response.status();
        let detail = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| {
                body.get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| format!("HTTP {}", status));
        (status.as_u16(), detail)
    }
}

#[async_trait]
impl RemoteExecutionClient for N8nClient {
    async fn start_execution(&self, workflow_id: &str, parameters: &Value) -> StartOutcome {
        debug!("Starting remote execution of workflow '{}'", workflow_id);

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/workflows/{}/run", workflow_id),
            )
            .json(&json!({ "data": parameters }))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<StartResponse>().await {
                Ok(body) => {
                    metrics::record_remote_request("start_execution", true);
                    StartOutcome::started(body.id)
                }
                Err(e) => {
                    metrics::record_remote_request("start_execution", false);
                    StartOutcome::rejected(format!("Invalid start response: {}", e), Some(200))
                }
            },
            Ok(resp) => {
                metrics::record_remote_request("start_execution", false);
                let (code, detail) = Self::error_detail(resp).await;
                StartOutcome::rejected(detail, Some(code))
            }
            Err(e) => {
                metrics::record_remote_request("start_execution", false);
                StartOutcome::rejected(format!("Request failed: {}", e), e.status().map(|s| s.as_u16()))
            }
        }
    }

    async fn get_execution(&self, remote_execution_id: &str) -> RemoteExecution {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/v1/executions/{}", remote_execution_id),
            )
            .query(&[("includeData", "true")])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<ExecutionResponse>().await {
                    Ok(body) => {
                        metrics::record_remote_request("get_execution", true);
                        let failed = matches!(
                            body.status.as_deref(),
                            Some("error") | Some("crashed") | Some("failed")
                        );
                        RemoteExecution {
                            success: true,
                            status: body.status,
                            finished: body.finished,
                            output_data: if failed { None } else { body.data },
                            error: if failed {
                                Some("Remote execution reported an error".to_string())
                            } else {
                                None
                            },
                            started_at: body.started_at,
                            stopped_at: body.stopped_at,
                        }
                    }
                    Err(e) => {
                        metrics::record_remote_request("get_execution", false);
                        RemoteExecution::unavailable(format!("Invalid execution response: {}", e))
                    }
                }
            }
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
                metrics::record_remote_request("get_execution", true);
                RemoteExecution::not_found()
            }
            Ok(resp) => {
                metrics::record_remote_request("get_execution", false);
                let (_, detail) = Self::error_detail(resp).await;
                RemoteExecution::unavailable(detail)
            }
            Err(e) => {
                metrics::record_remote_request("get_execution", false);
                RemoteExecution::unavailable(format!("Request failed: {}", e))
            }
        }
    }

    async fn stop_execution(&self, remote_execution_id: &str) -> StopOutcome {
        debug!("Requesting stop of remote execution '{}'", remote_execution_id);

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/executions/{}/stop", remote_execution_id),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                metrics::record_remote_request("stop_execution", true);
                StopOutcome {
                    success: true,
                    error: None,
                }
            }
            Ok(resp) => {
                metrics::record_remote_request("stop_execution", false);
                let (_, detail) = Self::error_detail(resp).await;
                StopOutcome {
                    success: false,
                    error: Some(detail),
                }
            }
            Err(e) => {
                metrics::record_remote_request("stop_execution", false);
                StopOutcome {
                    success: false,
                    error: Some(format!("Request failed: {}", e)),
                }
            }
        }
    }

    async fn health_check(&self) -> RemoteHealth {
        let response = self.request(reqwest::Method::GET, "/healthz").send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                metrics::record_remote_request("health_check", true);
                let data = resp.json::<Value>().await.ok();
                RemoteHealth {
                    success: true,
                    data,
                    error: None,
                }
            }
            Ok(resp) => {
                metrics::record_remote_request("health_check", false);
                RemoteHealth {
                    success: false,
                    data: None,
                    error: Some(format!("HTTP {}", resp.status())),
                }
            }
            Err(e) => {
                metrics::record_remote_request("health_check", false);
                RemoteHealth {
                    success: false,
                    data: None,
                    error: Some(format!("Request failed: {}", e)),
                }
            }
        }
    }
}
