use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use flowgate::client::{map_remote_status, N8nClient, RemoteExecutionClient};
use flowgate::config::Config;
use flowgate::shutdown::ShutdownCoordinator;
use flowgate::workflow::WorkflowRef;
use flowgate::{ExecutionMonitor, WorkflowExecutor};

#[derive(Parser)]
#[command(name = "flowgate")]
#[command(about = "Bounded-concurrency executor for remote n8n workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow and wait for its terminal outcome
    Run {
        /// Workflow ID on the remote instance
        workflow_id: String,
        /// Parameter values (key=value)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// JSON input data (merged under the parameters)
        #[arg(short, long)]
        input: Option<String>,
        /// Per-run timeout in seconds (overrides the configured default)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the current status of a remote execution
    Status {
        /// Remote execution ID
        execution_id: String,
    },
    /// Request cancellation of a remote execution
    Cancel {
        /// Remote execution ID
        execution_id: String,
    },
    /// List executions tracked by this process
    Active,
    /// Show executor statistics for this process
    Stats {
        /// Also print metrics in Prometheus text format
        #[arg(long)]
        metrics: bool,
    },
    /// Check connectivity to the remote instance
    Health,
}

fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid parameter format '{}'. Expected key=value", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> flowgate::Result<()> {
    flowgate::telemetry::init_telemetry("flowgate=info");
    flowgate::metrics::init_metrics();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::Run {
            workflow_id,
            params,
            input,
            timeout,
        } => cmd_run(&config, &workflow_id, &params, input.as_deref(), timeout).await?,
        Commands::Status { execution_id } => cmd_status(&config, &execution_id).await?,
        Commands::Cancel { execution_id } => cmd_cancel(&config, &execution_id).await?,
        Commands::Active => cmd_active(&config).await?,
        Commands::Stats { metrics } => cmd_stats(&config, metrics).await?,
        Commands::Health => cmd_health(&config).await?,
    }

    Ok(())
}

fn build_client(config: &Config) -> N8nClient {
    N8nClient::with_timeout(
        &config.remote.base_url,
        config.remote.api_key.clone(),
        Duration::from_secs(config.remote.request_timeout_seconds.max(1)),
    )
}

fn build_parameters(
    params: &[(String, String)],
    input: Option<&str>,
) -> flowgate::Result<Value> {
    let mut merged = match input {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            other => {
                return Err(flowgate::Error::Validation(format!(
                    "--input must be a JSON object, got {}",
                    other
                )))
            }
        },
        None => Map::new(),
    };

    for (key, raw) in params {
        // A value that parses as JSON is taken as-is, anything else as a string.
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.clone()));
        merged.insert(key.clone(), value);
    }

    Ok(Value::Object(merged))
}

async fn cmd_run(
    config: &Config,
    workflow_id: &str,
    params: &[(String, String)],
    input: Option<&str>,
    timeout: Option<u64>,
) -> flowgate::Result<()> {
    let parameters = build_parameters(params, input)?;
    let client: Arc<dyn RemoteExecutionClient> = Arc::new(build_client(config));

    let shutdown = Arc::new(ShutdownCoordinator::new());
    shutdown.start_signal_listener();

    let executor_config = config.engine.to_executor_config();
    let enable_monitoring = executor_config.enable_monitoring;
    let executor =
        Arc::new(WorkflowExecutor::new(client, executor_config).with_shutdown(shutdown));

    let monitor = if enable_monitoring {
        let monitor = ExecutionMonitor::new(executor.clone());
        monitor.start().await;
        Some(monitor)
    } else {
        None
    };

    let result = executor
        .execute_workflow(
            &WorkflowRef::new(workflow_id),
            parameters,
            timeout.map(Duration::from_secs),
        )
        .await?;

    if let Some(monitor) = monitor {
        monitor.stop().await;
    }

    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_status(config: &Config, execution_id: &str) -> flowgate::Result<()> {
    let client = build_client(config);
    let state = client.get_execution(execution_id).await;

    if !state.success {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "execution_id": execution_id,
                "found": false,
                "error": state.error,
            }))?
        );
        std::process::exit(1);
    }

    let raw = state.status.as_deref().unwrap_or("");
    let status = map_remote_status(raw, state.finished);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "execution_id": execution_id,
            "found": true,
            "status": status.to_string(),
            "finished": state.finished,
            "started_at": state.started_at,
            "stopped_at": state.stopped_at,
            "error": state.error,
        }))?
    );
    Ok(())
}

async fn cmd_cancel(config: &Config, execution_id: &str) -> flowgate::Result<()> {
    let client = build_client(config);
    let outcome = client.stop_execution(execution_id).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "execution_id": execution_id,
            "cancelled": outcome.success,
            "error": outcome.error,
        }))?
    );
    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

fn build_executor(config: &Config) -> Arc<WorkflowExecutor> {
    let client: Arc<dyn RemoteExecutionClient> = Arc::new(build_client(config));
    Arc::new(WorkflowExecutor::new(
        client,
        config.engine.to_executor_config(),
    ))
}

async fn cmd_active(config: &Config) -> flowgate::Result<()> {
    let executor = build_executor(config);
    let active = executor.get_active_executions().await;

    // The registry is per-process, so a one-shot CLI invocation reports
    // its own tracked executions only.
    let entries: Vec<Value> = active.values().map(|ctx| ctx.to_json()).collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "count": entries.len(),
            "active_executions": entries,
        }))?
    );
    Ok(())
}

async fn cmd_stats(config: &Config, metrics: bool) -> flowgate::Result<()> {
    let executor = build_executor(config);
    let stats = executor.get_execution_statistics().await;

    println!("{}", serde_json::to_string_pretty(&serde_json::to_value(&stats)?)?);
    if metrics {
        print!("{}", flowgate::metrics::render_metrics());
    }
    Ok(())
}

async fn cmd_health(config: &Config) -> flowgate::Result<()> {
    let executor = build_executor(config);
    let health = executor.health_check().await;
    println!("{}", serde_json::to_string_pretty(&health)?);
    if health["status"] != "healthy" {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_declares_all_subcommands() {
        let cmd = Cli::command();
        cmd.clone().debug_assert();

        let names: Vec<String> = cmd
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect();
        for expected in ["run", "status", "cancel", "active", "stats", "health"] {
            assert!(
                names.iter().any(|n| n == expected),
                "missing subcommand {}",
                expected
            );
        }
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("k=v").unwrap(),
            ("k".to_string(), "v".to_string())
        );
        assert_eq!(
            parse_param("k=a=b").unwrap(),
            ("k".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn test_build_parameters_merges_input_and_params() {
        let parameters = build_parameters(
            &[
                ("count".to_string(), "3".to_string()),
                ("name".to_string(), "abc".to_string()),
            ],
            Some(r#"{"base": true, "count": 1}"#),
        )
        .unwrap();

        assert_eq!(parameters["base"], true);
        // --param values take precedence over --input
        assert_eq!(parameters["count"], 3);
        assert_eq!(parameters["name"], "abc");

        assert!(build_parameters(&[], Some("[1, 2]")).is_err());
    }

    #[tokio::test]
    async fn test_active_and_stats_on_fresh_executor() {
        let config = Config::default();
        let executor = build_executor(&config);

        assert!(executor.get_active_executions().await.is_empty());

        let stats = executor.get_execution_statistics().await;
        assert_eq!(stats.total_started, 0);
        assert_eq!(stats.tracked_executions, 0);
        assert_eq!(
            stats.available_slots,
            config.engine.max_concurrent_executions
        );
    }
}
