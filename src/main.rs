//! Demonstration binary for the scenario simulator.
//!
//! Reads one message per stdin line, dispatches it and prints the scripted
//! reply, or `<no response>` when the scenario stays silent. Two scenarios
//! are registered: `Hello`, chosen for payloads whose XML root element is
//! `Hello`, and the fallback `Default`, which echoes the payload back.

mod cli;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::Parser;
use scenario_simulator::{
    ExecutionMode,
    Message,
    Scenario,
    ScenarioContext,
    Simulator,
    SimulatorConfig,
    scenario::ScenarioResult,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

struct Echo;

#[async_trait]
impl Scenario for Echo {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult {
        let request = ctx.expect_message().await?;
        ctx.send(Message::new(request.payload()))?;
        Ok(())
    }
}

struct Hello;

#[async_trait]
impl Scenario for Hello {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult {
        ctx.expect_message().await?;
        ctx.send(Message::new(
            "<HelloResponse>Hi from ${scenarioName} (${scenarioExecutionId})</HelloResponse>",
        ))?;
        Ok(())
    }
}

fn config(cli: &cli::Cli) -> SimulatorConfig {
    SimulatorConfig::default()
        .default_scenario(cli.default_scenario.clone())
        .default_timeout(Duration::from_millis(cli.default_timeout_ms))
        .receive_timeout(Duration::from_millis(cli.receive_timeout_ms))
        .execution_mode(match cli.mode {
            cli::Mode::Sync => ExecutionMode::Sync,
            cli::Mode::Async => ExecutionMode::Async,
        })
        .executor_threads(cli.threads)
        .correlation_capacity(cli.correlation_capacity)
}

fn parse_line(line: &str, json: bool) -> Result<Message, serde_json::Error> {
    if json {
        serde_json::from_str(line)
    } else {
        Ok(Message::new(line))
    }
}

fn render(message: &Message, json: bool) -> String {
    if json {
        serde_json::to_string(message).unwrap_or_else(|_| message.payload().to_owned())
    } else {
        message.payload().to_owned()
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: Option<std::net::SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(addr) = addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "serving metrics");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: Option<std::net::SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
    if addr.is_some() {
        tracing::warn!("metrics support is disabled; ignoring --metrics-addr");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only replies.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    install_metrics(cli.metrics_addr)?;

    let simulator = Arc::new(
        Simulator::builder()
            .config(config(&cli))
            .scenario(cli.default_scenario.clone(), Echo)
            .scenario("Hello", Hello)
            .build()?,
    );

    let tracker = TaskTracker::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let message = match parse_line(&line, cli.json) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed message");
                continue;
            }
        };
        let simulator = Arc::clone(&simulator);
        let json = cli.json;
        tracker.spawn(async move {
            match simulator.dispatch(message).await {
                Ok(Some(reply)) => println!("{}", render(&reply, json)),
                Ok(None) => println!("<no response>"),
                Err(e) => tracing::error!(error = %e, "dispatch failed"),
            }
        });
    }

    tracker.close();
    tracker.wait().await;
    simulator.shutdown().await;
    Ok(())
}
