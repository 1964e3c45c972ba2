//! Command line interface for the `scenario-simulator` binary.
//!
//! Every option can also be supplied through a `SIMULATOR_*` environment
//! variable. The definition is shared with the build script, which renders
//! the man page from it.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

/// Scheduling discipline selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Run one script at a time.
    Sync,
    /// Run scripts on a bounded background pool.
    Async,
}

/// Command line arguments for the `scenario-simulator` binary.
#[derive(Debug, Parser)]
#[command(
    name = "scenario-simulator",
    version,
    about = "Answer messages read from stdin with scripted scenarios"
)]
pub struct Cli {
    /// Scenario started when no other scenario matches a message.
    #[arg(long, env = "SIMULATOR_DEFAULT_SCENARIO", default_value = "Default")]
    pub default_scenario: String,

    /// Milliseconds to wait for a scripted response.
    #[arg(long, env = "SIMULATOR_DEFAULT_TIMEOUT_MS", default_value_t = 5000)]
    pub default_timeout_ms: u64,

    /// Milliseconds a script waits when receiving a message.
    #[arg(long, env = "SIMULATOR_RECEIVE_TIMEOUT_MS", default_value_t = 5000)]
    pub receive_timeout_ms: u64,

    /// Script scheduling discipline.
    #[arg(long, value_enum, env = "SIMULATOR_MODE", default_value_t = Mode::Async)]
    pub mode: Mode,

    /// Maximum concurrently running scripts in async mode.
    #[arg(long, env = "SIMULATOR_THREADS", default_value_t = 10)]
    pub threads: usize,

    /// Maximum number of live correlation handlers.
    #[arg(long, env = "SIMULATOR_CORRELATION_CAPACITY", default_value_t = 1000)]
    pub correlation_capacity: usize,

    /// Read and write messages as JSON objects instead of raw payload lines.
    #[arg(long)]
    pub json: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "SIMULATOR_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
