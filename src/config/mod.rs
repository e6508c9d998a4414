use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// `qngin -c <config.yaml> -d <database-file> [-v]`
#[derive(Parser, Debug, Clone)]
#[command(name = "qngin", about = "call-queue health aggregator")]
pub struct AggregatorArgs {
    /// Path to the websockets config file.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Path to the shared sqlite database file.
    #[arg(short = 'd', long = "database", value_name = "FILE")]
    pub database: PathBuf,

    /// Raise the log level to debug.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// `rngin -i <addr> -p <port> -f <rules.yaml> -d <db> [-v]`
#[derive(Parser, Debug, Clone)]
#[command(name = "rngin", about = "SIP policy routing engine")]
pub struct RuleEngineArgs {
    /// Listening IP address or hostname.
    #[arg(short = 'i', long = "ip", value_name = "ADDR")]
    pub ip: String,

    /// Listening TCP port.
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: u16,

    /// Path to the YAML rule file.
    #[arg(short = 'f', long = "rules", value_name = "FILE")]
    pub rules: PathBuf,

    /// Path to the shared sqlite database file.
    #[arg(short = 'd', long = "database", value_name = "FILE")]
    pub database: PathBuf,

    /// Raise the log level to debug.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl RuleEngineArgs {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Initializes the process-wide tracing subscriber.
///
/// Mirrors the source's `-v` / `LOGCATDBG` category switch: `verbose` forces
/// the `debug` level for this crate regardless of `RUST_LOG`, otherwise the
/// `RUST_LOG` env var is honored with an `info` default.
pub fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
