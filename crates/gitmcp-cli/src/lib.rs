//! # gitmcp-serve
//!
//! Runs a gitmcp endpoint over the transport chosen at startup.
//!
//! ## Usage
//!
//! ```bash
//! # stdio (default): newline-delimited JSON on stdin/stdout
//! gitmcp-serve
//!
//! # HTTP on port 9000
//! gitmcp-serve --transport http --port 9000
//!
//! # WebSocket, settings from a file, environment overrides on top
//! MCP_WS_PORT=9001 gitmcp-serve --transport websocket --config gitmcp.toml
//! ```
//!
//! Exit status: 0 after a graceful shutdown, 1 on a configuration or startup
//! error, 2 on a usage error.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod cli;
pub mod echo;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use gitmcp_server::{EnvVars, FileConfig, Supervisor, TransportRegistry, resolve_settings};
use tokio::runtime::Runtime;

pub use cli::Cli;
pub use echo::echo_handler;

/// Grace period for runtime worker threads after the supervisor returns.
///
/// A blocking stdin read cannot be cancelled, so the runtime is not waited on
/// indefinitely.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Run the server described by `cli` and map the outcome to an exit status.
pub fn run(cli: Cli) -> ExitCode {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to initialize async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(serve(cli));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let file = cli
        .config
        .as_deref()
        .map(FileConfig::from_file)
        .transpose()
        .context("loading config file")?;
    let settings = resolve_settings(&EnvVars::from_process(), file.as_ref(), Some(&cli.overrides()))?;

    let _guard = settings.logging.init().context("initializing logging")?;

    let supervisor = Supervisor::from_settings(&TransportRegistry::with_defaults(), &settings)?;
    let reason = supervisor
        .run(echo_handler())
        .await
        .with_context(|| format!("{} transport failed", settings.transport.kind()))?;

    tracing::info!(%reason, "gitmcp-serve exiting");
    Ok(())
}
