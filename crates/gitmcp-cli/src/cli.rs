//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use gitmcp_server::{CliOverrides, LogLevel};
use gitmcp_transport_traits::TransportKind;

/// Serve a gitmcp endpoint over the selected transport.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "gitmcp-serve",
    version,
    about = "Serve a gitmcp endpoint over stdio, HTTP, WebSocket or SSE",
    long_about = "Serve a gitmcp endpoint over stdio, HTTP, WebSocket or SSE.\n\n\
                  Settings are taken from command-line flags, then MCP_* environment\n\
                  variables, then the config file, then built-in defaults.\n\
                  Logs go to stderr; with --transport stdio, stdout carries the protocol."
)]
pub struct Cli {
    /// Transport to serve over (stdio, http, websocket/ws, sse)
    #[arg(long, short = 't')]
    pub transport: Option<TransportKind>,

    /// Bind host for network transports
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port for network transports
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Config file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c', env = "GITMCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds to drain in-flight work on shutdown
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// The resolver's view of these flags.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            transport: self.transport,
            host: self.host.clone(),
            port: self.port,
            log_level: self.log_level,
            shutdown_timeout: self.shutdown_timeout,
            log_json: self.log_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_overrides() {
        let cli = Cli::try_parse_from([
            "gitmcp-serve",
            "--transport",
            "WS",
            "--host",
            "127.0.0.1",
            "-p",
            "9100",
            "--log-level",
            "debug",
            "--shutdown-timeout",
            "3",
            "--log-json",
        ])
        .unwrap();

        assert_eq!(
            cli.overrides(),
            CliOverrides {
                transport: Some(TransportKind::WebSocket),
                host: Some("127.0.0.1".to_string()),
                port: Some(9100),
                log_level: Some(LogLevel::Debug),
                shutdown_timeout: Some(3),
                log_json: true,
            }
        );
    }

    #[test]
    fn test_bad_values_are_usage_errors() {
        assert!(Cli::try_parse_from(["gitmcp-serve", "--transport", "grpc"]).is_err());
        assert!(Cli::try_parse_from(["gitmcp-serve", "--port", "70000"]).is_err());
        assert!(Cli::try_parse_from(["gitmcp-serve", "--log-level", "loud"]).is_err());
    }
}
