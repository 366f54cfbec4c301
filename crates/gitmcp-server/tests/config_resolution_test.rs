//! Resolution against the real process environment and real config files.

use std::io::Write;
use std::time::Duration;

use gitmcp_server::config::{MCP_HTTP_PORT, MCP_LOG_LEVEL, MCP_TRANSPORT, MCP_WS_PORT};
use gitmcp_server::{
    CliOverrides, ConfigError, EnvVars, FileConfig, LogLevel, resolve, resolve_settings,
};
use gitmcp_transport_traits::{TransportConfig, TransportKind};
use pretty_assertions::assert_eq;
use serial_test::serial;

/// Sets variables for the lifetime of the guard.
struct ScopedEnv(Vec<&'static str>);

impl ScopedEnv {
    #[allow(unsafe_code)]
    fn set(vars: &[(&'static str, &str)]) -> Self {
        for (key, value) in vars {
            // SAFETY: every test touching the environment is #[serial].
            unsafe { std::env::set_var(key, value) };
        }
        Self(vars.iter().map(|(k, _)| *k).collect())
    }
}

impl Drop for ScopedEnv {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        for key in &self.0 {
            // SAFETY: see `set`.
            unsafe { std::env::remove_var(key) };
        }
    }
}

fn port_of(config: &TransportConfig) -> u16 {
    config.bind_target().expect("network transport").1
}

fn toml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

#[test]
#[serial]
fn test_cli_port_beats_env_port() {
    let _env = ScopedEnv::set(&[(MCP_TRANSPORT, "http"), (MCP_HTTP_PORT, "9000")]);
    let env = EnvVars::from_process();

    let env_only = resolve(&env, None, None).unwrap();
    assert_eq!(env_only.kind(), TransportKind::Http);
    assert_eq!(port_of(&env_only), 9000);

    let cli = CliOverrides {
        port: Some(9100),
        ..CliOverrides::default()
    };
    assert_eq!(port_of(&resolve(&env, None, Some(&cli)).unwrap()), 9100);
}

#[test]
#[serial]
fn test_env_beats_file() {
    let file = toml_file(
        r#"
[transport]
type = "websocket"
shutdown_timeout = 4

[transport.websocket]
host = "127.0.0.1"
port = 9301
heartbeat_interval = 5

[transport.logging]
level = "error"
"#,
    );
    let file = FileConfig::from_file(file.path()).unwrap();

    let from_file = resolve_settings(&EnvVars::from_process(), Some(&file), None).unwrap();
    let TransportConfig::WebSocket(ws) = &from_file.transport else {
        panic!("expected websocket, got {:?}", from_file.transport);
    };
    assert_eq!((ws.host.as_str(), ws.port), ("127.0.0.1", 9301));
    assert_eq!(ws.heartbeat_interval, Duration::from_secs(5));
    assert_eq!(from_file.logging.level, LogLevel::Error);
    assert_eq!(from_file.shutdown_timeout, Duration::from_secs(4));

    let _env = ScopedEnv::set(&[(MCP_WS_PORT, "9302"), (MCP_LOG_LEVEL, "debug")]);
    let layered = resolve_settings(&EnvVars::from_process(), Some(&file), None).unwrap();
    assert_eq!(port_of(&layered.transport), 9302);
    assert_eq!(layered.logging.level, LogLevel::Debug);
    // Untouched fields still come from the file.
    assert_eq!(layered.transport.bind_target().unwrap().0, "127.0.0.1");
}

#[test]
#[serial]
fn test_invalid_env_values_are_reported() {
    let _env = ScopedEnv::set(&[(MCP_TRANSPORT, "carrier-pigeon")]);
    let err = resolve(&EnvVars::from_process(), None, None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid transport 'carrier-pigeon' from MCP_TRANSPORT (expected one of: stdio, http, websocket, sse)"
    );
}

#[test]
fn test_file_port_out_of_range() {
    let file = toml_file("[transport]\ntype = \"sse\"\n[transport.sse]\nport = 70000\n");
    let file = FileConfig::from_file(file.path()).unwrap();
    let err = resolve(&EnvVars::new(), Some(&file), None).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidPort { ref origin, .. } if origin == "transport.sse.port"
    ));
}
