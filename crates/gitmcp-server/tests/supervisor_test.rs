//! Supervisor lifecycle against real bindings.

use std::sync::Arc;
use std::time::Duration;

use gitmcp_server::{ServerError, ShutdownReason, Supervisor, TransportRegistry};
use gitmcp_stdio::StdioTransport;
use gitmcp_transport_traits::{
    HttpConfig, LifecycleState, SharedHandler, StdioConfig, TransportConfig, TransportError,
    TransportMessage, handler_fn,
};
use pretty_assertions::assert_eq;
use tokio::io::AsyncWriteExt;

const WAIT: Duration = Duration::from_secs(5);

fn echo() -> SharedHandler {
    handler_fn(|msg: TransportMessage| async move { Ok(Some(msg)) })
}

fn http_supervisor(port: u16) -> Supervisor {
    let binding = TransportRegistry::with_defaults()
        .create(&TransportConfig::Http(HttpConfig::new("127.0.0.1", port)))
        .expect("http compiled in");
    Supervisor::new(binding, Duration::from_secs(2)).with_signal_handlers(false)
}

#[tokio::test]
async fn test_run_until_shutdown_requested() {
    let supervisor = Arc::new(http_supervisor(0));
    let handle = supervisor.shutdown_handle();

    let task = tokio::spawn({
        let supervisor = Arc::clone(&supervisor);
        async move { supervisor.run(echo()).await }
    });

    tokio::time::timeout(WAIT, async {
        while !supervisor.binding().is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("binding starts");

    let report = supervisor.health();
    assert!(report.is_healthy());
    let port = report.connection.get_number("port").expect("port");
    let health = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    handle.shutdown();
    let reason = tokio::time::timeout(WAIT, task)
        .await
        .expect("run returns")
        .unwrap()
        .unwrap();
    assert_eq!(reason, ShutdownReason::Requested);
    assert_eq!(supervisor.binding().state(), LifecycleState::Stopped);
    assert!(!supervisor.health().is_healthy());
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let supervisor = http_supervisor(port);
    let err = supervisor.run(echo()).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, ServerError::Transport(TransportError::Bind { .. })));
    assert!(err.to_string().contains(&format!("port {port} already in use")));
    assert_eq!(supervisor.binding().state(), LifecycleState::Created);
}

#[tokio::test]
async fn test_stdio_eof_ends_run() {
    let (mut client, server_in) = tokio::io::duplex(1024);
    let (server_out, _client_out) = tokio::io::duplex(1024);
    let binding = StdioTransport::with_io(StdioConfig::default(), server_in, server_out);
    let supervisor = Supervisor::new(Box::new(binding), Duration::from_secs(1))
        .with_signal_handlers(false);

    let closer = tokio::spawn(async move {
        client.write_all(b"{\"id\":1}\n").await.unwrap();
        client.shutdown().await.unwrap();
    });

    let reason = tokio::time::timeout(WAIT, supervisor.run(echo()))
        .await
        .expect("run returns on EOF")
        .unwrap();
    closer.await.unwrap();

    assert_eq!(reason, ShutdownReason::BindingClosed);
    assert_eq!(supervisor.binding().state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_unsupported_kind() {
    let settings = gitmcp_server::resolve_settings(&gitmcp_server::EnvVars::new(), None, None)
        .unwrap();
    let err = Supervisor::from_settings(&TransportRegistry::new(), &settings).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "Unsupported transport: stdio");
}
