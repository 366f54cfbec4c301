//! Listener and serve-task plumbing shared by the axum based bindings.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gitmcp_transport_traits::{
    HealthReport, Lifecycle, TransportError, TransportResult, drain_within,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Bind a TCP listener on `host:port`.
///
/// Port 0 asks the OS for a free port; read it back from
/// [`TcpListener::local_addr`].
pub async fn bind_listener(host: &str, port: u16) -> TransportResult<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| TransportError::bind(host, port, &e))
}

/// Make sure a configured route path is absolute.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Health route response: 200 while running, 503 otherwise.
pub fn health_response(report: HealthReport) -> Response {
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, axum::Json(report)).into_response()
}

/// A running axum server task.
///
/// The task stops accepting when `shutdown` fires and finishes once every
/// open HTTP connection has completed. It fires the lifecycle's closed signal
/// when it ends, whether by shutdown or by a listener failure.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Spawn `router` on `listener`.
    pub fn spawn(
        listener: TcpListener,
        router: Router,
        shutdown: CancellationToken,
        lifecycle: Lifecycle,
    ) -> TransportResult<Self> {
        let local_addr = listener.local_addr()?;
        let kind = lifecycle.kind();

        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;

            match result {
                Ok(()) => debug!(transport = %kind, %local_addr, "server task finished"),
                Err(e) => error!(transport = %kind, %local_addr, error = %e, "server task failed"),
            }
            lifecycle.notify_closed();
        });

        Ok(Self { local_addr, task })
    }

    /// Address the listener is bound to.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server task, then `connections`, for at most `timeout`.
    ///
    /// The caller has already fired the shutdown token. When the budget runs
    /// out `force` is cancelled and the server task is aborted; the listener is
    /// released before this returns either way.
    pub async fn drain<F>(mut self, timeout: Duration, connections: F, force: &CancellationToken)
    where
        F: Future<Output = ()>,
    {
        let drained = {
            let task = &mut self.task;
            drain_within(timeout, async move {
                let _ = task.await;
                connections.await;
            })
            .await
        };

        if let Err(e) = drained {
            warn!(error = %e, local_addr = %self.local_addr, "graceful drain incomplete; force-closing");
            force.cancel();
            self.task.abort();
            let _ = self.task.await;
        }
    }
}
