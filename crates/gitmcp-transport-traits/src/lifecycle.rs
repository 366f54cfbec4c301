//! Shared lifecycle state machine.
//!
//! Every binding embeds a [`Lifecycle`]. It owns the [`LifecycleState`], the
//! async mutex that serialises `start`/`stop`, and the one-shot `closed`
//! signal the supervisor waits on.
//!
//! # Interior Mutability Pattern
//!
//! - **parking_lot::RwLock** for the state (short-lived locks, never cross `.await`)
//! - **tokio::sync::Mutex** for transitions (held across the bind / drain awaits)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::error::{TransportError, TransportResult};
use crate::types::{LifecycleState, TransportKind};

/// Lifecycle cell shared between a binding and its background tasks.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    kind: TransportKind,
    state: Arc<RwLock<LifecycleState>>,
    transition: Arc<TokioMutex<()>>,
    closed: CancellationToken,
}

impl Lifecycle {
    /// A fresh lifecycle in `Created`.
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            state: Arc::new(RwLock::new(LifecycleState::Created)),
            transition: Arc::new(TokioMutex::new(())),
            closed: CancellationToken::new(),
        }
    }

    /// Kind of the owning binding.
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// `true` iff the state is `Running`.
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Acquire the transition lock. Hold it for the whole of `start` or `stop`.
    pub async fn lock_transition(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.transition).lock_owned().await
    }

    /// Fails with [`TransportError::AlreadyRunning`] unless the state is `Created`.
    pub fn ensure_startable(&self) -> TransportResult<()> {
        let state = self.state();
        if state == LifecycleState::Created {
            Ok(())
        } else {
            Err(TransportError::AlreadyRunning {
                kind: self.kind,
                state,
            })
        }
    }

    /// `Created` → `Running`, after a successful bind.
    pub fn mark_running(&self) {
        *self.state.write() = LifecycleState::Running;
        tracing::debug!(transport = %self.kind, "transport running");
    }

    /// `Running` → `Stopping`.
    ///
    /// Returns `false` (and changes nothing) from any other state, which makes
    /// `stop()` a no-op there.
    pub fn begin_stop(&self) -> bool {
        let mut state = self.state.write();
        if *state == LifecycleState::Running {
            *state = LifecycleState::Stopping;
            true
        } else {
            false
        }
    }

    /// Enter `Stopped` and fire the closed signal.
    pub fn mark_stopped(&self) {
        *self.state.write() = LifecycleState::Stopped;
        self.closed.cancel();
        tracing::debug!(transport = %self.kind, "transport stopped");
    }

    /// Fire the closed signal without changing state.
    ///
    /// Used when a serving loop ends on its own (stdin EOF, listener failure);
    /// the owner is still expected to call `stop()`.
    pub fn notify_closed(&self) {
        self.closed.cancel();
    }

    /// Whether the closed signal has fired.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the closed signal fires.
    pub fn closed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let token = self.closed.clone();
        Box::pin(async move { token.cancelled().await })
    }
}

/// Await `work` for at most `timeout`.
///
/// Returns [`TransportError::DrainTimeout`] when the budget runs out; the caller
/// then force-closes whatever is left.
pub async fn drain_within<F>(timeout: Duration, work: F) -> TransportResult<()>
where
    F: Future<Output = ()>,
{
    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| TransportError::DrainTimeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_only_from_created() {
        let lifecycle = Lifecycle::new(TransportKind::Http);
        assert!(lifecycle.ensure_startable().is_ok());

        lifecycle.mark_running();
        assert!(lifecycle.is_running());
        let err = lifecycle.ensure_startable().expect_err("second start");
        assert!(matches!(
            err,
            TransportError::AlreadyRunning {
                state: LifecycleState::Running,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_is_noop_outside_running() {
        let lifecycle = Lifecycle::new(TransportKind::Sse);
        assert!(!lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), LifecycleState::Created);

        lifecycle.mark_running();
        assert!(lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), LifecycleState::Stopping);
        assert!(!lifecycle.is_running());

        lifecycle.mark_stopped();
        assert!(!lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert!(lifecycle.ensure_startable().is_err());
    }

    #[tokio::test]
    async fn test_closed_fires_on_stop() {
        let lifecycle = Lifecycle::new(TransportKind::Stdio);
        let closed = lifecycle.closed();
        assert!(!lifecycle.is_closed());
        lifecycle.mark_running();
        lifecycle.mark_stopped();
        tokio::time::timeout(Duration::from_secs(1), closed)
            .await
            .expect("closed should resolve");
    }

    #[tokio::test]
    async fn test_drain_within_times_out() {
        let result = drain_within(Duration::from_millis(10), std::future::pending()).await;
        assert!(matches!(result, Err(TransportError::DrainTimeout(_))));

        let result = drain_within(Duration::from_millis(100), async {}).await;
        assert!(result.is_ok());
    }
}
