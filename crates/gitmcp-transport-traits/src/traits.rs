//! Core transport traits.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::TransportResult;
use crate::handler::SharedHandler;
use crate::info::{ConnectionInfo, HealthReport};
use crate::types::{LifecycleState, TransportKind};

/// The lifecycle contract every protocol binding implements.
///
/// A binding owns its listening socket or stream handles from `start()` until
/// `stop()` returns. State moves `Created → Running → Stopping → Stopped` and
/// never backwards.
pub trait TransportBinding: Send + Sync + std::fmt::Debug {
    /// Returns the kind of this binding.
    fn kind(&self) -> TransportKind;

    /// Begin accepting input and forwarding it to `handler`.
    ///
    /// Network bindings bind their listener here; the stdio binding starts
    /// reading standard input. Fails with `AlreadyRunning` unless the binding
    /// is in `Created`, leaving the state untouched.
    fn start(
        &self,
        handler: SharedHandler,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Stop accepting work, drain in-flight exchanges for up to `timeout`, then
    /// force-close what is left.
    ///
    /// Always ends in `Stopped` and returns `Ok` from a running binding, even
    /// when the drain budget runs out. A no-op returning `Ok` from `Created` or
    /// `Stopped`.
    fn stop(
        &self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Returns the current lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Returns `true` iff the binding is `Running`.
    fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Describe the binding. Callable in any state.
    fn connection_info(&self) -> ConnectionInfo;

    /// Resolves when the binding has stopped serving, either because `stop()`
    /// completed or because it ended on its own.
    fn closed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

    /// Health document for this binding.
    fn health(&self) -> HealthReport {
        HealthReport::new(self.kind(), self.state(), self.connection_info())
    }
}

/// A constructor for one transport kind.
pub trait TransportFactory: Send + Sync + std::fmt::Debug {
    /// Returns the kind of binding this factory creates.
    fn kind(&self) -> TransportKind;

    /// Creates a new binding from the matching configuration variant.
    ///
    /// Implementations reject variants of another kind with `UnsupportedTransport`.
    fn create(&self, config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that traits can be used as trait objects
    fn _test_binding_object(_t: &dyn TransportBinding) {}
    fn _test_factory_object(_t: &dyn TransportFactory) {}
}
