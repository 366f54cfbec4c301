//! The request handler capability supplied by the host application.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TransportResult;
use crate::message::TransportMessage;

/// Processes one decoded message and produces the encoded reply.
///
/// `Ok(None)` means the message needs no reply (a notification). Bindings call
/// the handler concurrently from many connection tasks, so implementations must
/// be `Send + Sync`.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a single message.
    fn handle(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>>;
}

/// Shared handle to the host's request handler.
pub type SharedHandler = Arc<dyn RequestHandler>;

/// Adapter turning an async closure into a [`RequestHandler`].
///
/// Created with [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Wrap an async closure as a [`SharedHandler`].
///
/// ```rust
/// use gitmcp_transport_traits::{handler_fn, TransportMessage};
///
/// let echo = handler_fn(|msg: TransportMessage| async move { Ok(Some(msg)) });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(TransportMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TransportResult<Option<TransportMessage>>> + Send + 'static,
{
    Arc::new(HandlerFn { f })
}

impl<F, Fut> RequestHandler for HandlerFn<F>
where
    F: Fn(TransportMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TransportResult<Option<TransportMessage>>> + Send + 'static,
{
    fn handle(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin((self.f)(message))
    }
}
