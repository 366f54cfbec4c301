//! # gitmcp Transport Traits
//!
//! Core transport traits and types for the gitmcp server runtime.
//! This crate provides the foundational abstractions that every protocol binding depends on.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`TransportBinding`], [`TransportFactory`], [`RequestHandler`]
//! - **Types**: [`TransportKind`], [`LifecycleState`], [`ConnectionInfo`], [`TransportMessage`]
//! - **Config**: [`TransportConfig`] and its per-kind variants
//! - **Lifecycle**: [`Lifecycle`], the state cell every binding embeds
//! - **Errors**: [`TransportError`], [`TransportResult`]
//!
//! ## Usage
//!
//! Bindings embed a [`Lifecycle`] and implement [`TransportBinding`]:
//!
//! ```rust,ignore
//! use gitmcp_transport_traits::{Lifecycle, TransportBinding, TransportKind};
//!
//! #[derive(Debug)]
//! struct MyBinding { lifecycle: Lifecycle }
//!
//! impl TransportBinding for MyBinding {
//!     fn kind(&self) -> TransportKind { self.lifecycle.kind() }
//!     // ... start, stop, state, connection_info, closed
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod config;
mod error;
mod handler;
mod info;
mod lifecycle;
mod message;
mod traits;
mod types;

// Re-export all public items
pub use config::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HOST, DEFAULT_HTTP_HEALTH_PATH, DEFAULT_HTTP_PORT,
    DEFAULT_SSE_HEALTH_PATH, DEFAULT_SSE_PORT, DEFAULT_WEBSOCKET_PORT, HttpConfig, SseConfig,
    StdioConfig, StdioFraming, TransportConfig, WebSocketConfig,
};
pub use error::{TransportError, TransportResult};
pub use handler::{HandlerFn, RequestHandler, SharedHandler, handler_fn};
pub use info::{ConnectionInfo, HealthReport, HealthStatus, InfoValue};
pub use lifecycle::{Lifecycle, drain_within};
pub use message::{TransportMessage, TransportMessageMetadata};
pub use traits::{TransportBinding, TransportFactory};
pub use types::{LifecycleState, TransportKind, UnknownTransportKind};

/// Largest single message any binding accepts (10 MiB).
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Tracing target for per-connection events (accepts, disconnects, frame errors).
///
/// The logging setup filters this target separately so connection chatter can
/// be silenced without hiding lifecycle events.
pub const CONNECTION_LOG_TARGET: &str = "gitmcp::connection";
