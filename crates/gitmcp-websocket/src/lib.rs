//! # gitmcp WebSocket Transport
//!
//! Bidirectional WebSocket binding for the gitmcp server runtime.
//!
//! ## Features
//!
//! - Upgrades on `/` and `/ws`, health document on `/health`
//! - Requests on one connection are handled in order; connections are independent
//! - Heartbeat: a ping every `heartbeat_interval`; a peer that has not answered
//!   by the next tick is closed with a policy-violation close frame
//! - Graceful stop sends a going-away close frame to every peer, then force
//!   closes whatever is left when the drain budget runs out
//! - Frames above [`MAX_MESSAGE_SIZE`](gitmcp_transport_traits::MAX_MESSAGE_SIZE) are refused
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gitmcp_websocket::WebSocketTransport;
//! use gitmcp_transport_traits::{TransportBinding, TransportMessage, WebSocketConfig, handler_fn};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WebSocketConfig::new("127.0.0.1", 8001)
//!     .with_heartbeat_interval(Duration::from_secs(15));
//! let transport = WebSocketTransport::new(config);
//! transport
//!     .start(handler_fn(|msg: TransportMessage| async move { Ok(Some(msg)) }))
//!     .await?;
//! # Ok(())
//! # }
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

mod connection;
mod transport;

pub use transport::{HEALTH_PATH, WebSocketTransport, WebSocketTransportFactory};

// Re-export common types for convenience
pub use gitmcp_transport_traits::{
    TransportBinding, TransportError, TransportFactory, TransportResult, WebSocketConfig,
};
