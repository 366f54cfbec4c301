//! # gitmcp HTTP Transports
//!
//! axum based server bindings for the gitmcp runtime.
//!
//! ## Bindings
//!
//! - [`HttpTransport`] (feature `http`): POST `/` or `/mcp`, one reply per request
//! - [`SseTransport`] (feature `sse`): GET `/sse` event streams, POST `/messages?session_id=`
//!
//! Both serve a JSON health document (`/health` and `/healthz` by default) that
//! answers 200 while the binding is running and 503 otherwise, and apply CORS
//! from the configured origin list.
//!
//! The [`server`] module holds the listener and drain plumbing; the WebSocket
//! binding reuses it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gitmcp_http::HttpTransport;
//! use gitmcp_transport_traits::{HttpConfig, TransportBinding, TransportMessage, handler_fn};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new(HttpConfig::new("127.0.0.1", 8000));
//!     transport
//!         .start(handler_fn(|msg: TransportMessage| async move { Ok(Some(msg)) }))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     transport.stop(Duration::from_secs(10)).await?;
//!     Ok(())
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

pub mod cors;
pub mod server;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "sse")]
mod sse;

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportFactory};
#[cfg(feature = "sse")]
pub use sse::{MESSAGES_PATH, SSE_PATH, SseTransport, SseTransportFactory};

// Re-export common types for convenience
pub use gitmcp_transport_traits::{
    HttpConfig, SseConfig, TransportBinding, TransportError, TransportFactory, TransportResult,
};
