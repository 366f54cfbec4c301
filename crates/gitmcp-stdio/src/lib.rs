//! # gitmcp STDIO Transport
//!
//! Standard I/O binding for the gitmcp server runtime. Messages arrive on stdin
//! and replies go to stdout; stdout carries nothing else, so all logging goes
//! to stderr.
//!
//! ## Framing
//!
//! - **Newline-delimited** (default): one message per line, blank lines skipped
//! - **Content-Length**: `Content-Length: N` header block, then `N` body bytes
//!
//! Frames larger than [`MAX_MESSAGE_SIZE`](gitmcp_transport_traits::MAX_MESSAGE_SIZE)
//! are rejected.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gitmcp_stdio::StdioTransport;
//! use gitmcp_transport_traits::{StdioConfig, TransportBinding};
//!
//! let transport = StdioTransport::new(StdioConfig::default());
//! transport.start(handler).await?;
//! transport.closed().await; // stdin EOF
//! transport.stop(timeout).await?;
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

mod codec;
mod transport;

pub use codec::{Frame, StdioCodec};
pub use transport::{StdioTransport, StdioTransportFactory};

// Re-export common types for convenience
pub use gitmcp_transport_traits::{
    StdioConfig, StdioFraming, TransportBinding, TransportError, TransportFactory,
    TransportResult,
};
