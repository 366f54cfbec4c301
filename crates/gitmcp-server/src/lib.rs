//! # gitmcp Server Runtime
//!
//! Everything between the command line and a running transport binding:
//!
//! - **Configuration** - environment, config file and CLI layers resolved into
//!   one typed [`TransportConfig`](gitmcp_transport_traits::TransportConfig)
//!   with fixed precedence (CLI > env > file > defaults)
//! - **Registry** - maps each transport kind to its factory
//! - **Supervisor** - start, wait for a signal or shutdown request, graceful stop
//! - **Logging** - `tracing-subscriber` to stderr, optional JSON and file output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gitmcp_server::{EnvVars, Supervisor, TransportRegistry, resolve_settings};
//! use gitmcp_transport_traits::{TransportMessage, handler_fn};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = resolve_settings(&EnvVars::from_process(), None, None)?;
//! let _guard = settings.logging.init()?;
//!
//! let supervisor = Supervisor::from_settings(&TransportRegistry::with_defaults(), &settings)?;
//! let reason = supervisor
//!     .run(handler_fn(|msg: TransportMessage| async move { Ok(Some(msg)) }))
//!     .await?;
//! println!("stopped: {reason}");
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

pub mod config;
pub mod error;
pub mod logging;
mod registry;
mod supervisor;

pub use config::{
    CliOverrides, DEFAULT_SHUTDOWN_TIMEOUT, EnvVars, FileConfig, ServerSettings, resolve,
    resolve_settings,
};
pub use error::{ConfigError, ServerError, ServerResult};
pub use logging::{LogLevel, LoggingGuard, LoggingSettings};
pub use registry::TransportRegistry;
pub use supervisor::{ShutdownHandle, ShutdownReason, Supervisor};
