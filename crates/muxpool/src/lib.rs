#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for pool-level operations.
///
/// Use this target for logging pool construction, acquisition, growth, and shutdown.
pub const TRACING_TARGET_POOL: &str = "muxpool::pool";

/// Tracing target for per-connection slot accounting.
///
/// Use this target for logging call-slot reservation and release on individual connections.
pub const TRACING_TARGET_CONN: &str = "muxpool::conn";

/// Tracing target for the background maintenance loop.
///
/// Use this target for logging refill, eviction, and shrink activity.
pub const TRACING_TARGET_MAINTENANCE: &str = "muxpool::maintenance";

mod config;
mod conn;
mod error;
mod handle;
mod pool;
pub mod prelude;
mod transport;

pub use config::PoolConfig;
pub use error::{BoxError, Error, Result};
pub use handle::LogicalConn;
pub use pool::{Pool, PoolStatus};
pub use transport::{ConnectFn, ConnectivityState, Connector, Transport, connect_fn};
