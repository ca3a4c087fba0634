//! Prelude module for muxpool.
//!
//! Re-exports the types needed to build and use a pool with a single
//! `use` statement.
//!
//! # Example
//!
//! ```rust,ignore
//! use muxpool::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let pool = Pool::new(connect_fn(|| async { dial().await }), PoolConfig::new()).await?;
//! let handle = pool.get().await?;
//! pool.put(handle);
//! # Ok(())
//! # }
//! ```

// Pool types
pub use crate::config::PoolConfig;
pub use crate::handle::LogicalConn;
pub use crate::pool::{Pool, PoolStatus};
// Transport contracts
pub use crate::transport::{ConnectFn, ConnectivityState, Connector, Transport, connect_fn};
// Error types
pub use crate::{BoxError, Error, Result};
