//! Error types and utilities for pool operations.

/// Boxed error type used at the transport and connector seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for all pool operations in this crate.
///
/// This is a convenience type alias that defaults to using [`Error`] as the error type.
/// Most functions in this crate return this type for consistent error handling.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for pool operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted after the pool was shut down
    #[error("pool has been closed")]
    PoolClosed,

    /// The selected physical connection's transport has shut down
    #[error("connection has been closed")]
    ConnectionClosed,

    /// The selected physical connection has no free call slots
    #[error("connection has no free call slots")]
    Overloaded,

    /// Every connection is saturated and the pool has hit its size ceiling
    #[error("pool has reached its size ceiling with no free call slots")]
    PoolOverload,

    /// The connector failed to dial a new connection
    #[error("connector failed to create a connection: {source}")]
    Builder {
        #[source]
        source: BoxError,
    },

    /// A transport reported a failure while being closed
    #[error("transport close failed: {0}")]
    Transport(#[source] BoxError),

    /// Invalid configuration
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Wrap a connector dial failure
    pub fn builder(source: impl Into<BoxError>) -> Self {
        Self::Builder {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this error is recoverable by trying another connection or
    /// growing the pool.
    ///
    /// Only the per-connection conditions qualify; everything else is surfaced
    /// to the caller as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Overloaded | Self::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Overloaded.is_transient());
        assert!(Error::ConnectionClosed.is_transient());
        assert!(!Error::PoolClosed.is_transient());
        assert!(!Error::PoolOverload.is_transient());
        assert!(!Error::builder("dial refused").is_transient());
    }

    #[test]
    fn test_builder_wraps_source() {
        let err = Error::builder(std::io::Error::other("connection refused"));
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
