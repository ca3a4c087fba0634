//! Contracts the pool requires from the wrapped transport and its connector.

use async_trait::async_trait;

use crate::BoxError;

/// Connectivity state reported by a transport.
///
/// The pool only acts on [`Shutdown`](ConnectivityState::Shutdown); the other
/// variants exist so channel implementations can map their native states
/// losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// No activity on the channel
    Idle,
    /// The channel is establishing a connection
    Connecting,
    /// The channel is accepting calls
    Ready,
    /// The channel has seen a recoverable failure
    TransientFailure,
    /// The channel has shut down and will never accept calls again
    Shutdown,
}

/// A physical transport that multiplexes many concurrent calls.
///
/// Implementations must distinguish [`ConnectivityState::Shutdown`] from all
/// other states, and `close` must be safe to call once per connection.
pub trait Transport: Send + Sync + 'static {
    /// Current connectivity state of the transport.
    fn state(&self) -> ConnectivityState;

    /// Close the transport. Errors are reported by the pool, not retried.
    fn close(&self) -> Result<(), BoxError>;
}

/// Factory for new physical connections.
///
/// Called by the pool at construction time, during growth under load, and by
/// the maintenance loop when refilling. Must be safe to call concurrently;
/// the pool serializes growth dials internally but never assumes
/// single-caller semantics.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport type produced by this connector.
    type Transport: Transport;

    /// Dial a new physical connection.
    async fn connect(&self) -> Result<Self::Transport, BoxError>;
}

/// Adapter turning an async closure into a [`Connector`].
///
/// See [`connect_fn`].
pub struct ConnectFn<F>(F);

/// Wrap a zero-argument async closure as a [`Connector`].
///
/// ```rust,ignore
/// let pool = Pool::new(connect_fn(|| async { dial_channel().await }), config).await?;
/// ```
pub fn connect_fn<F, Fut, T>(f: F) -> ConnectFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Transport,
{
    ConnectFn(f)
}

#[async_trait]
impl<F, Fut, T> Connector for ConnectFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Transport,
{
    type Transport = T;

    async fn connect(&self) -> Result<T, BoxError> {
        (self.0)().await
    }
}
