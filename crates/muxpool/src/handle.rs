//! Logical connection handles and their free-list.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::conn::PhysicalConn;
use crate::transport::Transport;

/// How many released handle shells the free-list retains. Beyond this the
/// shells are simply dropped; under steady load the list never grows past the
/// number of in-flight calls that completed in one burst.
const HANDLE_CACHE_DEPTH: usize = 128;

/// A lightweight handle representing one reserved call slot.
///
/// Returned by `Pool::get`; issue any number of concurrent calls through
/// [`transport`](Self::transport), then return the handle with exactly one
/// `Pool::put`. Dropping the handle without calling `put` leaks the call slot
/// until the owning connection is swept; that is a caller bug and is not
/// defended against.
pub struct LogicalConn<T: Transport> {
    core: Box<HandleCore<T>>,
}

/// Boxed interior of a handle, recycled through [`HandleCache`] so the hot
/// path does not hit the allocator for every acquisition.
struct HandleCore<T: Transport> {
    conn: Option<Arc<PhysicalConn<T>>>,
}

impl<T: Transport> LogicalConn<T> {
    /// The wrapped transport, for issuing calls.
    pub fn transport(&self) -> &T {
        self.bound().transport()
    }

    /// Identity of the owning physical connection.
    pub fn conn_id(&self) -> u64 {
        self.bound().id()
    }

    fn bound(&self) -> &Arc<PhysicalConn<T>> {
        self.core
            .conn
            .as_ref()
            .expect("logical connection used after release")
    }

    /// Detach the owning connection so the slot can be released.
    pub(crate) fn unbind(&mut self) -> Option<Arc<PhysicalConn<T>>> {
        self.core.conn.take()
    }
}

/// Explicit free-list for handle shells.
///
/// Replaces a runtime-provided object cache with a mutexed vector under the
/// same synchronization discipline as the rest of the pool. Shells are always
/// cleared before they are parked here, so a recycled handle can never leak a
/// transport reference.
pub(crate) struct HandleCache<T: Transport> {
    shells: Mutex<Vec<Box<HandleCore<T>>>>,
}

impl<T: Transport> HandleCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            shells: Mutex::new(Vec::new()),
        }
    }

    /// Produce a handle bound to `conn`, recycling a parked shell when one is
    /// available.
    pub(crate) fn take(&self, conn: Arc<PhysicalConn<T>>) -> LogicalConn<T> {
        let mut core = self
            .shells
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new(HandleCore { conn: None }));
        core.conn = Some(conn);
        LogicalConn { core }
    }

    /// Park a handle shell for reuse. The caller must have unbound it first.
    pub(crate) fn recycle(&self, mut handle: LogicalConn<T>) {
        handle.core.conn = None;
        let mut shells = self.shells.lock();
        if shells.len() < HANDLE_CACHE_DEPTH {
            shells.push(handle.core);
        }
    }

    #[cfg(test)]
    fn parked(&self) -> usize {
        self.shells.lock().len()
    }
}
