//! Call-slot accounting for a single physical connection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::transport::{ConnectivityState, Transport};
use crate::{Error, Result, TRACING_TARGET_CONN};

/// One physical multiplexed connection and its remaining call-slot capacity.
///
/// The hot acquire path is lock-free: an atomic counter check rejects
/// overloaded connections before the short critical section that re-checks the
/// counter under the shutdown test. The `last_used` mutex doubles as that
/// critical-section lock; parking_lot mutexes spin briefly before parking,
/// which fits the O(1) sections here.
pub(crate) struct PhysicalConn<T: Transport> {
    id: u64,
    transport: T,
    capacity: u32,
    /// Free call slots. Invariant: `0 <= available <= capacity`.
    available: AtomicU32,
    last_used: Mutex<Instant>,
    debug: bool,
}

impl<T: Transport> PhysicalConn<T> {
    pub(crate) fn new(id: u64, transport: T, capacity: u32, debug: bool) -> Self {
        Self {
            id,
            transport,
            capacity,
            available: AtomicU32::new(capacity),
            last_used: Mutex::new(Instant::now()),
            debug,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Reserve one call slot.
    ///
    /// Fails with [`Error::Overloaded`] when no slots are free and with
    /// [`Error::ConnectionClosed`] when the transport has shut down. The
    /// overload check runs lock-free first, then again under the critical
    /// section so a racing release cannot produce a false grant.
    pub(crate) fn try_acquire(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) == 0 {
            return Err(Error::Overloaded);
        }

        let mut last_used = self.last_used.lock();

        if self.transport.state() == ConnectivityState::Shutdown {
            return Err(Error::ConnectionClosed);
        }
        if self.available.load(Ordering::Acquire) == 0 {
            return Err(Error::Overloaded);
        }

        let remaining = self.available.fetch_sub(1, Ordering::AcqRel) - 1;
        *last_used = Instant::now();

        if self.debug {
            debug!(
                target: TRACING_TARGET_CONN,
                conn_id = self.id,
                available = remaining,
                "reserved call slot"
            );
        }
        Ok(())
    }

    /// Return one call slot.
    ///
    /// Panics on double release: a post-increment value above `capacity` means
    /// a caller released a slot it never acquired, and the bookkeeping cannot
    /// be trusted past that point.
    pub(crate) fn release(&self) {
        let prev = self.available.fetch_add(1, Ordering::AcqRel);
        assert!(
            prev < self.capacity,
            "call slot double release on connection {} (available {} of {})",
            self.id,
            prev,
            self.capacity,
        );

        if self.debug {
            debug!(
                target: TRACING_TARGET_CONN,
                conn_id = self.id,
                available = prev + 1,
                "released call slot"
            );
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.transport.state() == ConnectivityState::Shutdown
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.available.load(Ordering::Acquire) == self.capacity
    }

    pub(crate) fn is_timed_out(&self, idle_timeout: Duration) -> bool {
        self.last_used.lock().elapsed() > idle_timeout
    }

    #[cfg(test)]
    pub(crate) fn last_used(&self) -> Instant {
        *self.last_used.lock()
    }

    /// Close the underlying transport, propagating its error to the caller.
    pub(crate) fn close(&self) -> Result<()> {
        let _last_used = self.last_used.lock();
        self.transport.close().map_err(Error::Transport)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::BoxError;

    #[derive(Clone, Default)]
    struct FakeChannel {
        shutdown: Arc<AtomicBool>,
    }

    impl Transport for FakeChannel {
        fn state(&self) -> ConnectivityState {
            if self.shutdown.load(Ordering::Acquire) {
                ConnectivityState::Shutdown
            } else {
                ConnectivityState::Ready
            }
        }

        fn close(&self) -> std::result::Result<(), BoxError> {
            self.shutdown.store(true, Ordering::Release);
            Ok(())
        }
    }

    fn conn(capacity: u32) -> PhysicalConn<FakeChannel> {
        PhysicalConn::new(1, FakeChannel::default(), capacity, false)
    }

    #[test]
    fn test_acquire_until_overloaded() {
        let conn = conn(2);

        conn.try_acquire().unwrap();
        conn.try_acquire().unwrap();
        assert_eq!(conn.available(), 0);
        assert!(matches!(conn.try_acquire(), Err(Error::Overloaded)));

        conn.release();
        conn.try_acquire().unwrap();
        assert_eq!(conn.available(), 0);
    }

    #[test]
    fn test_acquire_after_shutdown() {
        let conn = conn(4);
        conn.close().unwrap();

        assert!(conn.is_closed());
        assert!(matches!(conn.try_acquire(), Err(Error::ConnectionClosed)));
    }

    #[test]
    #[should_panic(expected = "double release")]
    fn test_double_release_panics() {
        let conn = conn(2);

        conn.try_acquire().unwrap();
        conn.release();
        // One more release than was ever acquired
        conn.release();
    }

    #[test]
    fn test_idle_predicate() {
        let conn = conn(3);
        assert!(conn.is_idle());

        conn.try_acquire().unwrap();
        assert!(!conn.is_idle());

        conn.release();
        assert!(conn.is_idle());
    }

    #[test]
    fn test_timeout_predicate() {
        let conn = conn(1);
        assert!(!conn.is_timed_out(Duration::from_secs(60)));

        std::thread::sleep(Duration::from_millis(15));
        assert!(conn.is_timed_out(Duration::from_millis(5)));

        // A fresh acquire resets the idle clock
        conn.try_acquire().unwrap();
        assert!(!conn.is_timed_out(Duration::from_millis(5)));
    }

    #[test]
    fn test_round_trip_restores_capacity() {
        let conn = conn(5);
        let mut previous = conn.last_used();

        for _ in 0..5 {
            conn.try_acquire().unwrap();
            let stamped = conn.last_used();
            assert!(stamped >= previous);
            previous = stamped;
            conn.release();
        }

        assert_eq!(conn.available(), 5);
        assert!(conn.is_idle());
    }
}
