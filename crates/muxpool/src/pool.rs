//! The pool: acquisition, growth under load, release, shutdown, and the
//! background maintenance loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::config::PoolConfig;
use crate::conn::PhysicalConn;
use crate::handle::{HandleCache, LogicalConn};
use crate::transport::Connector;
use crate::{Error, Result, TRACING_TARGET_MAINTENANCE, TRACING_TARGET_POOL};

/// Share of the connection list eligible for the random selection draw once
/// the pool has grown past its baseline. Connections past this window only
/// receive overflow traffic from the linear scan, so their load drains to zero
/// and the maintenance loop can reclaim them.
const WARM_SUBSET_RATIO: f64 = 0.8;

/// Outcome of a growth attempt.
enum Growth {
    /// One connection was dialed and appended
    Grew,
    /// Another caller grew the pool first; retry selection
    Raced,
    /// The pool is at its size ceiling
    AtCeiling,
}

/// Connection pool for multiplexed RPC transports.
///
/// Cheap to clone; all clones share the same connection set. See the crate
/// docs for the acquisition contract: one `put` per successful `get`.
pub struct Pool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<C: Connector> {
    /// Live connections in creation order. Mutated only under the write lock;
    /// selection runs under the read lock.
    conns: RwLock<Vec<Arc<PhysicalConn<C::Transport>>>>,
    connector: C,
    config: PoolConfig,
    closed: AtomicBool,
    /// Per-pool connection identity, no process-wide state.
    next_id: AtomicU64,
    /// Serializes growth dials so overloaded callers never stampede the
    /// connector.
    grow_lock: tokio::sync::Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    handles: HandleCache<C::Transport>,
}

impl<C: Connector> Pool<C> {
    /// Create a pool and pre-populate it with `min_idle` connections.
    ///
    /// Fails with the wrapped connector error if any initial dial fails;
    /// connections dialed before the failure are closed. Spawns the
    /// maintenance task on the current runtime.
    pub async fn new(connector: C, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(PoolInner {
            conns: RwLock::new(Vec::with_capacity(config.min_idle)),
            connector,
            config,
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            grow_lock: tokio::sync::Mutex::new(()),
            shutdown_tx,
            handles: HandleCache::new(),
        });

        for _ in 0..inner.config.min_idle {
            match inner.dial().await {
                Ok(conn) => inner.conns.write().push(conn),
                Err(err) => {
                    for conn in inner.conns.write().drain(..) {
                        if let Err(close_err) = conn.close() {
                            warn!(
                                target: TRACING_TARGET_POOL,
                                conn_id = conn.id(),
                                error = %close_err,
                                "failed to close connection while aborting pool construction"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }

        debug!(
            target: TRACING_TARGET_POOL,
            conns = inner.config.min_idle,
            "pool created"
        );

        Self::spawn_maintenance(&inner, shutdown_rx);
        Ok(Self { inner })
    }

    /// Acquire a logical connection, reserving one call slot.
    ///
    /// Selection is randomized: while the pool is at or below its `min_idle`
    /// baseline the draw covers every connection; once it has grown, the draw
    /// is restricted to the warm subset `max(1, round(n * 0.8))` (clamped so a
    /// tiny pool always has a candidate) and the remaining connections only
    /// serve as linear-scan overflow. When no candidate yields a slot the pool
    /// grows and the selection retries; the retry is bounded by the size
    /// ceiling, which surfaces [`Error::PoolOverload`].
    ///
    /// In nonblocking mode an exhausted selection fails immediately with
    /// [`Error::Overloaded`] instead of growing.
    pub async fn get(&self) -> Result<LogicalConn<C::Transport>> {
        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(Error::PoolClosed);
            }

            let (observed, selected) = {
                let conns = self.inner.conns.read();
                (conns.len(), self.inner.select(&conns))
            };

            if let Some(conn) = selected {
                if self.inner.config.debug {
                    debug!(
                        target: TRACING_TARGET_POOL,
                        conn_id = conn.id(),
                        "acquired logical connection"
                    );
                }
                return Ok(self.inner.handles.take(conn));
            }

            if self.inner.config.nonblocking {
                return Err(Error::Overloaded);
            }

            match self.inner.grow(observed).await? {
                Growth::AtCeiling => return Err(Error::PoolOverload),
                Growth::Grew | Growth::Raced => tokio::task::yield_now().await,
            }
        }
    }

    /// Release a logical connection, returning its call slot.
    ///
    /// Must be called exactly once per successful [`get`](Self::get). After
    /// [`close`](Self::close) this is a safe no-op: the slot is discarded
    /// because every transport has already been closed.
    pub fn put(&self, mut handle: LogicalConn<C::Transport>) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }

        if let Some(conn) = handle.unbind() {
            conn.release();
            if self.inner.config.debug {
                debug!(
                    target: TRACING_TARGET_POOL,
                    conn_id = conn.id(),
                    "released logical connection"
                );
            }
        }
        self.inner.handles.recycle(handle);
    }

    /// Shut the pool down.
    ///
    /// Signals the maintenance task, closes every connection (continuing past
    /// failures), and empties the connection set. Idempotent; returns the
    /// first transport close error encountered, if any.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _ = self.inner.shutdown_tx.send(true);

        let drained: Vec<_> = self.inner.conns.write().drain(..).collect();
        let count = drained.len();

        let mut first_err = None;
        for conn in drained {
            if let Err(err) = conn.close() {
                warn!(
                    target: TRACING_TARGET_POOL,
                    conn_id = conn.id(),
                    error = %err,
                    "transport close failed during shutdown"
                );
                first_err.get_or_insert(err);
            }
        }

        debug!(target: TRACING_TARGET_POOL, conns = count, "pool closed");
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Snapshot of the pool's current occupancy.
    pub fn status(&self) -> PoolStatus {
        let conns = self.inner.conns.read();
        let connections = conns.len();
        let available_slots: usize = conns.iter().map(|c| c.available() as usize).sum();
        let total_slots = connections * self.inner.config.max_streams as usize;

        PoolStatus {
            connections,
            available_slots,
            in_flight: total_slots - available_slots,
            max_size: self.inner.config.max_size,
        }
    }

    fn spawn_maintenance(inner: &Arc<PoolInner<C>>, mut shutdown_rx: watch::Receiver<bool>) {
        let weak = Arc::downgrade(inner);
        let interval = inner.config.maintenance_interval;

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.maintain().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!(target: TRACING_TARGET_MAINTENANCE, "maintenance task stopped");
        });
    }
}

impl<C: Connector> PoolInner<C> {
    async fn dial(&self) -> Result<Arc<PhysicalConn<C::Transport>>> {
        let transport = self.connector.connect().await.map_err(Error::builder)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(PhysicalConn::new(
            id,
            transport,
            self.config.max_streams,
            self.config.debug,
        )))
    }

    /// Pick a candidate within the warm subset and fall back to a linear scan
    /// over the rest of the list. Runs entirely under the read lock; the
    /// per-connection acquire never takes the pool lock.
    fn select(
        &self,
        conns: &[Arc<PhysicalConn<C::Transport>>],
    ) -> Option<Arc<PhysicalConn<C::Transport>>> {
        let n = conns.len();
        if n == 0 {
            return None;
        }

        let window = if n <= self.config.min_idle {
            n
        } else {
            ((n as f64 * WARM_SUBSET_RATIO).round() as usize).max(1)
        };
        let chosen = rand::rng().random_range(0..window);

        conns[chosen..]
            .iter()
            .find(|conn| match conn.try_acquire() {
                Ok(()) => true,
                Err(err) => {
                    debug_assert!(err.is_transient());
                    false
                }
            })
            .map(Arc::clone)
    }

    /// Grow the pool by one connection.
    ///
    /// `observed` is the connection count the caller saw while selecting; if
    /// it is stale by the time the growth lock is held, another caller already
    /// grew the pool and this attempt is a no-op. Reaching the size ceiling is
    /// also a silent no-op here; the caller's retry loop turns it into
    /// [`Error::PoolOverload`]. The dial happens outside the pool lock.
    async fn grow(&self, observed: usize) -> Result<Growth> {
        let _growing = self.grow_lock.lock().await;

        {
            let conns = self.conns.read();
            if conns.len() >= self.config.max_size {
                return Ok(Growth::AtCeiling);
            }
            if conns.len() != observed {
                return Ok(Growth::Raced);
            }
        }

        let conn = self.dial().await?;
        debug!(
            target: TRACING_TARGET_POOL,
            conn_id = conn.id(),
            conns = observed + 1,
            "pool grew under load"
        );

        let mut conns = self.conns.write();
        if self.closed.load(Ordering::Acquire) {
            drop(conns);
            if let Err(err) = conn.close() {
                warn!(
                    target: TRACING_TARGET_POOL,
                    conn_id = conn.id(),
                    error = %err,
                    "failed to close connection dialed during shutdown"
                );
            }
            return Err(Error::PoolClosed);
        }
        conns.push(conn);
        Ok(Growth::Grew)
    }

    /// One maintenance tick: refill to `min_idle`, sweep dead and timed-out
    /// connections, shrink excess idle connections.
    async fn maintain(&self) {
        // Refill. A dial failure aborts the tick; the next tick retries, so a
        // transient outage does not kill the loop.
        loop {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            let n = self.conns.read().len();
            if n >= self.config.min_idle {
                break;
            }

            match self.dial().await {
                Ok(conn) => {
                    let mut conns = self.conns.write();
                    if self.closed.load(Ordering::Acquire) {
                        drop(conns);
                        if let Err(err) = conn.close() {
                            warn!(
                                target: TRACING_TARGET_MAINTENANCE,
                                conn_id = conn.id(),
                                error = %err,
                                "failed to close refill connection after shutdown"
                            );
                        }
                        return;
                    }
                    debug!(
                        target: TRACING_TARGET_MAINTENANCE,
                        conn_id = conn.id(),
                        "refilled pool connection"
                    );
                    conns.push(conn);
                }
                Err(err) => {
                    error!(
                        target: TRACING_TARGET_MAINTENANCE,
                        error = %err,
                        "connector failed during refill, aborting maintenance tick"
                    );
                    return;
                }
            }
        }

        // Sweep and shrink in one in-place compaction pass; survivors keep
        // their relative order so the warm-subset selection stays stable.
        let mut evicted = Vec::new();
        let remaining = {
            let mut conns = self.conns.write();
            let mut idle_count = 0;
            let mut i = 0;
            while i < conns.len() {
                let conn = &conns[i];

                if conn.is_closed() {
                    evicted.push(conns.remove(i));
                    continue;
                }

                // Timed-out connections are reclaimed only while the pool
                // stays above its baseline; at or below min_idle they are
                // retained rather than churned through a remove-and-refill.
                if conns.len() > self.config.min_idle
                    && conn.is_timed_out(self.config.idle_timeout)
                {
                    evicted.push(conns.remove(i));
                    continue;
                }

                if conn.is_idle() {
                    idle_count += 1;
                    if idle_count > self.config.min_idle {
                        evicted.push(conns.remove(i));
                        continue;
                    }
                }

                i += 1;
            }
            conns.len()
        };

        for conn in evicted {
            debug!(
                target: TRACING_TARGET_MAINTENANCE,
                conn_id = conn.id(),
                "evicting connection"
            );
            if let Err(err) = conn.close() {
                warn!(
                    target: TRACING_TARGET_MAINTENANCE,
                    conn_id = conn.id(),
                    error = %err,
                    "transport close failed during sweep"
                );
            }
        }

        debug!(
            target: TRACING_TARGET_MAINTENANCE,
            conns = remaining,
            "maintenance tick complete"
        );
    }
}

/// Connection pool status information.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// Current number of physical connections
    pub connections: usize,
    /// Free call slots across all connections
    pub available_slots: usize,
    /// Reserved call slots across all connections
    pub in_flight: usize,
    /// Configured ceiling on the number of connections
    pub max_size: usize,
}

impl PoolStatus {
    /// Returns the fraction of call slots currently reserved (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        let total = self.available_slots + self.in_flight;
        if total == 0 {
            0.0
        } else {
            self.in_flight as f64 / total as f64
        }
    }
}
