//! Minimal end-to-end pool usage against an in-memory transport.
//!
//! Run with `RUST_LOG=muxpool=debug cargo run --example status` to watch the
//! maintenance loop reclaim connections once the burst subsides.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use muxpool::prelude::*;

#[derive(Clone, Default)]
struct InMemoryChannel {
    shutdown: Arc<AtomicBool>,
}

impl Transport for InMemoryChannel {
    fn state(&self) -> ConnectivityState {
        if self.shutdown.load(Ordering::Acquire) {
            ConnectivityState::Shutdown
        } else {
            ConnectivityState::Ready
        }
    }

    fn close(&self) -> Result<(), BoxError> {
        self.shutdown.store(true, Ordering::Release);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = PoolConfig::new()
        .with_min_idle(2)
        .with_max_streams(4)
        .with_maintenance_interval(Duration::from_millis(200))
        .with_debug();

    let pool = Pool::new(
        connect_fn(|| async { Ok(InMemoryChannel::default()) }),
        config,
    )
    .await?;

    // Burst past the baseline capacity so the pool grows
    let mut handles = Vec::new();
    for _ in 0..10 {
        handles.push(pool.get().await?);
    }

    let status = pool.status();
    println!(
        "under load: {} connections, {} calls in flight, utilization {:.2}",
        status.connections,
        status.in_flight,
        status.utilization()
    );

    for handle in handles {
        pool.put(handle);
    }

    tokio::time::sleep(Duration::from_millis(600)).await;
    println!(
        "after shrink: {} connections",
        pool.status().connections
    );

    pool.close()
}
