//! Periodic pool upkeep: drop dead free connections, then top up to the floor.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::PooledConnectionProvider;
use crate::connections::connection::is_alive;
use crate::connections::provider::ConnectionProvider;
use crate::metrics::record_pool_size;

impl PooledConnectionProvider {
    pub(super) fn start_maintenance(&self, handle: &Handle) {
        let weak = self.weak_self.clone();
        let period = self.config().maintenance_interval();

        let task = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(provider) = weak.upgrade() else {
                    break;
                };
                provider.run_maintenance().await;
            }
        });

        if let Some(previous) = self.maintenance.lock().replace(task) {
            previous.abort();
        }
        debug!(period_ms = period.as_millis(), "Pool maintenance started");
    }

    /// One maintenance pass.
    pub async fn run_maintenance(&self) {
        let evicted = self.cleanup();
        let opened = self.warm_up().await;
        if evicted > 0 || opened > 0 {
            debug!(evicted, opened, "Pool maintenance pass");
        }
    }

    /// Close and drop free connections that are no longer alive.
    /// Returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let lifetime = self.config().connection_lifetime();
        let evicted = {
            let mut pool = self.pool.lock();
            let before = pool.free.len();
            pool.free.retain(|connection| {
                let alive = is_alive(connection.as_ref(), lifetime);
                if !alive && connection.is_open() {
                    connection.close();
                }
                alive
            });
            record_pool_size(pool.free.len(), pool.used.len());
            before - pool.free.len()
        };
        if evicted > 0 {
            self.wake_waiters();
        }
        evicted
    }

    /// Open connections until the pool holds `min_pool_size`. Stops at the first
    /// failure, which is reported against its server. Returns how many were opened.
    pub async fn warm_up(&self) -> usize {
        let min = self.config().min_pool_size;
        let max = self.config().max_pool_size;
        let mut opened = 0;

        loop {
            let filled = self.pool.lock().len() >= min;
            if filled {
                break;
            }
            let Some(server) = self.servers().next() else {
                break;
            };
            let connection = match self.base.new_connection(&server) {
                Ok(connection) => connection,
                Err(err) => {
                    warn!(server = %server, error = %err, "Failed to create warm-up connection");
                    self.servers().error_occurred(&server, Some(&err));
                    break;
                },
            };
            if let Err(err) = connection.open().await {
                warn!(server = %server, error = %err, "Warm-up connection failed");
                self.servers().error_occurred(&server, Some(&err));
                connection.close();
                break;
            }

            let pooled = {
                let mut pool = self.pool.lock();
                let room = pool.len() < max;
                if room {
                    pool.free.push_back(Arc::clone(&connection));
                    record_pool_size(pool.free.len(), pool.used.len());
                }
                room
            };
            if !pooled {
                connection.close();
                break;
            }
            opened += 1;
            self.available.notify_one();
        }
        opened
    }
}
