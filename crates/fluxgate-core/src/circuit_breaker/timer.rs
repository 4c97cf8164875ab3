//! One-shot reset timer driven by the Tokio runtime.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

use super::CircuitBreaker;

pub(super) struct ResetTimer {
    generation: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResetTimer {
    pub(super) fn new() -> Self {
        Self { generation: AtomicU64::new(0), task: Mutex::new(None) }
    }

    /// Schedule `breaker` to go half-open after `delay`, replacing any pending firing.
    pub(super) fn arm(&self, breaker: Weak<CircuitBreaker>, delay: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        match Handle::try_current() {
            Ok(handle) => {
                *task = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(breaker) = breaker.upgrade() {
                        breaker.reset_interval_elapsed(generation);
                    }
                }));
            },
            Err(_) => {
                warn!("No Tokio runtime available, breaker stays open until reset explicitly");
            },
        }
    }

    pub(super) fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub(super) fn is_armed(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Retire the firing with `generation`. Returns `false` if it is stale.
    pub(super) fn complete(&self, generation: u64) -> bool {
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        // Detach rather than abort: this runs inside the timer task itself.
        drop(self.task.lock().take());
        true
    }
}

impl Drop for ResetTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
