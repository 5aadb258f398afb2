//! Concurrency limiter
//!
//! A counting permit pool bounding how many jobs execute at once. Permits
//! are RAII guards: dropping one returns it to the pool, so release happens
//! on every exit path of the guarded work (return, error, panic unwind,
//! task abort).

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of execution permits
///
/// Clones share the same pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// One acquired execution slot, released on drop
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing `max` concurrent holders (at least one)
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Waits until a permit is free and takes it
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        LimiterPermit { _permit: permit }
    }

    /// Configured maximum
    pub fn max(&self) -> usize {
        self.max
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }
}
