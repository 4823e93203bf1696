use std::num::NonZeroUsize;

use tokio::sync::{Semaphore, SemaphorePermit};

/// A capacity-bounded permit pool limiting simultaneous in-flight requests.
///
/// Waiters are served in the order they called [`ConcurrencyGate::acquire`]
/// (FIFO, as guaranteed by [`Semaphore`]), so no caller can be starved.
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Semaphore,
    capacity: usize,
}

impl ConcurrencyGate {
    /// Create a gate that admits at most `capacity` concurrent holders.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            semaphore: Semaphore::new(capacity.get()),
            capacity: capacity.get(),
        }
    }

    /// Suspend until fewer than `capacity` permits are held, then grant one.
    ///
    /// The permit is returned to the pool when the [`GatePermit`] is dropped,
    /// on every exit path: success, error, or cancellation of the holding
    /// task.
    pub async fn acquire(&self) -> GatePermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            // SAFETY: this should not panic as we never close the semaphore
            .expect("Semaphore was closed unexpectedly");
        GatePermit { _permit: permit }
    }

    /// The configured maximum number of concurrent holders.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of permits currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

/// RAII guard for one slot past the gate.
///
/// Dropping the guard releases the slot exactly once.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
}
