//! Concurrency bulkhead.
//!
//! # Responsibilities
//! - Bound the number of logical calls in flight
//! - Shed excess calls immediately instead of queueing them
//!
//! # Design Decisions
//! - A single atomic counter updated with compare-and-swap
//! - One permit per logical call; every retry attempt runs under it
//! - `BulkheadPermit` releases on drop, so success, failure, panic and cancellation all
//!   return the permit exactly once

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Non-blocking counting semaphore.
#[derive(Debug)]
pub struct Bulkhead {
    max_inflight: usize,
    in_flight: AtomicUsize,
}

impl Bulkhead {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            max_inflight,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Take a permit if one is free. Never waits.
    pub fn try_acquire(&self) -> bool {
        let mut prev = self.in_flight.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_inflight {
                return false;
            }
            match self.in_flight.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Return a permit taken by `try_acquire`.
    pub fn release(&self) {
        let released = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |n| n.checked_sub(1));
        if released.is_err() {
            tracing::warn!("Bulkhead release without a matching acquire");
        }
    }

    /// Take a permit as a guard that releases on drop.
    pub fn try_acquire_permit(self: &Arc<Self>) -> Option<BulkheadPermit> {
        self.try_acquire().then(|| BulkheadPermit {
            bulkhead: Arc::clone(self),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        self.max_inflight.saturating_sub(self.in_flight())
    }

    pub fn max_inflight(&self) -> usize {
        self.max_inflight
    }
}

/// RAII permit for one logical call.
#[derive(Debug)]
pub struct BulkheadPermit {
    bulkhead: Arc<Bulkhead>,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.bulkhead.release();
    }
}
