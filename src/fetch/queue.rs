//! Bounded request queue
//!
//! Admission control for upstream calls. Backed by tokio's semaphore, which is
//! fair: waiters acquire permits in the order they started waiting.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::{PaddockError, Result};

/// Limits the number of concurrently in-flight upstream requests.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl RequestQueue {
    /// Create a queue admitting at most `capacity` concurrent requests.
    pub fn new(capacity: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(capacity)), capacity }
    }

    /// Wait for a free slot.
    ///
    /// The returned permit holds the slot until it is dropped or released.
    pub async fn acquire(&self) -> Result<RequestPermit> {
        let permit =
            self.semaphore.clone().acquire_owned().await.map_err(|_| PaddockError::QueueClosed)?;
        trace!(available = self.semaphore.available_permits(), "Request permit acquired");
        Ok(RequestPermit { _permit: permit })
    }

    /// Number of slots currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reject all current and future waiters.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// A held queue slot, released on drop.
#[derive(Debug)]
pub struct RequestPermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestPermit {
    /// Release the slot explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for RequestPermit {
    fn drop(&mut self) {
        trace!("Request permit released");
    }
}
