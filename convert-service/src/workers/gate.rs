use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("all {capacity} conversion slots stayed busy for {waited_secs}s")]
pub struct Saturated {
    pub capacity: usize,
    pub waited_secs: u64,
}

/// Bounds how many engine processes run at once. Callers queue for a slot
/// for at most `queue_timeout`.
#[derive(Debug, Clone)]
pub struct ConversionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

/// A held conversion slot; released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConversionGate {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn admit(&self) -> Result<GatePermit, Saturated> {
        let saturated = || Saturated {
            capacity: self.capacity,
            waited_secs: self.queue_timeout.as_secs(),
        };

        let permit = tokio::time::timeout(self.queue_timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| saturated())?
            // The semaphore is never closed, but treat it like saturation if it ever is.
            .map_err(|_| saturated())?;

        metrics::gauge!("conversions_in_flight").increment(1.0);
        Ok(GatePermit { _permit: permit })
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        metrics::gauge!("conversions_in_flight").decrement(1.0);
    }
}
