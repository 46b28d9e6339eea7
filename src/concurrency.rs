//! Counting-permit gate for query fan-out. Cross-entity searches fire
//! several backend queries at once; the pool keeps that burst bounded.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::GraphError;

#[derive(Clone)]
pub struct QueryPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// A held permit. Dropping it returns the slot to the pool.
pub struct QueryPermit {
    _permit: OwnedSemaphorePermit,
}

impl QueryPool {
    pub fn new(capacity: usize) -> QueryPool {
        let capacity = capacity.max(1);
        QueryPool {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait until a slot is free.
    pub async fn acquire(&self) -> Result<QueryPermit, GraphError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| GraphError::connection("query pool is closed"))?;
        Ok(QueryPermit { _permit: permit })
    }
}
