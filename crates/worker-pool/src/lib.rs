//! Bounded FIFO worker pool for async jobs.
//!
//! A pool of `N` slots runs at most `N` jobs at once on the tokio runtime.
//! Jobs submitted while every slot is busy wait in a FIFO queue and are
//! dispatched onto the next slot that frees up. Each job reports through its
//! own [`JobHandle`].
//!
//! [`WorkerPool::stop`] is a soft stop: queued jobs are discarded and never
//! start, jobs already running finish and still report.

mod error;
mod pool;

pub use error::PoolError;
pub use pool::{JobHandle, WorkerPool};
