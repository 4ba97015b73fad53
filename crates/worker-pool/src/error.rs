//! Pool error types.

/// Reasons a submitted job produced no output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The job was still queued when the pool stopped.
    #[error("job discarded before it started")]
    Discarded,

    /// The job was submitted after the pool stopped.
    #[error("pool is stopped")]
    Stopped,

    #[error("job panicked: {0}")]
    Panicked(String),
}
