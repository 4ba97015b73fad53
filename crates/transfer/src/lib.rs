//! Block planning, ranged chunk reads and upload session bookkeeping.

mod chunked;
mod plan;
mod progress;
mod types;

use std::path::PathBuf;

pub use chunked::{ChunkReader, read_range};
pub use plan::{BlockPlan, UploadJob};
pub use progress::SpeedCalculator;
pub use types::UploadSession;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid range: {from}..{to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("invalid block size {block_size}: {reason}")]
    InvalidBlockSize { block_size: u64, reason: String },

    #[error("{block_count} blocks exceed the limit of {limit}")]
    TooManyBlocks { block_count: u64, limit: u64 },

    #[error("block index {index} out of range for {block_count} blocks")]
    UnknownBlock { index: usize, block_count: usize },

    #[error("only {completed} of {block_count} blocks uploaded")]
    Incomplete { completed: usize, block_count: usize },

    #[error("block {0} has no encryption artifact")]
    MissingArtifact(usize),

    #[error("source changed while reading: expected {expected} bytes at offset {from}, got {actual}")]
    SourceChanged { from: u64, expected: u64, actual: u64 },
}

impl TransferError {
    /// Maps an open/read error, keeping "missing source" distinct.
    pub(crate) fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            TransferError::NotFound(path.to_path_buf())
        } else {
            TransferError::Io(err)
        }
    }
}
