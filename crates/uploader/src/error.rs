//! Upload error types.

use blockload_blob::BlobError;
use blockload_crypto::CryptoError;
use blockload_transfer::TransferError;
use blockload_worker_pool::PoolError;

/// What an aborted upload left behind on the server.
///
/// Uncommitted blocks are never cleaned up here; the service discards them
/// after its retention period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    NothingUploaded,
    Uncommitted { blocks: usize },
}

impl RemoteState {
    pub(crate) fn from_uploaded(blocks: usize) -> Self {
        if blocks == 0 {
            Self::NothingUploaded
        } else {
            Self::Uncommitted { blocks }
        }
    }

    pub fn uploaded_blocks(&self) -> usize {
        match self {
            Self::NothingUploaded => 0,
            Self::Uncommitted { blocks } => *blocks,
        }
    }
}

/// Why a single block did not upload.
#[derive(Debug, thiserror::Error)]
pub enum BlockFailure {
    #[error("read failed: {0}")]
    Read(#[from] TransferError),

    #[error("encryption failed: {0}")]
    Encrypt(#[from] CryptoError),

    #[error("transport error: {0}")]
    Transport(#[from] BlobError),

    #[error("worker error: {0}")]
    Worker(#[from] PoolError),
}

/// Errors produced by [`BlockUploader::upload`](crate::BlockUploader::upload).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The source could not be opened; nothing was sent.
    #[error("source error: {0}")]
    Source(#[source] TransferError),

    #[error("invalid upload plan: {0}")]
    Plan(#[source] TransferError),

    #[error("invalid options: {0}")]
    Options(String),

    /// First block failure; later failures are logged only.
    #[error("block {index} failed: {source}")]
    Block {
        index: usize,
        #[source]
        source: BlockFailure,
        state: RemoteState,
    },

    #[error("commit failed: {source}")]
    Commit {
        #[source]
        source: BlobError,
        state: RemoteState,
    },

    #[error("upload bookkeeping error: {source}")]
    Session {
        #[source]
        source: TransferError,
        state: RemoteState,
    },

    #[error("upload cancelled")]
    Cancelled { state: RemoteState },
}

impl UploadError {
    /// Blocks left on the server by this failure.
    pub fn remote_state(&self) -> RemoteState {
        match self {
            Self::Block { state, .. }
            | Self::Commit { state, .. }
            | Self::Session { state, .. }
            | Self::Cancelled { state } => *state,
            _ => RemoteState::NothingUploaded,
        }
    }
}

/// Errors produced while downloading a committed object.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("transport error: {0}")]
    Transport(#[from] BlobError),

    #[error("decryption failed: {0}")]
    Decrypt(#[from] CryptoError),

    #[error("artifact has an empty byte range {start}..{end}")]
    EmptyRange { start: u64, end: u64 },

    #[error("expected {expected} bytes for {start}..{end}, got {actual}")]
    Truncated {
        start: u64,
        end: u64,
        expected: u64,
        actual: u64,
    },
}
