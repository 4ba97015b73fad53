//! Wire types for the block blob upload protocol.
//!
//! Everything both sides of the protocol agree on lives here: block
//! identifiers, byte ranges, encryption artifacts, header names and the
//! block list XML body.

pub mod block_id;
pub mod constants;
pub mod types;
pub mod wire;

// Re-export primary types for convenience.
pub use block_id::BlockId;
pub use types::{BlobProperties, ByteRange, EncryptionArtifact, UploadTarget};
pub use wire::{block_list_xml, parse_block_list, request_date};

/// Errors produced while building or parsing protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid block id: {0}")]
    InvalidBlockId(String),

    #[error("block index {0} exceeds the protocol limit")]
    BlockIndexOutOfRange(u32),

    #[error("invalid byte range: {start}..{end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("malformed block list: {0}")]
    BlockList(String),
}
