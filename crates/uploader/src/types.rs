//! Options, events and results of an upload.

use std::time::Duration;

use blockload_protocol::constants::{DEFAULT_BLOCK_SIZE, DEFAULT_CONTENT_TYPE};
use blockload_protocol::{BlockId, EncryptionArtifact};
use serde::{Deserialize, Serialize};

/// Tunables for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Bytes per block; the last block may be shorter.
    #[serde(default = "default_block_size")]
    pub block_size: u64,

    /// Blocks in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Content type of the committed object.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Send `Content-MD5` with every block.
    #[serde(default = "default_true")]
    pub content_md5: bool,
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

fn default_concurrency() -> usize {
    4
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.into()
}

fn default_true() -> bool {
    true
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            concurrency: default_concurrency(),
            content_type: default_content_type(),
            content_md5: default_true(),
        }
    }
}

/// Progress event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started {
        upload_id: String,
        total_size: u64,
        block_count: usize,
    },
    /// A block finished uploading.
    Progress {
        upload_id: String,
        completed_blocks: usize,
        block_count: usize,
        /// `completed_blocks / block_count`.
        progress: f64,
        uploaded_bytes: u64,
        bytes_per_second: f64,
        eta: Option<Duration>,
    },
    Committed {
        upload_id: String,
        block_count: usize,
    },
    Failed {
        upload_id: String,
        error: String,
    },
}

/// Outcome of a committed upload.
///
/// Serialized for the attachment-registration call that follows an upload;
/// `artifacts` is what a reader needs to decrypt the object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub upload_id: String,
    pub total_size: u64,
    pub block_count: usize,
    pub content_type: String,
    /// Committed ids in index order.
    pub block_ids: Vec<BlockId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<EncryptionArtifact>>,
}

impl UploadResult {
    pub fn is_encrypted(&self) -> bool {
        self.artifacts.is_some()
    }
}
