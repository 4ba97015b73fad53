//! Per-block encryption for block uploads.
//!
//! Every block is sealed independently so blocks can be uploaded, and later
//! fetched with ranged reads, in any order. The encoder returns the
//! ciphertext together with the [`EncryptionArtifact`] needed to open it.
//!
//! [`EncryptionArtifact`]: blockload_protocol::EncryptionArtifact

mod aes;
mod encoder;

pub use aes::{AesGcmEncoder, EncryptionKey, IV_LEN, KEY_LEN, TAG_LEN};
pub use encoder::{BlockEncoder, EncodedBlock, PlaintextEncoder};

/// Errors produced while sealing or opening blocks.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed for bytes {start}..{end}")]
    Encrypt { start: u64, end: u64 },

    #[error("decryption failed for bytes {start}..{end}")]
    Decrypt { start: u64, end: u64 },

    #[error("malformed artifact: {0}")]
    Artifact(String),
}
