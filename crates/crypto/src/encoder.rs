use blockload_protocol::{ByteRange, EncryptionArtifact};

use crate::CryptoError;

/// A block ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlock {
    pub data: Vec<u8>,
    /// Present when the block was encrypted.
    pub artifact: Option<EncryptionArtifact>,
}

/// Transforms block bytes before upload and back after download.
///
/// `range` is the block's position in the object. Implementations must keep
/// the encoded length equal to the input length so ranged reads of the
/// committed object line up with the source.
pub trait BlockEncoder: Send + Sync {
    fn encode(&self, range: ByteRange, data: Vec<u8>) -> Result<EncodedBlock, CryptoError>;

    fn decode(
        &self,
        artifact: Option<&EncryptionArtifact>,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// Uploads blocks as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextEncoder;

impl BlockEncoder for PlaintextEncoder {
    fn encode(&self, _range: ByteRange, data: Vec<u8>) -> Result<EncodedBlock, CryptoError> {
        Ok(EncodedBlock {
            data,
            artifact: None,
        })
    }

    fn decode(
        &self,
        artifact: Option<&EncryptionArtifact>,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, CryptoError> {
        if artifact.is_some() {
            return Err(CryptoError::Artifact(
                "plaintext blocks carry no artifact".into(),
            ));
        }
        Ok(data)
    }
}
