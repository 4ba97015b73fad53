use std::fmt;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use blockload_protocol::{ByteRange, EncryptionArtifact};

use crate::CryptoError;
use crate::encoder::{BlockEncoder, EncodedBlock};

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// A 256-bit AES key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Parses a standard base64 key, as stored in config files.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// AES-256-GCM with a fresh random IV per block and a detached tag.
///
/// The block's byte range is bound as associated data, so a block moved to
/// another offset fails to open.
pub struct AesGcmEncoder {
    cipher: Aes256Gcm,
}

impl AesGcmEncoder {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(GenericArray::from_slice(key.as_bytes())),
        }
    }
}

impl fmt::Debug for AesGcmEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncoder").finish_non_exhaustive()
    }
}

fn associated_data(range: &ByteRange) -> [u8; 16] {
    let mut aad = [0u8; 16];
    aad[..8].copy_from_slice(&range.start.to_be_bytes());
    aad[8..].copy_from_slice(&range.end.to_be_bytes());
    aad
}

impl BlockEncoder for AesGcmEncoder {
    fn encode(&self, range: ByteRange, mut data: Vec<u8>) -> Result<EncodedBlock, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let tag = self
            .cipher
            .encrypt_in_place_detached(&nonce, &associated_data(&range), &mut data)
            .map_err(|_| CryptoError::Encrypt {
                start: range.start,
                end: range.end,
            })?;

        Ok(EncodedBlock {
            data,
            artifact: Some(EncryptionArtifact {
                iv: nonce.to_vec(),
                tag: tag.to_vec(),
                range,
            }),
        })
    }

    fn decode(
        &self,
        artifact: Option<&EncryptionArtifact>,
        mut data: Vec<u8>,
    ) -> Result<Vec<u8>, CryptoError> {
        let artifact = artifact
            .ok_or_else(|| CryptoError::Artifact("encrypted block has no artifact".into()))?;
        if artifact.iv.len() != IV_LEN {
            return Err(CryptoError::Artifact(format!(
                "iv must be {IV_LEN} bytes, got {}",
                artifact.iv.len()
            )));
        }
        if artifact.tag.len() != TAG_LEN {
            return Err(CryptoError::Artifact(format!(
                "tag must be {TAG_LEN} bytes, got {}",
                artifact.tag.len()
            )));
        }

        let range = artifact.range;
        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&artifact.iv),
                &associated_data(&range),
                &mut data,
                GenericArray::from_slice(&artifact.tag),
            )
            .map_err(|_| CryptoError::Decrypt {
                start: range.start,
                end: range.end,
            })?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> ByteRange {
        ByteRange::new(start, end).unwrap()
    }

    #[test]
    fn round_trip_keeps_length() {
        let encoder = AesGcmEncoder::new(&EncryptionKey::generate());
        let plain = b"the quick brown fox".to_vec();
        let r = range(100, 100 + plain.len() as u64);

        let encoded = encoder.encode(r, plain.clone()).unwrap();
        assert_eq!(encoded.data.len(), plain.len());
        assert_ne!(encoded.data, plain);

        let artifact = encoded.artifact.clone().unwrap();
        assert_eq!(artifact.iv.len(), IV_LEN);
        assert_eq!(artifact.tag.len(), TAG_LEN);
        assert_eq!(artifact.range, r);

        let decoded = encoder.decode(Some(&artifact), encoded.data).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn fresh_iv_per_block() {
        let encoder = AesGcmEncoder::new(&EncryptionKey::generate());
        let a = encoder.encode(range(0, 4), b"same".to_vec()).unwrap();
        let b = encoder.encode(range(0, 4), b"same".to_vec()).unwrap();
        assert_ne!(a.artifact.unwrap().iv, b.artifact.unwrap().iv);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let encoder = AesGcmEncoder::new(&EncryptionKey::generate());
        let mut encoded = encoder.encode(range(0, 5), b"hello".to_vec()).unwrap();
        encoded.data[0] ^= 0x01;
        let err = encoder
            .decode(encoded.artifact.as_ref(), encoded.data)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt { start: 0, end: 5 }));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let encoder = AesGcmEncoder::new(&EncryptionKey::generate());
        let other = AesGcmEncoder::new(&EncryptionKey::generate());
        let encoded = encoder.encode(range(0, 5), b"hello".to_vec()).unwrap();
        assert!(other.decode(encoded.artifact.as_ref(), encoded.data).is_err());
    }

    #[test]
    fn moved_block_is_rejected() {
        let encoder = AesGcmEncoder::new(&EncryptionKey::generate());
        let encoded = encoder.encode(range(0, 5), b"hello".to_vec()).unwrap();
        let mut artifact = encoded.artifact.unwrap();
        artifact.range = range(5, 10);
        assert!(encoder.decode(Some(&artifact), encoded.data).is_err());
    }

    #[test]
    fn malformed_artifact_is_rejected() {
        let encoder = AesGcmEncoder::new(&EncryptionKey::generate());
        let encoded = encoder.encode(range(0, 5), b"hello".to_vec()).unwrap();
        let mut artifact = encoded.artifact.unwrap();
        artifact.iv.truncate(8);
        let err = encoder.decode(Some(&artifact), encoded.data.clone()).unwrap_err();
        assert!(matches!(err, CryptoError::Artifact(_)));

        let err = encoder.decode(None, encoded.data).unwrap_err();
        assert!(matches!(err, CryptoError::Artifact(_)));
    }

    #[test]
    fn key_parsing() {
        let key = EncryptionKey::generate();
        let parsed = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(parsed, key);

        assert!(EncryptionKey::from_bytes(&[0u8; 16]).is_err());
        assert!(EncryptionKey::from_base64("not base64!").is_err());
        assert_eq!(format!("{key:?}"), "EncryptionKey(<redacted>)");
    }
}
