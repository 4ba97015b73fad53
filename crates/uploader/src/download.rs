//! Reading committed objects back, decrypting block by block.

use blockload_blob::BlockStore;
use blockload_crypto::BlockEncoder;
use blockload_protocol::EncryptionArtifact;
use tracing::debug;

use crate::error::DownloadError;

/// Fetches the range described by `artifact` and decodes it.
pub async fn fetch_block(
    store: &dyn BlockStore,
    encoder: &dyn BlockEncoder,
    artifact: &EncryptionArtifact,
) -> Result<Vec<u8>, DownloadError> {
    let range = artifact.range;
    if range.is_empty() {
        return Err(DownloadError::EmptyRange {
            start: range.start,
            end: range.end,
        });
    }
    let data = store.get_block(Some(range)).await?;
    if data.len() as u64 != range.len() {
        return Err(DownloadError::Truncated {
            start: range.start,
            end: range.end,
            expected: range.len(),
            actual: data.len() as u64,
        });
    }
    Ok(encoder.decode(Some(artifact), data)?)
}

/// Downloads a committed object.
///
/// With `artifacts`, each block is fetched with a ranged read and decrypted
/// on its own; without, the whole object is read in one request.
pub async fn download_object(
    store: &dyn BlockStore,
    encoder: &dyn BlockEncoder,
    artifacts: Option<&[EncryptionArtifact]>,
) -> Result<Vec<u8>, DownloadError> {
    let Some(artifacts) = artifacts else {
        let data = store.get_block(None).await?;
        return Ok(encoder.decode(None, data)?);
    };

    let total: u64 = artifacts.iter().map(|a| a.range.len()).sum();
    let mut object = Vec::with_capacity(total as usize);
    for artifact in artifacts {
        object.extend(fetch_block(store, encoder, artifact).await?);
    }

    debug!(
        location = %store.location(),
        blocks = artifacts.len(),
        bytes = object.len(),
        "object downloaded"
    );
    Ok(object)
}
