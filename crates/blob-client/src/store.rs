//! Upload-side view of one remote object.

use std::future::Future;
use std::pin::Pin;

use blockload_protocol::{BlockId, ByteRange, UploadTarget};

use crate::client::BlobClient;
use crate::error::BlobError;

/// Block operations against a single object.
///
/// The uploader depends on this trait rather than on [`BlobClient`] so it
/// can be driven by in-memory stores in tests.
pub trait BlockStore: Send + Sync {
    /// Uploads one uncommitted block.
    fn put_block(
        &self,
        block_id: BlockId,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>>;

    /// Commits the object from `ids`, in order.
    fn put_block_list(
        &self,
        ids: Vec<BlockId>,
        content_type: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>>;

    /// Reads the committed object, or `range` of it.
    fn get_block(
        &self,
        range: Option<ByteRange>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, BlobError>> + Send + '_>>;

    /// Object location safe for logs (no signature).
    fn location(&self) -> String;
}

/// A [`BlobClient`] bound to one [`UploadTarget`].
#[derive(Debug, Clone)]
pub struct BlobTarget {
    client: BlobClient,
    target: UploadTarget,
}

impl BlobTarget {
    pub fn new(client: BlobClient, target: UploadTarget) -> Self {
        Self { client, target }
    }

    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    pub fn client(&self) -> &BlobClient {
        &self.client
    }
}

impl BlockStore for BlobTarget {
    fn put_block(
        &self,
        block_id: BlockId,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>> {
        Box::pin(self.client.put_block(&self.target, block_id, data))
    }

    fn put_block_list(
        &self,
        ids: Vec<BlockId>,
        content_type: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .put_block_list(&self.target, &ids, &content_type)
                .await
        })
    }

    fn get_block(
        &self,
        range: Option<ByteRange>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, BlobError>> + Send + '_>> {
        Box::pin(
            self.client
                .get_block(&self.target.url, range, &self.target.headers),
        )
    }

    fn location(&self) -> String {
        match self.target.url.split_once('?') {
            Some((base, _)) => base.to_string(),
            None => self.target.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_server::BlobServer;

    #[tokio::test]
    async fn store_round_trip_through_trait_object() {
        let server = BlobServer::start().await;
        let target = UploadTarget::new(server.url("/c/o?sig=abc"));
        let store: Arc<dyn BlockStore> =
            Arc::new(BlobTarget::new(BlobClient::new().unwrap(), target));

        let a = BlockId::new(0).unwrap();
        let b = BlockId::new(1).unwrap();
        store.put_block(b, b"world".to_vec()).await.unwrap();
        store.put_block(a, b"hello ".to_vec()).await.unwrap();
        store
            .put_block_list(vec![a, b], "text/plain".into())
            .await
            .unwrap();

        assert_eq!(store.get_block(None).await.unwrap(), b"hello world");
        let tail = store
            .get_block(Some(ByteRange::new(6, 11).unwrap()))
            .await
            .unwrap();
        assert_eq!(tail, b"world");
        assert!(store.location().ends_with("/c/o"));
    }
}
