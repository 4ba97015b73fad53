//! In-memory block store for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use blockload_blob::{BlobError, BlockStore};
use blockload_protocol::{BlockId, ByteRange};
use tokio_util::sync::CancellationToken;

/// Records every call and serves the committed object back.
#[derive(Default)]
pub(crate) struct MockStore {
    blocks: Mutex<HashMap<u32, Vec<u8>>>,
    completion_order: Mutex<Vec<u32>>,
    commits: Mutex<Vec<(Vec<BlockId>, String)>>,
    committed: Mutex<Option<Vec<u8>>>,
    fail_blocks: HashSet<u32>,
    fail_commit: bool,
    delays: HashMap<u32, Duration>,
    cancel_on_put: Mutex<Option<CancellationToken>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_block(mut self, index: u32) -> Self {
        self.fail_blocks.insert(index);
        self
    }

    pub fn fail_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn delay(mut self, index: u32, millis: u64) -> Self {
        self.delays.insert(index, Duration::from_millis(millis));
        self
    }

    /// Cancels `token` as soon as any block upload begins.
    pub fn cancel_on_put(&self, token: CancellationToken) {
        *self.cancel_on_put.lock().unwrap() = Some(token);
    }

    pub fn put_count(&self) -> usize {
        self.completion_order.lock().unwrap().len()
    }

    /// Block indices in the order their uploads finished.
    pub fn completion_order(&self) -> Vec<u32> {
        self.completion_order.lock().unwrap().clone()
    }

    pub fn block(&self, index: u32) -> Option<Vec<u8>> {
        self.blocks.lock().unwrap().get(&index).cloned()
    }

    pub fn commits(&self) -> Vec<(Vec<BlockId>, String)> {
        self.commits.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl BlockStore for MockStore {
    fn put_block(
        &self,
        block_id: BlockId,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>> {
        Box::pin(async move {
            let index = block_id.index();
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(token) = self.cancel_on_put.lock().unwrap().as_ref() {
                token.cancel();
            }
            if let Some(delay) = self.delays.get(&index) {
                tokio::time::sleep(*delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completion_order.lock().unwrap().push(index);

            if self.fail_blocks.contains(&index) {
                return Err(BlobError::Status {
                    operation: "put block",
                    status: 500,
                    body: "InternalError".into(),
                });
            }
            self.blocks.lock().unwrap().insert(index, data);
            Ok(())
        })
    }

    fn put_block_list(
        &self,
        ids: Vec<BlockId>,
        content_type: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobError>> + Send + '_>> {
        Box::pin(async move {
            self.commits
                .lock()
                .unwrap()
                .push((ids.clone(), content_type));

            if self.fail_commit {
                return Err(BlobError::Status {
                    operation: "put block list",
                    status: 403,
                    body: "AuthenticationFailed".into(),
                });
            }

            let blocks = self.blocks.lock().unwrap();
            let mut object = Vec::new();
            for id in &ids {
                match blocks.get(&id.index()) {
                    Some(data) => object.extend_from_slice(data),
                    None => {
                        return Err(BlobError::Status {
                            operation: "put block list",
                            status: 400,
                            body: "InvalidBlockList".into(),
                        });
                    }
                }
            }
            *self.committed.lock().unwrap() = Some(object);
            Ok(())
        })
    }

    fn get_block(
        &self,
        range: Option<ByteRange>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, BlobError>> + Send + '_>> {
        Box::pin(async move {
            let committed = self.committed.lock().unwrap();
            let Some(object) = committed.as_ref() else {
                return Err(BlobError::Status {
                    operation: "get block",
                    status: 404,
                    body: "BlobNotFound".into(),
                });
            };
            Ok(match range {
                Some(r) => {
                    let end = (r.end as usize).min(object.len());
                    object[(r.start as usize).min(end)..end].to_vec()
                }
                None => object.clone(),
            })
        })
    }

    fn location(&self) -> String {
        "mock://container/object".into()
    }
}

/// Writes `len` bytes of a repeating non-trivial pattern to `dir/name`.
pub(crate) fn write_source(dir: &Path, name: &str, len: usize) -> (PathBuf, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(&data).unwrap();
    (path, data)
}
