//! Upload orchestrator.
//!
//! Plans the blocks of one source file, runs one pool job per block, and
//! commits the object once every block has been stored. Progress is
//! reported through an event channel and the whole run can be cancelled.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blockload_blob::BlockStore;
use blockload_crypto::{AesGcmEncoder, BlockEncoder, EncryptionKey, PlaintextEncoder};
use blockload_protocol::EncryptionArtifact;
use blockload_transfer::{
    BlockPlan, ChunkReader, SpeedCalculator, TransferError, UploadJob, UploadSession, read_range,
};
use blockload_worker_pool::{PoolError, WorkerPool};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{BlockFailure, RemoteState, UploadError};
use crate::types::{UploadEvent, UploadOptions, UploadResult};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What a finished block job hands back to the completion loop.
struct BlockOutcome {
    index: usize,
    artifact: Option<EncryptionArtifact>,
    bytes: u64,
}

/// Uploads files as block blobs through a [`BlockStore`].
pub struct BlockUploader {
    store: Arc<dyn BlockStore>,
    encoder: Arc<dyn BlockEncoder>,
    options: UploadOptions,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl BlockUploader {
    /// Creates an uploader that stores blocks unencrypted.
    pub fn new(store: Arc<dyn BlockStore>, options: UploadOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            encoder: Arc::new(PlaintextEncoder),
            options,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Encrypts every block with AES-256-GCM under `key`.
    pub fn with_encryption(self, key: &EncryptionKey) -> Self {
        self.with_encoder(Arc::new(AesGcmEncoder::new(key)))
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn BlockEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this uploader.
    ///
    /// Cancelling discards blocks not yet started; blocks already uploading
    /// finish before the upload reports [`UploadError::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads `source` and commits it as one object.
    ///
    /// On failure nothing is committed. Blocks already stored stay on the
    /// server uncommitted, as reported by [`UploadError::remote_state`].
    pub async fn upload(&self, source: &Path) -> Result<UploadResult, UploadError> {
        let upload_id = uuid::Uuid::new_v4().to_string();

        match self.run(&upload_id, source).await {
            Ok(result) => {
                info!(
                    upload_id = %upload_id,
                    blocks = result.block_count,
                    bytes = result.total_size,
                    encrypted = result.is_encrypted(),
                    "upload committed"
                );
                self.emit(UploadEvent::Committed {
                    upload_id,
                    block_count: result.block_count,
                });
                Ok(result)
            }
            Err(e) => {
                error!(
                    upload_id = %upload_id,
                    error = %e,
                    remote = ?e.remote_state(),
                    "upload failed"
                );
                self.emit(UploadEvent::Failed {
                    upload_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, upload_id: &str, source: &Path) -> Result<UploadResult, UploadError> {
        let concurrency = NonZeroUsize::new(self.options.concurrency)
            .ok_or_else(|| UploadError::Options("concurrency must be positive".into()))?;

        // Opening the source up front keeps a missing file from costing a
        // single request.
        let total_size = ChunkReader::open(source)
            .await
            .map_err(UploadError::Source)?
            .size();
        let plan = BlockPlan::new(total_size, self.options.block_size).map_err(UploadError::Plan)?;
        let jobs = plan.jobs().map_err(UploadError::Plan)?;

        info!(
            upload_id,
            source = %source.display(),
            target = %self.store.location(),
            total_size,
            block_size = plan.block_size(),
            blocks = plan.block_count(),
            concurrency = concurrency.get(),
            "starting upload"
        );
        self.emit(UploadEvent::Started {
            upload_id: upload_id.to_string(),
            total_size,
            block_count: plan.block_count(),
        });

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled {
                state: RemoteState::NothingUploaded,
            });
        }

        let mut session = UploadSession::new(
            upload_id.to_string(),
            self.store.location(),
            plan,
            concurrency.get(),
        );
        self.upload_blocks(&mut session, source, jobs, concurrency)
            .await?;
        self.commit(&session).await
    }

    /// Runs every block job and waits for all of them to settle.
    async fn upload_blocks(
        &self,
        session: &mut UploadSession,
        source: &Path,
        jobs: Vec<UploadJob>,
        concurrency: NonZeroUsize,
    ) -> Result<(), UploadError> {
        let pool = WorkerPool::new(concurrency);
        let mut pending = FuturesUnordered::new();
        for job in jobs {
            let index = job.block_index;
            let handle = pool.submit(upload_block(
                job,
                source.to_path_buf(),
                Arc::clone(&self.store),
                Arc::clone(&self.encoder),
            ));
            pending.push(async move { (index, handle.join().await) });
        }

        let mut speed = SpeedCalculator::default();
        let mut first_failure: Option<(usize, BlockFailure)> = None;
        let mut cancelled = false;
        let mut discarded = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !cancelled && first_failure.is_none() => {
                    cancelled = true;
                    let dropped = pool.stop();
                    warn!(
                        upload_id = session.id(),
                        discarded = dropped,
                        running = pool.running(),
                        "upload cancelled, waiting for running blocks"
                    );
                    continue;
                }
                next = pending.next() => next,
            };
            let Some((index, joined)) = next else {
                break;
            };

            let failure = match joined {
                Ok(Ok(block)) => match self.record(session, &mut speed, block) {
                    Ok(()) => continue,
                    Err(e) => BlockFailure::Read(e),
                },
                Ok(Err(failure)) => failure,
                Err(PoolError::Discarded) if cancelled || first_failure.is_some() => {
                    discarded += 1;
                    continue;
                }
                Err(e) => BlockFailure::Worker(e),
            };

            if first_failure.is_some() {
                warn!(
                    upload_id = session.id(),
                    block = index,
                    error = %failure,
                    "suppressing later block failure"
                );
            } else {
                let dropped = pool.stop();
                error!(
                    upload_id = session.id(),
                    block = index,
                    error = %failure,
                    discarded = dropped,
                    "block failed, stopping upload"
                );
                first_failure = Some((index, failure));
            }
        }

        let state = RemoteState::from_uploaded(session.completed_blocks());
        if let Some((index, source)) = first_failure {
            return Err(UploadError::Block {
                index,
                source,
                state,
            });
        }
        if cancelled {
            debug!(upload_id = session.id(), discarded, "all running blocks settled");
            return Err(UploadError::Cancelled { state });
        }
        Ok(())
    }

    fn record(
        &self,
        session: &mut UploadSession,
        speed: &mut SpeedCalculator,
        block: BlockOutcome,
    ) -> Result<(), TransferError> {
        if !session.record_block(block.index, block.artifact, block.bytes)? {
            warn!(upload_id = session.id(), block = block.index, "block reported twice");
            return Ok(());
        }
        speed.add_sample(block.bytes);

        let completed = session.completed_blocks();
        let block_count = session.plan().block_count();
        debug!(
            upload_id = session.id(),
            block = block.index,
            completed,
            total = block_count,
            "block stored"
        );
        self.emit(UploadEvent::Progress {
            upload_id: session.id().to_string(),
            completed_blocks: completed,
            block_count,
            progress: session.progress(),
            uploaded_bytes: session.uploaded_bytes(),
            bytes_per_second: speed.bytes_per_second(),
            eta: speed.eta(session.remaining_bytes()),
        });
        Ok(())
    }

    /// Commits the ids in index order, whatever order the blocks landed in.
    async fn commit(&self, session: &UploadSession) -> Result<UploadResult, UploadError> {
        let state = RemoteState::from_uploaded(session.completed_blocks());
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled { state });
        }

        let block_ids = session
            .commit_list()
            .map_err(|source| UploadError::Session { source, state })?;
        let artifacts = session
            .artifacts()
            .map_err(|source| UploadError::Session { source, state })?;

        self.store
            .put_block_list(block_ids.clone(), self.options.content_type.clone())
            .await
            .map_err(|source| UploadError::Commit { source, state })?;

        Ok(UploadResult {
            upload_id: session.id().to_string(),
            total_size: session.plan().total_size(),
            block_count: session.plan().block_count(),
            content_type: self.options.content_type.clone(),
            block_ids,
            artifacts,
        })
    }

    /// Sends without waiting; a full channel drops the event.
    fn emit(&self, event: UploadEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            trace!(error = %e, "upload event dropped");
        }
    }
}

/// Reads, encodes and stores one block.
async fn upload_block(
    job: UploadJob,
    source: PathBuf,
    store: Arc<dyn BlockStore>,
    encoder: Arc<dyn BlockEncoder>,
) -> Result<BlockOutcome, BlockFailure> {
    let range = job.range;
    let data = read_range(&source, range.start, range.end).await?;
    let bytes = data.len() as u64;
    if bytes != range.len() {
        return Err(TransferError::SourceChanged {
            from: range.start,
            expected: range.len(),
            actual: bytes,
        }
        .into());
    }

    let encoded = tokio::task::spawn_blocking(move || encoder.encode(range, data))
        .await
        .map_err(|e| PoolError::Panicked(e.to_string()))??;
    trace!(
        block = job.block_index,
        bytes,
        encrypted = encoded.artifact.is_some(),
        "block encoded"
    );

    store.put_block(job.block_id, encoded.data).await?;

    Ok(BlockOutcome {
        index: job.block_index,
        artifact: encoded.artifact,
        bytes,
    })
}
