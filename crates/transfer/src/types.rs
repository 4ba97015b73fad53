use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use blockload_protocol::{BlockId, EncryptionArtifact};

use crate::{BlockPlan, TransferError};

/// State of one block upload, from planning to commit.
///
/// Owned by a single orchestrator run and mutated only from its completion
/// loop, so it carries no lock. Artifacts are stored by block index, never
/// in completion order.
#[derive(Debug)]
pub struct UploadSession {
    id: String,
    target_url: String,
    plan: BlockPlan,
    concurrency: usize,
    completed: BTreeSet<usize>,
    artifacts: Vec<Option<EncryptionArtifact>>,
    uploaded_bytes: u64,
    started_at: Instant,
}

impl UploadSession {
    /// Creates a session with no completed blocks.
    pub fn new(id: String, target_url: String, plan: BlockPlan, concurrency: usize) -> Self {
        Self {
            id,
            target_url,
            plan,
            concurrency,
            completed: BTreeSet::new(),
            artifacts: vec![None; plan.block_count()],
            uploaded_bytes: 0,
            started_at: Instant::now(),
        }
    }

    /// Records a successfully uploaded block.
    ///
    /// Returns `false` if the block had already been recorded; the first
    /// record wins.
    pub fn record_block(
        &mut self,
        index: usize,
        artifact: Option<EncryptionArtifact>,
        bytes: u64,
    ) -> Result<bool, TransferError> {
        if index >= self.plan.block_count() {
            return Err(TransferError::UnknownBlock {
                index,
                block_count: self.plan.block_count(),
            });
        }
        if !self.completed.insert(index) {
            return Ok(false);
        }
        self.artifacts[index] = artifact;
        self.uploaded_bytes += bytes;
        Ok(true)
    }

    /// Fraction of blocks uploaded, in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        let total = self.plan.block_count();
        if total == 0 {
            return 1.0;
        }
        self.completed.len() as f64 / total as f64
    }

    /// True once every planned block has been recorded.
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.plan.block_count()
    }

    /// Block ids in ascending index order.
    pub fn ordered_block_ids(&self) -> Result<Vec<BlockId>, TransferError> {
        self.plan.block_ids()
    }

    /// Ids to commit, in ascending index order.
    ///
    /// Fails unless every planned block has been recorded.
    pub fn commit_list(&self) -> Result<Vec<BlockId>, TransferError> {
        if !self.is_complete() {
            return Err(TransferError::Incomplete {
                completed: self.completed.len(),
                block_count: self.plan.block_count(),
            });
        }
        self.ordered_block_ids()
    }

    /// Ordered artifacts, if the upload was encrypted.
    ///
    /// `Ok(None)` when no block carries an artifact; an error when some do
    /// and others don't.
    pub fn artifacts(&self) -> Result<Option<Vec<EncryptionArtifact>>, TransferError> {
        if self.artifacts.iter().all(Option::is_none) {
            return Ok(None);
        }
        self.artifacts
            .iter()
            .enumerate()
            .map(|(i, a)| a.clone().ok_or(TransferError::MissingArtifact(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn plan(&self) -> &BlockPlan {
        &self.plan
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of blocks recorded so far.
    pub fn completed_blocks(&self) -> usize {
        self.completed.len()
    }

    pub fn is_block_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.plan.total_size().saturating_sub(self.uploaded_bytes)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
