use blockload_protocol::constants::{MAX_BLOCK_COUNT, MAX_BLOCK_SIZE};
use blockload_protocol::{BlockId, ByteRange};

use crate::TransferError;

/// One block to upload: where it sits in the source and what it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub block_index: usize,
    pub range: ByteRange,
    pub block_id: BlockId,
    /// Attempts already made for this block. Always 0: nothing retries.
    pub retry_count: u32,
}

/// Split of `total_size` bytes into `block_size` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    total_size: u64,
    block_size: u64,
    block_count: u64,
}

impl BlockPlan {
    /// Validates sizes against the protocol limits and computes the count.
    pub fn new(total_size: u64, block_size: u64) -> Result<Self, TransferError> {
        if block_size == 0 {
            return Err(TransferError::InvalidBlockSize {
                block_size,
                reason: "must be positive".into(),
            });
        }
        if block_size > MAX_BLOCK_SIZE {
            return Err(TransferError::InvalidBlockSize {
                block_size,
                reason: format!("exceeds maximum of {MAX_BLOCK_SIZE} bytes"),
            });
        }

        let block_count = total_size.div_ceil(block_size);
        if block_count > MAX_BLOCK_COUNT {
            return Err(TransferError::TooManyBlocks {
                block_count,
                limit: MAX_BLOCK_COUNT,
            });
        }

        Ok(Self {
            total_size,
            block_size,
            block_count,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count as usize
    }

    /// Range covered by block `index`; the last block may be short.
    pub fn range(&self, index: usize) -> Result<ByteRange, TransferError> {
        let unknown = || TransferError::UnknownBlock {
            index,
            block_count: self.block_count(),
        };
        if index >= self.block_count() {
            return Err(unknown());
        }
        let start = index as u64 * self.block_size;
        let end = (start + self.block_size).min(self.total_size);
        ByteRange::new(start, end).map_err(|_| unknown())
    }

    /// Builds the job for block `index`.
    pub fn job(&self, index: usize) -> Result<UploadJob, TransferError> {
        let range = self.range(index)?;
        let block_id = BlockId::new(index as u32).map_err(|_| TransferError::TooManyBlocks {
            block_count: self.block_count,
            limit: MAX_BLOCK_COUNT,
        })?;
        Ok(UploadJob {
            block_index: index,
            range,
            block_id,
            retry_count: 0,
        })
    }

    /// All jobs in ascending block order.
    pub fn jobs(&self) -> Result<Vec<UploadJob>, TransferError> {
        (0..self.block_count()).map(|i| self.job(i)).collect()
    }

    /// Block ids in ascending index order, as the commit must list them.
    pub fn block_ids(&self) -> Result<Vec<BlockId>, TransferError> {
        Ok(self.jobs()?.into_iter().map(|job| job.block_id).collect())
    }
}
