use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use crate::TransferError;

/// Reads arbitrary byte ranges from a file without loading the whole file.
pub struct ChunkReader {
    file: tokio::fs::File,
    path: PathBuf,
    size: u64,
}

impl ChunkReader {
    /// Opens `path` for ranged reads.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| TransferError::from_io(e, path))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| TransferError::from_io(e, path))?
            .len();
        debug!(path = %path.display(), size, "opened source for ranged reads");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    /// Reads `[from, to)`.
    ///
    /// A range running past end-of-file is a short read, not an error: the
    /// result holds `min(to, size) - from` bytes (empty when `from` is at or
    /// past the end).
    pub async fn read_range(&mut self, from: u64, to: u64) -> Result<Vec<u8>, TransferError> {
        if from >= to {
            return Err(TransferError::InvalidRange { from, to });
        }

        let want = to.min(self.size).saturating_sub(from);
        if want < to - from {
            trace!(from, to, size = self.size, available = want, "short read at end of source");
        }
        if want == 0 {
            return Ok(Vec::new());
        }

        self.file
            .seek(SeekFrom::Start(from))
            .await
            .map_err(|e| TransferError::from_io(e, &self.path))?;

        let mut buf = Vec::with_capacity(want as usize);
        (&mut self.file)
            .take(want)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| TransferError::from_io(e, &self.path))?;
        trace!(from, to, bytes = buf.len(), "range read");
        Ok(buf)
    }

    /// File size observed when the reader was opened.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One-shot ranged read: opens `path`, reads `[from, to)`, closes it.
pub async fn read_range(path: &Path, from: u64, to: u64) -> Result<Vec<u8>, TransferError> {
    let mut reader = ChunkReader::open(path).await?;
    reader.read_range(from, to).await
}
