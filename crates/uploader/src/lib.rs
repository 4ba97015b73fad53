//! Concurrent block upload orchestrator.
//!
//! [`BlockUploader`] splits a file into fixed-size blocks, uploads them
//! through a bounded [`WorkerPool`](blockload_worker_pool::WorkerPool),
//! optionally encrypting each one, and commits the object with the block
//! ids in index order once every block has landed.

pub mod download;
pub mod error;
pub mod types;
pub mod uploader;

pub use download::{download_object, fetch_block};
pub use error::{BlockFailure, DownloadError, RemoteState, UploadError};
pub use types::{UploadEvent, UploadOptions, UploadResult};
pub use uploader::BlockUploader;

#[cfg(test)]
mod testing;
