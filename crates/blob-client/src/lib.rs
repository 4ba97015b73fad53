//! HTTP client for the block blob protocol.
//!
//! Four stateless operations against a pre-signed object URL: put an
//! uncommitted block, commit an ordered block list, ranged get, and a
//! properties request. No call is retried here.

mod client;
mod error;
mod store;

pub use client::BlobClient;
pub use error::BlobError;
pub use store::{BlobTarget, BlockStore};

#[cfg(test)]
mod test_server;
