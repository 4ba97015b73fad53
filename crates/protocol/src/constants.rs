use std::time::Duration;

/// Storage service version sent with every request.
pub const API_VERSION: &str = "2021-08-06";

/// Largest block the service accepts in a single put-block call (4000 MiB).
pub const MAX_BLOCK_SIZE: u64 = 4000 * 1024 * 1024;

/// Maximum number of blocks a committed object may reference.
pub const MAX_BLOCK_COUNT: u64 = 50_000;

/// Default block size: 4 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// How long the service keeps uncommitted blocks before discarding them.
///
/// Informational only. Blocks orphaned by a failed upload are left for the
/// service to expire.
pub const UNCOMMITTED_BLOCK_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Content type used when the caller does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// Header names.
pub const HEADER_VERSION: &str = "x-ms-version";
pub const HEADER_DATE: &str = "x-ms-date";
pub const HEADER_BLOB_TYPE: &str = "x-ms-blob-type";
pub const HEADER_BLOB_CONTENT_TYPE: &str = "x-ms-blob-content-type";
pub const HEADER_RANGE: &str = "x-ms-range";
pub const HEADER_CONTENT_MD5: &str = "Content-MD5";
pub const HEADER_COMMITTED_BLOCK_COUNT: &str = "x-ms-blob-committed-block-count";

/// Value of `x-ms-blob-type` for block blobs.
pub const BLOB_TYPE_BLOCK: &str = "BlockBlob";

/// Content type of the commit request body.
pub const BLOCK_LIST_CONTENT_TYPE: &str = "text/xml";

// Query parameters.
pub const COMP_BLOCK: &str = "block";
pub const COMP_BLOCK_LIST: &str = "blocklist";
