//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the binary.

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::models::StoredBlob;

/// An opened blob, ready for sequential reading.
pub struct BlobReader {
    /// Exact length of the blob at open time.
    pub size_bytes: u64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader")
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Session-scoped storage contract for file payloads.
///
/// Blobs are only ever removed all at once through `clear`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `data` under a fresh collision-resistant name derived from
    /// `original_name`. The name is only returned once the file is complete.
    async fn put(&self, original_name: &str, data: Bytes) -> Result<StoredBlob>;

    /// Maps a storage name back to its path, or `NotFound`.
    async fn resolve(&self, storage_name: &str) -> Result<PathBuf>;

    async fn exists(&self, storage_name: &str) -> bool;

    /// Opens the blob for streaming, or `NotFound`.
    async fn open(&self, storage_name: &str) -> Result<BlobReader>;

    /// Removes every blob and the scratch root. Idempotent.
    async fn clear(&self) -> Result<()>;
}
