//! # Transfer Streamer
//!
//! Serves a blob's bytes in bounded chunks without loading the whole file.

use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{AppError, Result};
use crate::models::TransferMetadata;
use crate::traits::BlobStore;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

pub struct TransferStreamer {
    store: Arc<dyn BlobStore>,
    chunk_size: usize,
}

impl TransferStreamer {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_chunk_size(store, DEFAULT_CHUNK_SIZE)
    }

    /// `chunk_size` is clamped to `MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE`.
    pub fn with_chunk_size(store: Arc<dyn BlobStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn open(&self, storage_name: &str) -> Result<StreamHandle> {
        let blob = self.store.open(storage_name).await?;
        Ok(StreamHandle {
            metadata: TransferMetadata {
                storage_name: storage_name.to_string(),
                size_bytes: blob.size_bytes,
            },
            reader: blob.reader,
            chunk_size: self.chunk_size,
        })
    }
}

/// One open download. Consumed by `produce`; re-reading needs a new `open`.
pub struct StreamHandle {
    metadata: TransferMetadata,
    reader: Pin<Box<dyn AsyncRead + Send>>,
    chunk_size: usize,
}

struct ReadState {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    remaining: u64,
    chunk_size: usize,
    name: String,
    done: bool,
}

impl StreamHandle {
    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// Sequential chunks of at most `chunk_size` bytes whose concatenation is
    /// exactly the announced length. A short read, an overlong file or an I/O
    /// error ends the stream with a single `Transfer` error.
    pub fn produce(self) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        let state = ReadState {
            reader: self.reader,
            remaining: self.metadata.size_bytes,
            chunk_size: self.chunk_size,
            name: self.metadata.storage_name,
            done: false,
        };

        stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            match next_chunk(&mut st).await {
                Ok(Some(chunk)) => Some((Ok(chunk), st)),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(storage_name = %st.name, error = %err, "transfer aborted");
                    st.done = true;
                    Some((Err(err), st))
                }
            }
        })
    }
}

async fn next_chunk(st: &mut ReadState) -> Result<Option<Bytes>> {
    if st.remaining == 0 {
        // Anything left in the file means it grew after open.
        let mut one = [0u8; 1];
        let extra = st
            .reader
            .read(&mut one)
            .await
            .map_err(|e| AppError::Transfer(e.to_string()))?;
        if extra > 0 {
            return Err(AppError::Transfer(format!(
                "{} changed size during transfer",
                st.name
            )));
        }
        return Ok(None);
    }

    let want = st.remaining.min(st.chunk_size as u64) as usize;
    let mut buf = BytesMut::zeroed(want);
    let mut filled = 0;
    while filled < want {
        let n = st
            .reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| AppError::Transfer(e.to_string()))?;
        if n == 0 {
            return Err(AppError::Transfer(format!(
                "{} ended {} bytes early",
                st.name,
                st.remaining - filled as u64
            )));
        }
        filled += n;
    }

    st.remaining -= want as u64;
    Ok(Some(buf.freeze()))
}
