//! Shared fixtures for the cross-crate tests.

use std::sync::Arc;

use as_api::{AppState, RouterOptions};
use as_core::{BroadcastHub, MessageLedger, SyncEngine, TransferStreamer};
use as_storage_local::LocalBlobStore;
use axum::Router;
use tempfile::TempDir;

/// A fully wired server over a throwaway scratch root.
pub struct TestApp {
    pub engine: Arc<SyncEngine>,
    pub hub: Arc<BroadcastHub>,
    pub store: Arc<LocalBlobStore>,
    pub streamer: Arc<TransferStreamer>,
    // Held so the directory outlives the test.
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_chunk_size(16 * 1024)
    }

    pub fn with_chunk_size(chunk_size: usize) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(LocalBlobStore::new(dir.path().join("temp_shared")));
        let ledger = Arc::new(MessageLedger::new());
        let hub = Arc::new(BroadcastHub::new(ledger.clone(), 1024));
        let engine = Arc::new(SyncEngine::new(ledger, store.clone(), hub.clone()));
        let streamer = Arc::new(TransferStreamer::with_chunk_size(store.clone(), chunk_size));
        Ok(Self {
            engine,
            hub,
            store,
            streamer,
            dir,
        })
    }

    pub fn state(&self) -> AppState {
        AppState {
            engine: self.engine.clone(),
            hub: self.hub.clone(),
            streamer: self.streamer.clone(),
            scratch_root: self.store.root_path().to_path_buf(),
        }
    }

    pub fn router(&self) -> Router {
        as_api::router(self.state(), RouterOptions::default())
    }

    pub fn router_with(&self, options: RouterOptions) -> Router {
        as_api::router(self.state(), options)
    }
}

/// A deterministic, non-text payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

/// Builds a `multipart/form-data` body with a single `file` part.
/// Returns `(content_type, body)`.
pub fn multipart_file(filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "autosync-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
