//! # Sync Engine
//!
//! The only place where the ledger and the blob store meet. Validates writes,
//! persists blobs before they are referenced, and publishes every append to the
//! broadcast hub in ledger order.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::hub::BroadcastHub;
use crate::ledger::MessageLedger;
use crate::models::{Message, MessageContent};
use crate::traits::BlobStore;

/// The ledger and the blob store are only reachable through the engine's
/// operations, so every append is published and every blob stays referenced
/// until teardown.
///
/// ```compile_fail
/// fn bypass(engine: &as_core::SyncEngine) {
///     let _ = engine.blobs();
/// }
/// ```
///
/// ```compile_fail
/// fn bypass(engine: &as_core::SyncEngine) {
///     let _ = engine.ledger();
/// }
/// ```
pub struct SyncEngine {
    ledger: Arc<MessageLedger>,
    blobs: Arc<dyn BlobStore>,
    hub: Arc<BroadcastHub>,
    /// `true` while writes are accepted. Submissions hold the read side for
    /// their whole write path; teardown takes the write side.
    open: RwLock<bool>,
}

impl SyncEngine {
    pub fn new(ledger: Arc<MessageLedger>, blobs: Arc<dyn BlobStore>, hub: Arc<BroadcastHub>) -> Self {
        Self {
            ledger,
            blobs,
            hub,
            open: RwLock::new(true),
        }
    }

    pub async fn submit_text(&self, body: String, sender_address: String) -> Result<Message> {
        if body.is_empty() {
            return Err(AppError::validation("text body must not be empty"));
        }

        let open = self.open.read().await;
        if !*open {
            return Err(AppError::ShuttingDown);
        }

        let message = self.commit(MessageContent::Text { body }, sender_address);
        tracing::info!(message_id = %message.id, "text message added");
        Ok(message)
    }

    /// Stores the payload, then appends. A failed write appends nothing.
    pub async fn submit_file(
        &self,
        display_name: String,
        payload: Bytes,
        sender_address: String,
    ) -> Result<Message> {
        if display_name.is_empty() {
            return Err(AppError::validation("filename must not be empty"));
        }
        if payload.is_empty() {
            return Err(AppError::validation("file payload must not be empty"));
        }

        let open = self.open.read().await;
        if !*open {
            return Err(AppError::ShuttingDown);
        }

        let stored = self.blobs.put(&display_name, payload).await?;
        let message = self.commit(
            MessageContent::File {
                display_name,
                storage_name: stored.storage_name,
                size_bytes: stored.size_bytes,
            },
            sender_address,
        );

        tracing::info!(
            message_id = %message.id,
            storage_name = message.storage_name().unwrap_or_default(),
            size_bytes = stored.size_bytes,
            "file message added"
        );
        Ok(message)
    }

    fn commit(&self, content: MessageContent, sender_address: String) -> Message {
        let hub = &self.hub;
        self.ledger
            .append_with(content, sender_address, |message| hub.publish(message))
    }

    pub fn list_all(&self) -> Vec<Message> {
        self.ledger.snapshot()
    }

    pub fn message_count(&self) -> usize {
        self.ledger.len()
    }

    pub async fn is_open(&self) -> bool {
        *self.open.read().await
    }

    /// Waits for in-flight writes, closes the engine for good, then empties
    /// the blob store and the ledger and drops every subscriber.
    ///
    /// Safe to call any number of times from any shutdown path. Storage
    /// errors are logged, never returned.
    pub async fn teardown(&self) {
        let mut open = self.open.write().await;
        let first = std::mem::replace(&mut *open, false);

        if let Err(err) = self.blobs.clear().await {
            tracing::warn!(error = %err, "blob store cleanup failed");
        }
        self.ledger.clear();
        self.hub.disconnect_all();

        if first {
            tracing::info!("teardown complete");
        }
    }
}
