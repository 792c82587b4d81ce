//! # Domain Models
//!
//! These structs represent the entries of the shared ledger.
//! We use UUID v7 for time-ordered, globally unique identification.
//!
//! Field names on the wire follow the browser client's expectations
//! (`type`, `content`, `filename`, `filesize`, `timestamp`, `sender_ip`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single ledger entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: MessageContent,
    /// Millisecond precision, non-decreasing in ledger order.
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Best-effort origin of the submitting client; may be empty.
    #[serde(rename = "sender_ip")]
    pub sender_address: String,
}

/// What a message carries. Text and file fields never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        #[serde(rename = "content")]
        body: String,
    },
    File {
        /// The filename as supplied by the sender
        #[serde(rename = "content")]
        display_name: String,
        /// Opaque name of the blob in the scratch root
        #[serde(rename = "filename")]
        storage_name: String,
        #[serde(rename = "filesize")]
        size_bytes: u64,
    },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::File { .. } => MessageKind::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }

    /// The storage name of a file message, `None` for text.
    pub fn storage_name(&self) -> Option<&str> {
        match &self.content {
            MessageContent::File { storage_name, .. } => Some(storage_name),
            MessageContent::Text { .. } => None,
        }
    }
}

/// Result of a successful blob write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub storage_name: String,
    pub size_bytes: u64,
}

/// Length information announced before the first byte of a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferMetadata {
    pub storage_name: String,
    pub size_bytes: u64,
}
