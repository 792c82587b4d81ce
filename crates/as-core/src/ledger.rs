//! # Message Ledger
//!
//! The authoritative, append-only history of the session.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use uuid::Uuid;

use crate::models::{Message, MessageContent};

#[derive(Default)]
struct LedgerState {
    messages: Vec<Message>,
    last_stamp: Option<DateTime<Utc>>,
}

/// Insertion-ordered message history guarded by a single lock.
#[derive(Default)]
pub struct MessageLedger {
    state: Mutex<LedgerState>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // Nothing inside the critical section can leave the Vec half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append_text(&self, body: impl Into<String>, sender_address: impl Into<String>) -> Message {
        self.append_with(
            MessageContent::Text { body: body.into() },
            sender_address,
            |_| {},
        )
    }

    /// The blob behind `storage_name` must already be fully written.
    pub fn append_file(
        &self,
        display_name: impl Into<String>,
        storage_name: impl Into<String>,
        size_bytes: u64,
        sender_address: impl Into<String>,
    ) -> Message {
        self.append_with(
            MessageContent::File {
                display_name: display_name.into(),
                storage_name: storage_name.into(),
                size_bytes,
            },
            sender_address,
            |_| {},
        )
    }

    /// Appends a message and runs `on_commit` before the lock is released.
    ///
    /// Anything done in `on_commit` is ordered exactly like the ledger itself,
    /// which is what the broadcast hub relies on. It must not block or touch
    /// the ledger again.
    pub fn append_with<F>(
        &self,
        content: MessageContent,
        sender_address: impl Into<String>,
        on_commit: F,
    ) -> Message
    where
        F: FnOnce(&Message),
    {
        let mut state = self.lock();

        let now = truncate_to_millis(Utc::now());
        let created_at = match state.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_stamp = Some(created_at);

        let message = Message {
            id: Uuid::now_v7(),
            content,
            created_at,
            sender_address: sender_address.into(),
        };
        state.messages.push(message.clone());
        on_commit(&message);

        tracing::debug!(message_id = %message.id, kind = ?message.kind(), "ledger append");
        message
    }

    /// A point-in-time copy, in append order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Runs `f` against the current contents while appends are held off.
    pub fn view<R>(&self, f: impl FnOnce(&[Message]) -> R) -> R {
        let state = self.lock();
        f(&state.messages)
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the history. Blobs are the Blob Store's business.
    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.messages.len();
        state.messages.clear();
        tracing::info!(dropped, "ledger cleared");
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(ts)
}
