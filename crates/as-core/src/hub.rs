//! # Broadcast Hub
//!
//! Real-time fan-out of ledger appends to live subscribers.
//!
//! Each subscriber owns a bounded queue drained by its own session task, so
//! `publish` never waits on a client. A subscriber whose queue is closed or
//! full is dropped from the registry; the client reconnects and receives a
//! fresh snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ledger::MessageLedger;
use crate::models::Message;

/// Identifies one registration with the hub.
pub type SubscriberId = u64;

/// The receiving end of one live-update registration.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Message>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next appended message, or `None` once the hub has dropped this
    /// subscriber (disconnect, lag, or teardown).
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.try_recv().ok()
    }
}

pub struct BroadcastHub {
    ledger: Arc<MessageLedger>,
    subscribers: DashMap<SubscriberId, mpsc::Sender<Arc<Message>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BroadcastHub {
    /// `buffer` is the number of undelivered messages a subscriber may lag
    /// behind before it is disconnected.
    pub fn new(ledger: Arc<MessageLedger>, buffer: usize) -> Self {
        Self {
            ledger,
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Registers a subscriber and captures the ledger as its first view.
    ///
    /// Both happen under the ledger lock, and the engine publishes under that
    /// same lock, so every message is either in the snapshot or delivered
    /// afterwards, never both.
    pub fn subscribe(&self) -> (Subscription, Vec<Message>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.ledger.view(|messages| {
            self.subscribers.insert(id, tx);
            messages.to_vec()
        });

        tracing::debug!(subscriber = id, snapshot_len = snapshot.len(), "subscriber registered");
        (Subscription { id, receiver: rx }, snapshot)
    }

    /// Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = id, "subscriber removed");
        }
    }

    /// Enqueues `message` for every current subscriber without waiting.
    pub fn publish(&self, message: &Message) {
        let targets: Vec<(SubscriberId, mpsc::Sender<Arc<Message>>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        if targets.is_empty() {
            return;
        }

        let shared = Arc::new(message.clone());
        let mut dead = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(shared.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "subscriber lagging, disconnecting");
                    dead.push(id);
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        for id in dead {
            self.unsubscribe(id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drops every registration; their sessions observe end-of-stream.
    pub fn disconnect_all(&self) {
        let count = self.subscribers.len();
        self.subscribers.clear();
        if count > 0 {
            tracing::info!(count, "all subscribers disconnected");
        }
    }
}
