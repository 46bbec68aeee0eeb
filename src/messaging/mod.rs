//! Outbound customer messages.
//!
//! Jobs that decide a customer should be contacted push an
//! [`OutboundMessage`] into the [`MessageOutbox`]; the message worker job
//! drains the queue and hands each message to a [`MessageSender`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Birthday,
    Inactivity,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Birthday => write!(f, "birthday"),
            MessageKind::Inactivity => write!(f, "inactivity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub customer_id: String,
    pub recipient: String,
    pub kind: MessageKind,
    pub queued_at: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn new(customer_id: impl Into<String>, recipient: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            customer_id: customer_id.into(),
            recipient: recipient.into(),
            kind,
            queued_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Message queue is closed")]
    QueueClosed,

    #[error("Message queue is full")]
    QueueFull,
}

/// Producer side of the bounded outbound message queue.
#[derive(Debug, Clone)]
pub struct MessageOutbox {
    tx: mpsc::Sender<OutboundMessage>,
}

impl MessageOutbox {
    /// Create an outbox and the receiver the message worker consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue from a blocking context, waiting for room if the queue is full.
    ///
    /// Must not be called from inside an async task.
    pub fn enqueue_blocking(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        self.tx
            .blocking_send(message)
            .map_err(|_| MessagingError::QueueClosed)
    }

    pub async fn enqueue(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| MessagingError::QueueClosed)
    }

    pub fn try_enqueue(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MessagingError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => MessagingError::QueueClosed,
        })
    }

    /// Messages currently waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Delivery channel for outbound messages (email, SMS, ...).
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Sender that only logs, for local runs without a delivery provider.
#[derive(Debug, Default)]
pub struct LogMessageSender;

#[async_trait]
impl MessageSender for LogMessageSender {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        info!(
            "Delivering {} message to {} (customer {})",
            message.kind, message.recipient, message.customer_id
        );
        Ok(())
    }
}
