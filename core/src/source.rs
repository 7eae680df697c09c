/// Event source plumbing: two subscriptions, one serialized consumer
use crate::change::ChangeRecord;
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// The two filtered queries opened against the conversation store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    /// Threads where the current user is the sender
    AsSender,
    /// Threads where the current user is the receiver
    AsReceiver,
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscription::AsSender => write!(f, "as-sender"),
            Subscription::AsReceiver => write!(f, "as-receiver"),
        }
    }
}

/// Failure reported by the source in place of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<SourceError> for SyncError {
    fn from(e: SourceError) -> Self {
        SyncError::Source(e.message)
    }
}

pub type SourceBatch = std::result::Result<Vec<ChangeRecord>, SourceError>;

/// One notification from one subscription
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subscription: Subscription,
    pub batch: SourceBatch,
}

/// Provides the signed-in user's id
pub trait CredentialStore {
    fn current_user_id(&self) -> String;
}

/// Credential store holding a fixed id
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    user_id: String,
}

impl StaticCredentials {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl CredentialStore for StaticCredentials {
    fn current_user_id(&self) -> String {
        self.user_id.clone()
    }
}

/// Producer handle bound to one subscription
#[derive(Debug, Clone)]
pub struct BatchSender {
    subscription: Subscription,
    tx: mpsc::Sender<Delivery>,
}

impl BatchSender {
    pub fn subscription(&self) -> Subscription {
        self.subscription
    }

    /// Deliver a batch of change records
    pub async fn send_batch(&self, records: Vec<ChangeRecord>) -> Result<()> {
        self.deliver(Ok(records)).await
    }

    /// Report a source failure for this notification
    pub async fn send_error(&self, error: SourceError) -> Result<()> {
        self.deliver(Err(error)).await
    }

    pub async fn deliver(&self, batch: SourceBatch) -> Result<()> {
        self.tx
            .send(Delivery {
                subscription: self.subscription,
                batch,
            })
            .await
            .map_err(|_| SyncError::Closed)
    }
}

/// Both producer handles plus the single consuming end
pub struct EventSource {
    pub as_sender: BatchSender,
    pub as_receiver: BatchSender,
    pub receiver: mpsc::Receiver<Delivery>,
}

impl EventSource {
    /// Open the two subscriptions over one bounded queue
    pub fn open(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SyncError::Config(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        let (tx, receiver) = mpsc::channel(capacity);
        Ok(Self {
            as_sender: BatchSender {
                subscription: Subscription::AsSender,
                tx: tx.clone(),
            },
            as_receiver: BatchSender {
                subscription: Subscription::AsReceiver,
                tx,
            },
            receiver,
        })
    }

    pub fn sender(&self, subscription: Subscription) -> BatchSender {
        match subscription {
            Subscription::AsSender => self.as_sender.clone(),
            Subscription::AsReceiver => self.as_receiver.clone(),
        }
    }
}
