/// Shared types for the conversation list view
use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque avatar payload as delivered by the source (base64-encoded image bytes).
///
/// The synchronizer never looks inside; presentation code calls [`Avatar::decode`]
/// when it actually needs pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Avatar(pub String);

impl Avatar {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the raw image bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.0.trim())?)
    }
}

/// Most recent state of one conversation, keyed by the other participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The other party's user id (never the current user)
    pub peer_id: String,
    pub peer_display_name: String,
    pub peer_avatar: Avatar,
    /// Preview text of the last message
    pub last_message_text: String,
    pub last_message_timestamp: DateTime<Utc>,
}

/// Notifications delivered to the presentation layer (see `BroadcastSink`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Fresh newest-first list of conversations
    ConversationsUpdated { conversations: Vec<ConversationSummary> },
    /// The list should scroll back to its first row
    ScrollToTop,
    /// The first successful projection happened; loading indicator can go
    FirstLoadComplete,
}
