/// Change ingestion: raw change records -> canonical peer-relative events
use crate::error::{Result, SyncError};
use crate::view_types::Avatar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of mutation reported by the event source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One raw change record, exactly as a subscription reports it.
///
/// Fields are optional so that a record with a missing field can still be
/// decoded and then rejected individually instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(default)]
    pub change_kind: ChangeKind,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_image: Option<Avatar>,
    pub receiver_name: Option<String>,
    pub receiver_image: Option<Avatar>,
    pub last_message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Canonical event kinds that mutate the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Modify,
}

/// A change rewritten from the current user's point of view
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub peer_id: String,
    pub peer_display_name: String,
    pub peer_avatar: Avatar,
    pub message_text: String,
    pub timestamp: DateTime<Utc>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or(SyncError::MalformedEvent { field })
}

/// Normalize a raw record.
///
/// Returns `Ok(None)` for change kinds this core does not act on. `REMOVED`
/// lands here too: removals are a known gap and never shrink the table.
pub fn ingest(record: ChangeRecord, current_user_id: &str) -> Result<Option<CanonicalEvent>> {
    let kind = match record.change_kind {
        ChangeKind::Added => EventKind::Add,
        ChangeKind::Modified => EventKind::Modify,
        ChangeKind::Removed => {
            debug!("Ignoring REMOVED change (removal is not handled)");
            return Ok(None);
        }
        ChangeKind::Unknown => return Ok(None),
    };

    let sender_id = required(record.sender_id, "senderId")?;
    let receiver_id = required(record.receiver_id, "receiverId")?;
    let message_text = required(record.last_message, "lastMessage")?;
    let timestamp = required(record.timestamp, "timestamp")?;

    let (peer_id, peer_display_name, peer_avatar) = if sender_id == current_user_id {
        if receiver_id == current_user_id {
            return Err(SyncError::MalformedEvent { field: "receiverId" });
        }
        (
            receiver_id,
            required(record.receiver_name, "receiverName")?,
            required(record.receiver_image, "receiverImage")?,
        )
    } else {
        if receiver_id != current_user_id {
            debug!(
                "Change between {} and {} does not involve the current user",
                sender_id, receiver_id
            );
        }
        (
            sender_id,
            required(record.sender_name, "senderName")?,
            required(record.sender_image, "senderImage")?,
        )
    };

    Ok(Some(CanonicalEvent {
        kind,
        peer_id,
        peer_display_name,
        peer_avatar,
        message_text,
        timestamp,
    }))
}
