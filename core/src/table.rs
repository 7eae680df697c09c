/// Conversation table: one summary per peer, in last projected order
use crate::change::{CanonicalEvent, EventKind};
use crate::view_types::ConversationSummary;
use std::collections::HashMap;
use tracing::debug;

/// What applying one event did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableChange {
    /// A new peer entry was created
    Inserted,
    /// Message text and timestamp of an existing entry were replaced
    Updated,
    /// The event was older than what the table already holds
    Stale,
}

/// Authoritative in-memory state.
///
/// Entries live in a `Vec` with a `peer_id -> index` map on the side. New
/// peers are appended; [`ConversationTable::sort_by_recency`] reorders the
/// `Vec` in place, so iteration order is always the previous projection
/// followed by peers seen since.
#[derive(Debug, Default)]
pub struct ConversationTable {
    entries: Vec<ConversationSummary>,
    index: HashMap<String, usize>,
}

impl ConversationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new summary, or treat a repeated ADD as an update
    pub fn upsert_on_add(&mut self, event: &CanonicalEvent) -> TableChange {
        self.upsert(event)
    }

    /// Update text and timestamp; a MODIFY for an unseen peer creates it
    pub fn apply_modify(&mut self, event: &CanonicalEvent) -> TableChange {
        if !self.index.contains_key(&event.peer_id) {
            debug!("MODIFY for unseen peer {}, inserting", event.peer_id);
        }
        self.upsert(event)
    }

    /// Dispatch on the event kind
    pub fn apply(&mut self, event: &CanonicalEvent) -> TableChange {
        match event.kind {
            EventKind::Add => self.upsert_on_add(event),
            EventKind::Modify => self.apply_modify(event),
        }
    }

    fn upsert(&mut self, event: &CanonicalEvent) -> TableChange {
        match self.index.get(&event.peer_id) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                // Identity fields are fixed at creation. Older events lose so that
                // replays and MODIFY-before-ADD arrivals converge on the newest message.
                if event.timestamp < entry.last_message_timestamp {
                    return TableChange::Stale;
                }
                entry.last_message_text = event.message_text.clone();
                entry.last_message_timestamp = event.timestamp;
                TableChange::Updated
            }
            None => {
                self.index.insert(event.peer_id.clone(), self.entries.len());
                self.entries.push(ConversationSummary {
                    peer_id: event.peer_id.clone(),
                    peer_display_name: event.peer_display_name.clone(),
                    peer_avatar: event.peer_avatar.clone(),
                    last_message_text: event.message_text.clone(),
                    last_message_timestamp: event.timestamp,
                });
                TableChange::Inserted
            }
        }
    }

    /// Stable newest-first reorder of the entries; equal timestamps keep
    /// their current relative order
    pub fn sort_by_recency(&mut self) {
        self.entries
            .sort_by(|a, b| b.last_message_timestamp.cmp(&a.last_message_timestamp));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, s)| (s.peer_id.clone(), i))
            .collect();
    }

    /// All summaries in iteration order (not re-sorted since the last update)
    pub fn snapshot(&self) -> &[ConversationSummary] {
        &self.entries
    }

    pub fn get(&self, peer_id: &str) -> Option<&ConversationSummary> {
        self.index.get(peer_id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_types::Avatar;
    use chrono::{TimeZone, Utc};

    fn event(kind: EventKind, peer: &str, text: &str, secs: i64) -> CanonicalEvent {
        CanonicalEvent {
            kind,
            peer_id: peer.to_string(),
            peer_display_name: format!("name-{}", peer),
            peer_avatar: Avatar::new("aGk="),
            message_text: text.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_uniqueness_per_peer() {
        let mut table = ConversationTable::new();
        let events = [
            event(EventKind::Add, "U2", "a", 1),
            event(EventKind::Modify, "U3", "b", 2),
            event(EventKind::Add, "U2", "c", 3),
            event(EventKind::Add, "U3", "d", 4),
            event(EventKind::Modify, "U2", "e", 5),
        ];
        for e in &events {
            table.apply(e);
        }

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("U2").unwrap().last_message_text, "e");
        assert_eq!(table.get("U3").unwrap().last_message_text, "d");
    }

    #[test]
    fn test_add_replay_is_idempotent() {
        let add = event(EventKind::Add, "U2", "hi", 10);

        let mut once = ConversationTable::new();
        once.apply(&add);

        let mut twice = ConversationTable::new();
        assert_eq!(twice.apply(&add), TableChange::Inserted);
        assert_eq!(twice.apply(&add), TableChange::Updated);

        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_modify_before_add_converges() {
        let add = event(EventKind::Add, "U2", "hi", 10);
        let modify = event(EventKind::Modify, "U2", "hi again", 30);

        let mut in_order = ConversationTable::new();
        in_order.apply(&add);
        in_order.apply(&modify);

        let mut reordered = ConversationTable::new();
        assert_eq!(reordered.apply(&modify), TableChange::Inserted);
        assert_eq!(reordered.apply(&add), TableChange::Stale);

        assert_eq!(in_order.get("U2"), reordered.get("U2"));
        assert_eq!(in_order.get("U2").unwrap().last_message_text, "hi again");
    }

    #[test]
    fn test_identity_fields_never_change() {
        let mut table = ConversationTable::new();
        table.apply(&event(EventKind::Add, "U2", "hi", 10));

        let mut renamed = event(EventKind::Modify, "U2", "later", 20);
        renamed.peer_display_name = "someone else".to_string();
        renamed.peer_avatar = Avatar::new("b3RoZXI=");
        table.apply(&renamed);

        let entry = table.get("U2").unwrap();
        assert_eq!(entry.peer_display_name, "name-U2");
        assert_eq!(entry.peer_avatar, Avatar::new("aGk="));
        assert_eq!(entry.last_message_text, "later");
    }

    #[test]
    fn test_snapshot_keeps_first_seen_order() {
        let mut table = ConversationTable::new();
        table.apply(&event(EventKind::Add, "U2", "a", 1));
        table.apply(&event(EventKind::Add, "U3", "b", 2));
        table.apply(&event(EventKind::Modify, "U2", "c", 9));

        let ids: Vec<_> = table.snapshot().iter().map(|s| s.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["U2", "U3"]);
    }

    #[test]
    fn test_sort_by_recency_keeps_prior_order_on_ties() {
        let mut table = ConversationTable::new();
        table.apply(&event(EventKind::Add, "B", "x", 5));
        table.apply(&event(EventKind::Add, "A", "y", 10));
        table.sort_by_recency();

        table.apply(&event(EventKind::Modify, "B", "z", 10));
        table.sort_by_recency();

        let ids: Vec<_> = table.snapshot().iter().map(|s| s.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        // Index follows the moved entries
        assert_eq!(table.get("B").unwrap().last_message_text, "z");
        assert_eq!(table.get("A").unwrap().last_message_text, "y");
    }
}
