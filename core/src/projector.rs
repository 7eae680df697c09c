/// View projection: table -> newest-first list -> presentation sink
use crate::table::ConversationTable;
use crate::view_types::{ConversationSummary, ViewEvent};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Receiver of projected views. Only ever sees successful projections.
pub trait PresentationSink: Send {
    fn on_conversations_updated(&mut self, conversations: &[ConversationSummary]);
    fn on_scroll_to_top(&mut self);
    fn on_first_load_complete(&mut self);
}

/// Sort a table's entries newest first.
///
/// `sort_by` is stable, so equal timestamps keep the table's iteration order.
/// `ViewProjector::publish` writes each projection back into the table, which
/// makes that order the previous projection.
pub fn project(table: &ConversationTable) -> Vec<ConversationSummary> {
    let mut ordered = table.snapshot().to_vec();
    ordered.sort_by(|a, b| b.last_message_timestamp.cmp(&a.last_message_timestamp));
    ordered
}

/// Pushes projections into a sink and remembers whether the first load happened
pub struct ViewProjector<S: PresentationSink> {
    sink: S,
    first_load_done: bool,
}

impl<S: PresentationSink> ViewProjector<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            first_load_done: false,
        }
    }

    /// Reorder the table newest first and deliver the result
    pub fn publish(&mut self, table: &mut ConversationTable) -> Vec<ConversationSummary> {
        table.sort_by_recency();
        let ordered = table.snapshot().to_vec();
        self.sink.on_conversations_updated(&ordered);
        self.sink.on_scroll_to_top();
        if !self.first_load_done {
            self.first_load_done = true;
            info!("First conversation list loaded ({} entries)", ordered.len());
            self.sink.on_first_load_complete();
        }
        ordered
    }

    pub fn first_load_done(&self) -> bool {
        self.first_load_done
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Sink that fans view events out over a broadcast channel
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ViewEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: ViewEvent) {
        // No receivers is fine: nobody is looking at the list right now
        if self.tx.receiver_count() > 0 && self.tx.send(event).is_err() {
            warn!("View event dropped: all receivers closed");
        }
    }
}

impl PresentationSink for BroadcastSink {
    fn on_conversations_updated(&mut self, conversations: &[ConversationSummary]) {
        self.send(ViewEvent::ConversationsUpdated {
            conversations: conversations.to_vec(),
        });
    }

    fn on_scroll_to_top(&mut self) {
        self.send(ViewEvent::ScrollToTop);
    }

    fn on_first_load_complete(&mut self) {
        self.send(ViewEvent::FirstLoadComplete);
    }
}

/// Sink that keeps every event it receives; clones share the same log
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// The most recently delivered list, if any
    pub fn last_view(&self) -> Option<Vec<ConversationSummary>> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::ConversationsUpdated { conversations } => Some(conversations),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&ViewEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: ViewEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl PresentationSink for RecordingSink {
    fn on_conversations_updated(&mut self, conversations: &[ConversationSummary]) {
        self.push(ViewEvent::ConversationsUpdated {
            conversations: conversations.to_vec(),
        });
    }

    fn on_scroll_to_top(&mut self) {
        self.push(ViewEvent::ScrollToTop);
    }

    fn on_first_load_complete(&mut self) {
        self.push(ViewEvent::FirstLoadComplete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{CanonicalEvent, EventKind};
    use crate::view_types::Avatar;
    use chrono::{TimeZone, Utc};

    fn add(table: &mut ConversationTable, peer: &str, secs: i64) {
        table.apply(&CanonicalEvent {
            kind: EventKind::Add,
            peer_id: peer.to_string(),
            peer_display_name: peer.to_string(),
            peer_avatar: Avatar::default(),
            message_text: format!("msg from {}", peer),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        });
    }

    fn ids(view: &[ConversationSummary]) -> Vec<&str> {
        view.iter().map(|s| s.peer_id.as_str()).collect()
    }

    #[test]
    fn test_project_newest_first() {
        let mut table = ConversationTable::new();
        add(&mut table, "A", 10);
        add(&mut table, "B", 30);
        add(&mut table, "C", 20);

        assert_eq!(ids(&project(&table)), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_project_ties_keep_first_seen_order() {
        let mut table = ConversationTable::new();
        add(&mut table, "A", 10);
        add(&mut table, "B", 20);
        add(&mut table, "C", 10);
        add(&mut table, "D", 10);

        let first = project(&table);
        assert_eq!(ids(&first), vec!["B", "A", "C", "D"]);
        // Re-projection without changes must not reshuffle ties
        assert_eq!(project(&table), first);
    }

    #[test]
    fn test_publish_keeps_previous_order_for_new_ties() {
        let sink = RecordingSink::new();
        let mut projector = ViewProjector::new(sink.clone());
        let mut table = ConversationTable::new();

        add(&mut table, "B", 5);
        add(&mut table, "A", 10);
        assert_eq!(ids(&projector.publish(&mut table)), vec!["A", "B"]);

        // B catches up to A's timestamp: the tie keeps A on top
        table.apply(&CanonicalEvent {
            kind: EventKind::Modify,
            peer_id: "B".to_string(),
            peer_display_name: "B".to_string(),
            peer_avatar: Avatar::default(),
            message_text: "caught up".to_string(),
            timestamp: Utc.timestamp_opt(10, 0).unwrap(),
        });
        assert_eq!(ids(&projector.publish(&mut table)), vec!["A", "B"]);
        assert_eq!(ids(&project(&table)), vec!["A", "B"]);
        assert_eq!(ids(&sink.last_view().unwrap()), vec!["A", "B"]);
    }

    #[test]
    fn test_first_load_fires_once() {
        let sink = RecordingSink::new();
        let mut projector = ViewProjector::new(sink.clone());
        let mut table = ConversationTable::new();

        projector.publish(&mut table);
        add(&mut table, "A", 10);
        projector.publish(&mut table);

        assert!(projector.first_load_done());
        assert_eq!(sink.count(|e| *e == ViewEvent::FirstLoadComplete), 1);
        assert_eq!(sink.count(|e| *e == ViewEvent::ScrollToTop), 2);
        assert_eq!(ids(&sink.last_view().unwrap()), vec!["A"]);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_in_order() {
        let mut sink = BroadcastSink::new(16);
        let mut rx = sink.subscribe();

        sink.on_conversations_updated(&[]);
        sink.on_scroll_to_top();

        assert_eq!(
            rx.recv().await.unwrap(),
            ViewEvent::ConversationsUpdated { conversations: vec![] }
        );
        assert_eq!(rx.recv().await.unwrap(), ViewEvent::ScrollToTop);
    }
}
