/// Serialized update path: ingest -> mutate -> project, one batch at a time
use crate::change::ingest;
use crate::error::Result;
use crate::projector::{project, PresentationSink, ViewProjector};
use crate::source::{CredentialStore, Delivery};
use crate::table::{ConversationTable, TableChange};
use crate::view_types::ConversationSummary;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of processing one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied {
        /// Events that inserted or updated an entry
        applied: usize,
        /// Events older than the entry they targeted
        stale: usize,
        /// Records with a change kind this core does not act on
        ignored: usize,
        /// Records dropped for missing fields
        malformed: usize,
    },
    /// The source reported an error; nothing was touched
    Discarded,
}

/// Running counters for one synchronizer session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub batches_applied: u64,
    pub batches_discarded: u64,
    pub events_applied: u64,
    pub events_stale: u64,
    pub records_ignored: u64,
    pub records_malformed: u64,
}

/// Owns the conversation table for the lifetime of one pair of subscriptions
pub struct ConversationSync<S: PresentationSink> {
    session_id: Uuid,
    current_user_id: String,
    table: ConversationTable,
    projector: ViewProjector<S>,
    stats: SyncStats,
}

impl<S: PresentationSink> ConversationSync<S> {
    pub fn new(credentials: &impl CredentialStore, sink: S) -> Self {
        let session_id = Uuid::new_v4();
        let current_user_id = credentials.current_user_id();
        info!("Conversation sync {} started for user {}", session_id, current_user_id);
        Self {
            session_id,
            current_user_id,
            table: ConversationTable::new(),
            projector: ViewProjector::new(sink),
            stats: SyncStats::default(),
        }
    }

    /// Process one delivery to completion.
    ///
    /// Every record is ingested before the table is touched, and table updates
    /// cannot fail, so a batch is either applied whole or (on a source error)
    /// not at all.
    pub fn apply_delivery(&mut self, delivery: Delivery) -> BatchOutcome {
        let subscription = delivery.subscription;
        let records = match delivery.batch {
            Ok(records) => records,
            Err(e) => {
                warn!("Discarding {} batch: source error: {}", subscription, e.message);
                self.stats.batches_discarded += 1;
                return BatchOutcome::Discarded;
            }
        };

        let mut staged = Vec::with_capacity(records.len());
        let mut ignored = 0;
        let mut malformed = 0;
        for record in records {
            match ingest(record, &self.current_user_id) {
                Ok(Some(event)) => staged.push(event),
                Ok(None) => ignored += 1,
                Err(e) => {
                    warn!("Dropping {} change record: {}", subscription, e);
                    malformed += 1;
                }
            }
        }

        let mut applied = 0;
        let mut stale = 0;
        for event in &staged {
            match self.table.apply(event) {
                TableChange::Stale => {
                    debug!("Stale {:?} for {} ignored", event.kind, event.peer_id);
                    stale += 1;
                }
                change => {
                    debug!("{:?} {:?} for {}", change, event.kind, event.peer_id);
                    applied += 1;
                }
            }
        }

        self.projector.publish(&mut self.table);

        self.stats.batches_applied += 1;
        self.stats.events_applied += applied as u64;
        self.stats.events_stale += stale as u64;
        self.stats.records_ignored += ignored as u64;
        self.stats.records_malformed += malformed as u64;

        BatchOutcome::Applied {
            applied,
            stale,
            ignored,
            malformed,
        }
    }

    /// Consume deliveries until the queue closes or shutdown is signalled.
    ///
    /// Shutdown is checked before every delivery; anything still queued at
    /// that point is discarded whole.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<Delivery>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Handle dropped without signalling: treat as unsubscribe
                        break;
                    }
                }
                delivery = receiver.recv() => match delivery {
                    Some(delivery) => {
                        self.apply_delivery(delivery);
                    }
                    None => {
                        info!("All subscriptions closed");
                        break;
                    }
                }
            }
        }

        receiver.close();
        let mut dropped = 0;
        while receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            info!("Discarded {} pending batches after unsubscribe", dropped);
        }
        info!("Conversation sync {} stopped: {:?}", self.session_id, self.stats);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn current_user_id(&self) -> &str {
        &self.current_user_id
    }

    pub fn table(&self) -> &ConversationTable {
        &self.table
    }

    /// Current newest-first view, without notifying the sink
    pub fn view(&self) -> Vec<ConversationSummary> {
        project(&self.table)
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn first_load_done(&self) -> bool {
        self.projector.first_load_done()
    }

    pub fn sink(&self) -> &S {
        self.projector.sink()
    }

    pub fn into_sink(self) -> S {
        self.projector.into_sink()
    }
}

/// Handle to a synchronizer running on its own task
pub struct SyncHandle<S: PresentationSink> {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<ConversationSync<S>>,
}

impl<S: PresentationSink + 'static> SyncHandle<S> {
    /// Unsubscribe: no mutation happens after the current batch
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the task to finish and get the final state back
    pub async fn join(self) -> Result<ConversationSync<S>> {
        Ok(self.task.await?)
    }

    pub async fn stop(self) -> Result<ConversationSync<S>> {
        self.shutdown();
        self.join().await
    }
}

/// Run `sync` on a new task, consuming `receiver`
pub fn spawn_sync<S: PresentationSink + 'static>(
    sync: ConversationSync<S>,
    receiver: mpsc::Receiver<Delivery>,
) -> SyncHandle<S> {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let span = info_span!("conversation_sync", session = %sync.session_id());
    let task = tokio::spawn(sync.run(receiver, shutdown_rx).instrument(span));
    SyncHandle { shutdown, task }
}
