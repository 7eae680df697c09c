/// ConvSync - Incremental conversation-list synchronizer
///
/// Consumes add/modify change batches from two independent subscriptions
/// ("current user is sender", "current user is receiver") and maintains one
/// newest-first summary per peer, delivered to a presentation sink.

pub mod error;
pub mod config;
pub mod change;
pub mod table;
pub mod projector;
pub mod source;
pub mod sync;
pub mod replay;
pub mod view_types;
pub mod cli_app;

pub use error::{SyncError, Result};
pub use config::Config;
pub use change::{ingest, CanonicalEvent, ChangeKind, ChangeRecord, EventKind};
pub use table::{ConversationTable, TableChange};
pub use projector::{project, BroadcastSink, PresentationSink, RecordingSink, ViewProjector};
pub use source::{
    BatchSender, CredentialStore, Delivery, EventSource, SourceBatch, SourceError,
    StaticCredentials, Subscription,
};
pub use sync::{spawn_sync, BatchOutcome, ConversationSync, SyncHandle, SyncStats};
pub use view_types::{Avatar, ConversationSummary, ViewEvent};
