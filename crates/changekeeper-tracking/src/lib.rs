#![warn(missing_docs)]

//! Change tracking and undo/redo history for in-memory document models
//!
//! Mutations of tracked objects are captured into changesets, committed to a
//! linear history and replayed backward and forward as whole units. A dirty
//! tracker follows the history cursor to report unsaved changes.

pub mod change;
pub mod changeset;
pub mod collection;
pub mod config;
pub mod dirty;
pub mod error;
pub mod events;
pub mod manager;
pub mod region;
pub mod value;

// Re-export public API
pub use change::{
    ChangeRecord, CollectionAction, CollectionChange, CollectionRecord, PropertyChange,
    RecordSummary, Tracked, TrackedCollection,
};
pub use changeset::Changeset;
pub use collection::ObservableList;
pub use config::TrackingConfig;
pub use dirty::{DirtyTracker, SavedIndex};
pub use error::{Result, TrackingError};
pub use events::{HistoryEnd, HistoryEvent, HistoryListener, SubscriptionId};
pub use manager::{ChangesetManager, HistoryEntry, ManagerState, TrackingSuspension};
pub use region::PropertyRegion;
pub use value::{ObjectRef, PropertyKey, Value};
