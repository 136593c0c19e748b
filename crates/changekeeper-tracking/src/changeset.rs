//! Changesets: named, atomic groups of change records

use std::cell::{Cell, RefCell};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::change::{ChangeRecord, RecordSummary};
use crate::error::{Result, TrackingError};

/// Sets a boolean flag for the lifetime of the scope and restores the
/// previous value on drop, including when the scope exits through `?`.
pub(crate) struct FlagScope<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> FlagScope<'a> {
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        FlagScope { flag, previous }
    }
}

impl Drop for FlagScope<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// One atomic, named group of reversible mutations
///
/// Records are appended only while the changeset is open. Once the manager
/// commits it the changeset is sealed and only ever replayed as a whole.
pub struct Changeset {
    id: Uuid,
    description: String,
    created_at: DateTime<Utc>,
    records: RefCell<Vec<ChangeRecord>>,
    sealed: Cell<bool>,
    replaying: Cell<bool>,
    depth: Cell<usize>,
}

impl Changeset {
    /// Create an empty, open changeset
    pub fn new(description: impl Into<String>) -> Self {
        Changeset {
            id: Uuid::new_v4(),
            description: description.into(),
            created_at: Utc::now(),
            records: RefCell::new(Vec::new()),
            sealed: Cell::new(false),
            replaying: Cell::new(false),
            depth: Cell::new(0),
        }
    }

    /// Unique identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// When the changeset was started
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether the changeset holds no records
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Whether the changeset has been committed
    pub fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    /// Whether the changeset is currently undoing or redoing itself
    pub fn is_replaying(&self) -> bool {
        self.replaying.get()
    }

    /// Current nesting depth of open capture regions
    pub fn region_depth(&self) -> usize {
        self.depth.get()
    }

    /// Summaries of the records, in application order
    pub fn records(&self) -> Vec<RecordSummary> {
        self.records.borrow().iter().map(ChangeRecord::summary).collect()
    }

    /// Append a record
    ///
    /// Records produced while the changeset replays itself are dropped; a
    /// sealed changeset rejects new records.
    pub fn append(&self, record: impl Into<ChangeRecord>) -> Result<()> {
        if self.sealed.get() {
            error!(description = %self.description, "Append to a committed changeset");
            return Err(TrackingError::ChangesetSealed(self.description.clone()));
        }
        if self.replaying.get() {
            trace!(description = %self.description, "Ignoring record produced during replay");
            return Ok(());
        }
        let record = record.into();
        trace!(description = %self.description, record = %record.summary(), "Recorded change");
        self.records.borrow_mut().push(record);
        Ok(())
    }

    /// Undo every record, last to first
    pub fn undo(&self) -> Result<()> {
        let _replay = FlagScope::enter(&self.replaying);
        let records = self.records.borrow();
        debug!(description = %self.description, records = records.len(), "Undoing changeset");
        for record in records.iter().rev() {
            record.undo()?;
        }
        Ok(())
    }

    /// Redo every record, first to last
    pub fn redo(&self) -> Result<()> {
        let _replay = FlagScope::enter(&self.replaying);
        let records = self.records.borrow();
        debug!(description = %self.description, records = records.len(), "Redoing changeset");
        for record in records.iter() {
            record.redo()?;
        }
        Ok(())
    }

    pub(crate) fn seal(&self) {
        self.sealed.set(true);
    }

    /// Enter a capture region; true when this is the outermost one
    pub(crate) fn enter_region(&self) -> bool {
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        depth == 0
    }

    pub(crate) fn exit_region(&self) {
        let depth = self.depth.get();
        if depth > 0 {
            self.depth.set(depth - 1);
        }
    }
}

impl fmt::Debug for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Changeset")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("records", &self.len())
            .field("sealed", &self.sealed.get())
            .finish()
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} changes)",
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.description,
            self.len()
        )
    }
}
