//! Changeset history and the undo/redo state machine

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::changeset::{Changeset, FlagScope};
use crate::config::TrackingConfig;
use crate::error::{Result, TrackingError};
use crate::events::{HistoryEnd, HistoryEvent, HistoryListener, SubscriptionId};

/// Coarse state of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No changeset is open
    Idle,
    /// A changeset is open and accumulating records
    Recording,
    /// A changeset is being undone or redone; capture is suppressed
    Replaying,
}

/// Row of a history list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the history
    pub index: usize,
    /// Changeset id
    pub id: Uuid,
    /// Changeset description
    pub description: String,
    /// When the changeset was started
    pub created_at: DateTime<Utc>,
    /// Number of records in the changeset
    pub changes: usize,
    /// Whether the changeset is currently applied (before the cursor)
    pub is_applied: bool,
}

/// Owns the changeset history of one open document
///
/// The history is a list of committed changesets and a cursor counting how
/// many of them are applied to the live model. At most one changeset is open
/// at a time. The manager is meant to be shared as `Rc<ChangesetManager>`
/// between the document's objects; it is neither `Send` nor `Sync`, so all
/// history mutation stays on the thread that owns the document.
pub struct ChangesetManager {
    config: TrackingConfig,
    changesets: RefCell<Vec<Rc<Changeset>>>,
    cursor: Cell<usize>,
    open: RefCell<Option<Rc<Changeset>>>,
    tracking_enabled: Cell<bool>,
    replaying: Cell<bool>,
    suppress_position_events: Cell<bool>,
    listeners: RefCell<Vec<(SubscriptionId, Rc<dyn HistoryListener>)>>,
    next_subscription: Cell<u64>,
}

impl ChangesetManager {
    /// Create a manager with the default configuration
    pub fn new() -> Self {
        Self::build(TrackingConfig::default())
    }

    /// Create a manager with a validated configuration
    pub fn with_config(config: TrackingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: TrackingConfig) -> Self {
        ChangesetManager {
            tracking_enabled: Cell::new(config.tracking_enabled),
            config,
            changesets: RefCell::new(Vec::new()),
            cursor: Cell::new(0),
            open: RefCell::new(None),
            replaying: Cell::new(false),
            suppress_position_events: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
        }
    }

    /// The active configuration
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    // ---- tracking flag -------------------------------------------------

    /// Whether new changesets can be started
    pub fn is_tracking_enabled(&self) -> bool {
        self.tracking_enabled.get()
    }

    /// Enable or disable capture globally
    pub fn set_tracking_enabled(&self, enabled: bool) {
        debug!(enabled, "Tracking flag changed");
        self.tracking_enabled.set(enabled);
    }

    /// Disable capture until the returned guard is dropped
    ///
    /// Used while a freshly created or loaded document is initialized, so
    /// the initialization does not become undoable.
    pub fn suspend_tracking(&self) -> TrackingSuspension<'_> {
        let previous = self.tracking_enabled.replace(false);
        TrackingSuspension {
            manager: self,
            previous,
        }
    }

    // ---- queries -------------------------------------------------------

    /// Number of applied changesets
    pub fn cursor(&self) -> usize {
        self.cursor.get()
    }

    /// Number of committed changesets
    pub fn len(&self) -> usize {
        self.changesets.borrow().len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.changesets.borrow().is_empty()
    }

    /// Whether there is a changeset to undo
    pub fn can_undo(&self) -> bool {
        self.cursor() > 0
    }

    /// Whether there is a changeset to redo
    pub fn can_redo(&self) -> bool {
        self.cursor() < self.len()
    }

    /// Current state
    pub fn state(&self) -> ManagerState {
        if self.is_replaying() {
            ManagerState::Replaying
        } else if self.open.borrow().is_some() {
            ManagerState::Recording
        } else {
            ManagerState::Idle
        }
    }

    /// Whether a changeset is open
    pub fn is_recording(&self) -> bool {
        self.open.borrow().is_some()
    }

    /// Whether an undo or redo is running
    pub fn is_replaying(&self) -> bool {
        self.replaying.get()
            || self
                .open
                .borrow()
                .as_ref()
                .is_some_and(|changeset| changeset.is_replaying())
    }

    /// Whether a mutation reported right now would be recorded
    pub fn is_capturing(&self) -> bool {
        self.tracking_enabled.get() && self.open.borrow().is_some() && !self.is_replaying()
    }

    /// The open changeset, if any
    pub fn open_changeset(&self) -> Option<Rc<Changeset>> {
        self.open.borrow().clone()
    }

    /// Committed changeset at `index`
    pub fn changeset(&self, index: usize) -> Option<Rc<Changeset>> {
        self.changesets.borrow().get(index).cloned()
    }

    /// All committed changesets, oldest first
    pub fn changesets(&self) -> Vec<Rc<Changeset>> {
        self.changesets.borrow().clone()
    }

    /// Descriptions of all committed changesets, oldest first
    pub fn descriptions(&self) -> Vec<String> {
        self.changesets
            .borrow()
            .iter()
            .map(|changeset| changeset.description().to_string())
            .collect()
    }

    /// Description of the changeset `undo` would revert
    pub fn undo_description(&self) -> Option<String> {
        let cursor = self.cursor();
        if cursor == 0 {
            return None;
        }
        self.changeset(cursor - 1)
            .map(|changeset| changeset.description().to_string())
    }

    /// Description of the changeset `redo` would apply
    pub fn redo_description(&self) -> Option<String> {
        self.changeset(self.cursor())
            .map(|changeset| changeset.description().to_string())
    }

    /// History rows for a history list view
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        let cursor = self.cursor();
        self.changesets
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, changeset)| HistoryEntry {
                index,
                id: changeset.id(),
                description: changeset.description().to_string(),
                created_at: changeset.created_at(),
                changes: changeset.len(),
                is_applied: index < cursor,
            })
            .collect()
    }

    // ---- listeners -----------------------------------------------------

    /// Register a listener for history notifications
    pub fn subscribe(&self, listener: Rc<dyn HistoryListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener; false when the id is unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn emit(&self, event: HistoryEvent) {
        trace!(?event, "History event");
        let listeners: Vec<Rc<dyn HistoryListener>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.on_history_event(self, &event);
        }
    }

    fn set_cursor(&self, cursor: usize) {
        if self.cursor.replace(cursor) == cursor {
            return;
        }
        if !self.suppress_position_events.get() {
            self.emit(HistoryEvent::PositionChanged);
        }
    }

    // ---- transactions --------------------------------------------------

    /// Open a new changeset
    ///
    /// Returns `Ok(None)` when tracking is disabled. Starting a changeset
    /// while another one is open is a logic error.
    pub fn start_changeset(&self, description: impl Into<String>) -> Result<Option<Rc<Changeset>>> {
        let description = description.into();
        if !self.tracking_enabled.get() {
            trace!(description = %description, "Tracking disabled, changeset not started");
            return Ok(None);
        }
        let mut open = self.open.borrow_mut();
        if let Some(current) = open.as_ref() {
            error!(
                open = %current.description(),
                requested = %description,
                "Changeset started while another is open"
            );
            return Err(TrackingError::ChangesetAlreadyOpen(
                current.description().to_string(),
            ));
        }
        debug!(description = %description, "Starting changeset");
        let changeset = Rc::new(Changeset::new(description));
        *open = Some(changeset.clone());
        Ok(Some(changeset))
    }

    /// Commit the open changeset to history
    ///
    /// Any redo branch is discarded first and reported as a removed range.
    /// With `discard_if_empty`, a changeset without records is dropped
    /// silently.
    pub fn commit(&self, discard_if_empty: bool) -> Result<()> {
        let Some(changeset) = self.open.borrow_mut().take() else {
            trace!("Commit without open changeset");
            return Ok(());
        };
        if discard_if_empty && changeset.is_empty() {
            debug!(description = %changeset.description(), "Discarding empty changeset");
            return Ok(());
        }
        changeset.seal();

        let cursor = self.cursor();
        let discarded = {
            let mut changesets = self.changesets.borrow_mut();
            let len = changesets.len();
            changesets.truncate(cursor);
            len - cursor
        };
        if discarded > 0 {
            debug!(start = cursor, count = discarded, "Discarding redo branch");
            self.emit(HistoryEvent::RangeRemoved {
                start: cursor,
                count: discarded,
                end: HistoryEnd::Newest,
            });
        }

        debug!(
            description = %changeset.description(),
            changes = changeset.len(),
            "Committing changeset"
        );
        let len = {
            let mut changesets = self.changesets.borrow_mut();
            changesets.push(changeset);
            changesets.len()
        };
        self.set_cursor(len);
        self.enforce_cap()
    }

    /// Revert and drop the open changeset without touching history
    pub fn rollback(&self) -> Result<()> {
        let Some(changeset) = self.open.borrow_mut().take() else {
            trace!("Rollback without open changeset");
            return Ok(());
        };
        debug!(description = %changeset.description(), "Rolling back changeset");
        let _replay = FlagScope::enter(&self.replaying);
        changeset.undo()
    }

    /// Run `f` inside a changeset
    ///
    /// Commits when `f` succeeds and rolls back when it fails. When tracking
    /// is disabled `f` simply runs.
    pub fn run_transaction<T, E, F>(
        &self,
        description: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<TrackingError>,
    {
        let started = self.start_changeset(description)?.is_some();
        match f() {
            Ok(value) => {
                if started {
                    self.commit(self.config.discard_empty_transactions)?;
                }
                Ok(value)
            }
            Err(err) => {
                if started {
                    self.rollback()?;
                }
                Err(err)
            }
        }
    }

    // ---- navigation ----------------------------------------------------

    /// Revert the changeset before the cursor
    pub fn undo(&self) -> Result<()> {
        let cursor = self.cursor();
        if cursor == 0 {
            trace!("Nothing to undo");
            return Ok(());
        }
        let Some(changeset) = self.changeset(cursor - 1) else {
            return Ok(());
        };
        {
            let _replay = FlagScope::enter(&self.replaying);
            changeset.undo()?;
        }
        self.set_cursor(cursor - 1);
        Ok(())
    }

    /// Re-apply the changeset at the cursor
    pub fn redo(&self) -> Result<()> {
        let cursor = self.cursor();
        let Some(changeset) = self.changeset(cursor) else {
            trace!("Nothing to redo");
            return Ok(());
        };
        {
            let _replay = FlagScope::enter(&self.replaying);
            changeset.redo()?;
        }
        self.set_cursor(cursor + 1);
        Ok(())
    }

    /// Undo or redo until the cursor equals `target` (clamped to the history)
    pub fn restore_to(&self, target: usize) -> Result<()> {
        let target = target.min(self.len());
        debug!(from = self.cursor(), to = target, "Restoring history position");
        while self.cursor() < target {
            self.redo()?;
        }
        while self.cursor() > target {
            self.undo()?;
        }
        Ok(())
    }

    // ---- pruning -------------------------------------------------------

    /// Discard the oldest `index` changesets, keeping the live state
    ///
    /// Changesets below `index` that are not applied yet are redone first, so
    /// the remaining history stays valid. Listeners always receive a position
    /// notification because every index shifted. If a redo fails nothing is
    /// removed, and listeners are told about the cursor it already moved.
    pub fn remove_to(&self, index: usize) -> Result<()> {
        let index = index.min(self.len());
        let original = self.cursor();
        let replayed = {
            let _quiet = FlagScope::enter(&self.suppress_position_events);
            let mut replayed = Ok(());
            while replayed.is_ok() && self.cursor() < index {
                replayed = self.redo();
            }
            if replayed.is_ok() {
                self.changesets.borrow_mut().drain(..index);
                self.set_cursor(self.cursor() - index);
            }
            replayed
        };
        if let Err(err) = replayed {
            self.abort_prune(original, &err);
            return Err(err);
        }
        debug!(count = index, cursor = self.cursor(), "Removed oldest changesets");
        if index > 0 {
            self.emit(HistoryEvent::RangeRemoved {
                start: 0,
                count: index,
                end: HistoryEnd::Oldest,
            });
        }
        self.emit(HistoryEvent::PositionChanged);
        Ok(())
    }

    /// Discard changesets from `index` onward, rewinding the live state first
    ///
    /// If an undo fails nothing is removed, and listeners are told about the
    /// cursor it already moved.
    pub fn remove_from(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            trace!(index, len, "Nothing to remove");
            return Ok(());
        }
        let original = self.cursor();
        let rewound = {
            let _quiet = FlagScope::enter(&self.suppress_position_events);
            let mut rewound = Ok(());
            while rewound.is_ok() && self.cursor() > index {
                rewound = self.undo();
            }
            if rewound.is_ok() {
                self.changesets.borrow_mut().truncate(index);
            }
            rewound
        };
        if let Err(err) = rewound {
            self.abort_prune(original, &err);
            return Err(err);
        }
        debug!(start = index, count = len - index, "Removed newest changesets");
        self.emit(HistoryEvent::RangeRemoved {
            start: index,
            count: len - index,
            end: HistoryEnd::Newest,
        });
        if self.cursor() != original {
            self.emit(HistoryEvent::PositionChanged);
        }
        Ok(())
    }

    fn abort_prune(&self, original: usize, err: &TrackingError) {
        error!(cursor = self.cursor(), error = %err, "Replay failed while pruning history");
        if self.cursor() != original {
            self.emit(HistoryEvent::PositionChanged);
        }
    }

    /// Forget the whole history without touching the model or notifying anyone
    ///
    /// Listeners holding history positions must be reset by the caller; an
    /// attached [`DirtyTracker`](crate::DirtyTracker) via
    /// [`DirtyTracker::history_cleared`](crate::DirtyTracker::history_cleared).
    pub fn remove_all(&self) {
        debug!(count = self.len(), "Removing all changesets");
        self.changesets.borrow_mut().clear();
        self.open.borrow_mut().take();
        self.cursor.set(0);
    }

    fn enforce_cap(&self) -> Result<()> {
        let Some(max) = self.config.max_changesets else {
            return Ok(());
        };
        let len = self.len();
        if len > max {
            debug!(len, max, "History cap exceeded");
            self.remove_to(len - max)?;
        }
        Ok(())
    }
}

impl Default for ChangesetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangesetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangesetManager")
            .field("cursor", &self.cursor())
            .field("len", &self.len())
            .field("state", &self.state())
            .field("tracking_enabled", &self.is_tracking_enabled())
            .finish()
    }
}

/// Keeps tracking disabled while alive
#[must_use = "tracking is re-enabled as soon as the guard is dropped"]
pub struct TrackingSuspension<'a> {
    manager: &'a ChangesetManager,
    previous: bool,
}

impl Drop for TrackingSuspension<'_> {
    fn drop(&mut self) {
        self.manager.tracking_enabled.set(self.previous);
    }
}
