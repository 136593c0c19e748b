//! Unsaved-changes tracking on top of the history cursor

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::events::{HistoryEnd, HistoryEvent, HistoryListener, SubscriptionId};
use crate::manager::ChangesetManager;

/// History position at which the document last matched its saved copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SavedIndex {
    /// The saved state is the state with this many changesets applied
    At(usize),
    /// The saved state is no longer reachable through the history
    Unknown,
}

impl SavedIndex {
    /// Whether the live state at `cursor` differs from the saved state
    pub fn is_dirty_at(self, cursor: usize) -> bool {
        match self {
            SavedIndex::At(saved) => saved != cursor,
            SavedIndex::Unknown => true,
        }
    }

    /// Renumber after `[start, start + count)` was removed from `end` of the history
    pub fn rebase(self, start: usize, count: usize, end: HistoryEnd) -> SavedIndex {
        let SavedIndex::At(saved) = self else {
            return SavedIndex::Unknown;
        };
        if count == 0 {
            return self;
        }
        match end {
            // Live state is kept; position n survives as n - count when n >= count
            HistoryEnd::Oldest if saved >= start + count => SavedIndex::At(saved - count),
            HistoryEnd::Oldest => SavedIndex::Unknown,
            // States up to `start` are still reachable, everything after is gone
            HistoryEnd::Newest if saved <= start => self,
            HistoryEnd::Newest => SavedIndex::Unknown,
        }
    }
}

impl fmt::Display for SavedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavedIndex::At(index) => write!(f, "{}", index),
            SavedIndex::Unknown => f.write_str("unknown"),
        }
    }
}

type DirtyCallback = Rc<dyn Fn(bool)>;

/// Derives the "unsaved changes" flag of a document from its history
///
/// The tracker remembers the cursor value at which the document was last
/// saved and compares it with the live cursor on every history event. Pruned
/// ranges renumber or invalidate the remembered position.
pub struct DirtyTracker {
    manager: Weak<ChangesetManager>,
    subscription: Cell<Option<SubscriptionId>>,
    saved: Cell<SavedIndex>,
    dirty: Cell<bool>,
    callbacks: RefCell<Vec<(SubscriptionId, DirtyCallback)>>,
    next_callback: Cell<u64>,
}

impl DirtyTracker {
    /// Create a tracker for `manager` and subscribe it to history events
    ///
    /// The document is considered saved with no changesets applied.
    pub fn attach(manager: &Rc<ChangesetManager>) -> Rc<Self> {
        let saved = SavedIndex::At(0);
        let tracker = Rc::new(DirtyTracker {
            manager: Rc::downgrade(manager),
            subscription: Cell::new(None),
            saved: Cell::new(saved),
            dirty: Cell::new(saved.is_dirty_at(manager.cursor())),
            callbacks: RefCell::new(Vec::new()),
            next_callback: Cell::new(0),
        });
        let id = manager.subscribe(tracker.clone());
        tracker.subscription.set(Some(id));
        tracker
    }

    /// Stop following the manager; the flag keeps its last value
    pub fn detach(&self) {
        if let (Some(manager), Some(id)) = (self.manager.upgrade(), self.subscription.take()) {
            manager.unsubscribe(id);
        }
    }

    /// Whether the document has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// The remembered saved position
    pub fn saved_index(&self) -> SavedIndex {
        self.saved.get()
    }

    /// Set the flag; `false` records the current cursor as the saved position
    pub fn set_dirty(&self, dirty: bool) {
        if !dirty {
            if let Some(manager) = self.manager.upgrade() {
                self.saved.set(SavedIndex::At(manager.cursor()));
            }
        }
        debug!(dirty, saved = %self.saved.get(), "Dirty flag set");
        self.update(dirty);
    }

    /// Report a successful save
    pub fn mark_clean(&self) {
        self.set_dirty(false);
    }

    /// Re-anchor the saved position after the history was cleared
    ///
    /// A clean document stays clean with the saved position at the new cursor.
    /// A dirty one can no longer reach its saved state, so it stays dirty until
    /// the next save.
    pub fn history_cleared(&self) {
        let saved = match self.manager.upgrade() {
            Some(manager) if !self.dirty.get() => SavedIndex::At(manager.cursor()),
            _ => SavedIndex::Unknown,
        };
        debug!(from = %self.saved.get(), to = %saved, "Saved position reset");
        self.saved.set(saved);
        self.update(saved == SavedIndex::Unknown);
    }

    /// Register a callback fired whenever the flag flips
    pub fn on_dirty_changed(&self, callback: impl Fn(bool) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_callback.get());
        self.next_callback.set(id.0 + 1);
        self.callbacks.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Remove a callback; false when the id is unknown
    pub fn remove_dirty_callback(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.borrow_mut();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    fn recompute(&self, cursor: usize) {
        self.update(self.saved.get().is_dirty_at(cursor));
    }

    fn update(&self, dirty: bool) {
        if self.dirty.replace(dirty) == dirty {
            return;
        }
        trace!(dirty, "Dirty flag changed");
        let callbacks: Vec<DirtyCallback> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(dirty);
        }
    }
}

impl HistoryListener for DirtyTracker {
    fn on_history_event(&self, manager: &ChangesetManager, event: &HistoryEvent) {
        match *event {
            HistoryEvent::PositionChanged => {}
            HistoryEvent::RangeRemoved { start, count, end } => {
                let rebased = self.saved.get().rebase(start, count, end);
                trace!(from = %self.saved.get(), to = %rebased, "Rebasing saved position");
                self.saved.set(rebased);
            }
        }
        self.recompute(manager.cursor());
    }
}

impl fmt::Debug for DirtyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyTracker")
            .field("saved", &self.saved.get())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}
