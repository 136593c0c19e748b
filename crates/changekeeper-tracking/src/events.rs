//! History notifications

use crate::manager::ChangesetManager;

/// Which end of the history a removed range was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEnd {
    /// The oldest changesets were pruned; live state is unchanged and the
    /// remaining changesets shift down by the removed count.
    Oldest,
    /// The newest changesets were dropped: a redo branch discarded by a
    /// commit, or a tail removed after rewinding past it.
    Newest,
}

/// Notification emitted by [`ChangesetManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEvent {
    /// The cursor moved, or has to be re-read because the history was renumbered
    PositionChanged,
    /// The half-open range `[start, start + count)` was removed from history
    RangeRemoved {
        /// First removed index
        start: usize,
        /// Number of removed changesets
        count: usize,
        /// Which end of the history the range came from
        end: HistoryEnd,
    },
}

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

/// Receives history notifications
///
/// Listeners run after the manager has released its internal borrows, so they
/// may query the manager (cursor, length, descriptions) from inside the call.
pub trait HistoryListener {
    /// Handle one notification
    fn on_history_event(&self, manager: &ChangesetManager, event: &HistoryEvent);
}

impl<F> HistoryListener for F
where
    F: Fn(&ChangesetManager, &HistoryEvent),
{
    fn on_history_event(&self, manager: &ChangesetManager, event: &HistoryEvent) {
        self(manager, event)
    }
}
