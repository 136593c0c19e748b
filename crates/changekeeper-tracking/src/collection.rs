//! Observable list that reports its splices to a changeset manager

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::change::{CollectionAction, TrackedCollection};
use crate::error::{Result, TrackingError};
use crate::manager::ChangesetManager;

/// Ordered list whose mutations are captured into the open changeset
///
/// Each mutation is applied first and reported afterwards, except `clear`,
/// which reports the items it is about to drop before dropping them.
pub struct ObservableList<T> {
    items: RefCell<Vec<T>>,
    manager: Weak<ChangesetManager>,
    this: Weak<ObservableList<T>>,
}

impl<T: Clone + PartialEq + 'static> ObservableList<T> {
    /// Create an empty list reporting to `manager`
    pub fn new(manager: &Rc<ChangesetManager>) -> Rc<Self> {
        Self::with_items(manager, Vec::new())
    }

    /// Create a list with initial items; the initial items are not recorded
    pub fn with_items(manager: &Rc<ChangesetManager>, items: Vec<T>) -> Rc<Self> {
        Self::build(Rc::downgrade(manager), items)
    }

    /// Create a list that reports to nobody
    pub fn detached() -> Rc<Self> {
        Self::build(Weak::new(), Vec::new())
    }

    fn build(manager: Weak<ChangesetManager>, items: Vec<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| ObservableList {
            items: RefCell::new(items),
            manager,
            this: this.clone(),
        })
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Clone of the item at `index`
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    /// Whether an equal item is present
    pub fn contains(&self, item: &T) -> bool {
        self.items.borrow().contains(item)
    }

    /// Position of the first equal item
    pub fn position(&self, item: &T) -> Option<usize> {
        self.items.borrow().iter().position(|i| i == item)
    }

    /// Snapshot of all items
    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    /// Append an item
    pub fn push(&self, item: T) -> Result<()> {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.report(CollectionAction::Add, Vec::new(), None, vec![item], Some(index))
    }

    /// Insert an item at `index`
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            if index > len {
                return Err(TrackingError::InvalidIndex { index, len });
            }
            items.insert(index, item.clone());
        }
        self.report(CollectionAction::Add, Vec::new(), None, vec![item], Some(index))
    }

    /// Remove and return the item at `index`
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let item = {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            if index >= len {
                return Err(TrackingError::InvalidIndex { index, len });
            }
            items.remove(index)
        };
        self.report(
            CollectionAction::Remove,
            vec![item.clone()],
            Some(index),
            Vec::new(),
            None,
        )?;
        Ok(item)
    }

    /// Remove the first equal item, returning whether one was found
    pub fn remove_item(&self, item: &T) -> Result<bool> {
        match self.position(item) {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Remove every item
    pub fn clear(&self) -> Result<()> {
        let snapshot = self.to_vec();
        if snapshot.is_empty() {
            return Ok(());
        }
        if let Some(manager) = self.manager.upgrade() {
            manager.on_collection_clearing(self.handle(), snapshot)?;
        }
        self.items.borrow_mut().clear();
        Ok(())
    }

    fn handle(&self) -> Weak<dyn TrackedCollection<T>> {
        self.this.clone() as Weak<dyn TrackedCollection<T>>
    }

    fn report(
        &self,
        action: CollectionAction,
        old_items: Vec<T>,
        old_index: Option<usize>,
        new_items: Vec<T>,
        new_index: Option<usize>,
    ) -> Result<()> {
        match self.manager.upgrade() {
            Some(manager) => manager.on_collection_changed(
                self.handle(),
                action,
                old_items,
                old_index,
                new_items,
                new_index,
            ),
            None => Ok(()),
        }
    }
}

impl<T: Clone + PartialEq + 'static> TrackedCollection<T> for ObservableList<T> {
    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn insert_at(&self, index: usize, item: T) -> Result<()> {
        self.insert(index, item)
    }

    fn push(&self, item: T) -> Result<()> {
        ObservableList::push(self, item)
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        ObservableList::remove_at(self, index)
    }

    fn remove_item(&self, item: &T) -> Result<bool> {
        ObservableList::remove_item(self, item)
    }

    fn clear(&self) -> Result<()> {
        ObservableList::clear(self)
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}
