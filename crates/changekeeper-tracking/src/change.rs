//! Reversible change records
//!
//! A [`ChangeRecord`] is the smallest unit of history: either a single
//! property assignment or a splice of a collection. Records hold only weak
//! references into the live object graph; the graph owns its objects, the
//! history does not keep them alive.

use std::fmt;
use std::rc::Weak;

use tracing::trace;

use crate::error::{Result, TrackingError};
use crate::value::{PropertyKey, Value};

/// An object whose properties can be recorded and replayed
///
/// Implementors resolve a [`PropertyKey`] to the current value and write a
/// value back. Writes issued during undo/redo usually go through the same
/// public setters the application uses; capture is suppressed while replaying,
/// so those setters do not record anything.
pub trait Tracked {
    /// Type name used in logs and errors
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Read the current value of a property
    fn read_property(&self, property: PropertyKey) -> Result<Value>;

    /// Write a value to a property
    fn write_property(&self, property: PropertyKey, value: Value) -> Result<()>;
}

/// A single property assignment
pub struct PropertyChange {
    owner: Weak<dyn Tracked>,
    owner_type: &'static str,
    property: PropertyKey,
    old_value: Value,
    new_value: Value,
}

impl PropertyChange {
    /// Create a property change record
    pub fn new(
        owner: Weak<dyn Tracked>,
        owner_type: &'static str,
        property: PropertyKey,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        PropertyChange {
            owner,
            owner_type,
            property,
            old_value,
            new_value,
        }
    }

    /// The changed property
    pub fn property(&self) -> PropertyKey {
        self.property
    }

    /// Type name of the owner
    pub fn owner_type(&self) -> &'static str {
        self.owner_type
    }

    /// Value before the change
    pub fn old_value(&self) -> &Value {
        &self.old_value
    }

    /// Value after the change
    pub fn new_value(&self) -> &Value {
        &self.new_value
    }

    /// Write the old value back
    pub fn undo(&self) -> Result<()> {
        self.write(&self.old_value)
    }

    /// Write the new value again
    pub fn redo(&self) -> Result<()> {
        self.write(&self.new_value)
    }

    fn write(&self, value: &Value) -> Result<()> {
        let owner = self.owner.upgrade().ok_or_else(|| {
            TrackingError::target_dropped(format!("{}.{}", self.owner_type, self.property))
        })?;
        trace!(
            owner = self.owner_type,
            property = %self.property,
            value = %value,
            "Replaying property change"
        );
        owner.write_property(self.property, value.clone())
    }
}

impl fmt::Debug for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyChange")
            .field("owner", &self.owner_type)
            .field("property", &self.property)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .finish()
    }
}

/// Kind of collection splice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionAction {
    /// Items were inserted
    Add,
    /// Items were removed
    Remove,
    /// The collection was cleared
    Reset,
}

impl fmt::Display for CollectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionAction::Add => write!(f, "Add"),
            CollectionAction::Remove => write!(f, "Remove"),
            CollectionAction::Reset => write!(f, "Reset"),
        }
    }
}

/// A collection that collection records can replay against
pub trait TrackedCollection<T> {
    /// Number of items
    fn len(&self) -> usize;

    /// Whether the collection is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether items can be placed at a given position
    ///
    /// Unordered collections return `false`; replay then appends and removes
    /// by value instead of by position.
    fn supports_positional_insert(&self) -> bool {
        true
    }

    /// Insert an item at a position
    fn insert_at(&self, index: usize, item: T) -> Result<()>;

    /// Append an item
    fn push(&self, item: T) -> Result<()>;

    /// Remove the item at a position
    fn remove_at(&self, index: usize) -> Result<T>;

    /// Remove the first item equal to `item`, returning whether one was found
    fn remove_item(&self, item: &T) -> Result<bool>;

    /// Remove every item
    fn clear(&self) -> Result<()>;
}

/// A splice of a collection
pub struct CollectionChange<T> {
    collection: Weak<dyn TrackedCollection<T>>,
    action: CollectionAction,
    old_items: Vec<T>,
    old_index: Option<usize>,
    new_items: Vec<T>,
    new_index: Option<usize>,
}

impl<T: Clone + PartialEq + 'static> CollectionChange<T> {
    /// Create a collection change record
    ///
    /// `old_items`/`old_index` describe what was removed and where it started,
    /// `new_items`/`new_index` what was added and where it starts now.
    pub fn new(
        collection: Weak<dyn TrackedCollection<T>>,
        action: CollectionAction,
        old_items: Vec<T>,
        old_index: Option<usize>,
        new_items: Vec<T>,
        new_index: Option<usize>,
    ) -> Self {
        CollectionChange {
            collection,
            action,
            old_items,
            old_index,
            new_items,
            new_index,
        }
    }

    /// Items removed by the change
    pub fn old_items(&self) -> &[T] {
        &self.old_items
    }

    /// Items added by the change
    pub fn new_items(&self) -> &[T] {
        &self.new_items
    }

    fn target(&self) -> Result<std::rc::Rc<dyn TrackedCollection<T>>> {
        self.collection.upgrade().ok_or_else(|| {
            TrackingError::target_dropped(format!("collection ({} change)", self.action))
        })
    }

    fn insert_items(
        collection: &dyn TrackedCollection<T>,
        items: &[T],
        start: Option<usize>,
    ) -> Result<()> {
        match start {
            Some(start) if collection.supports_positional_insert() => {
                for (offset, item) in items.iter().enumerate() {
                    collection.insert_at(start + offset, item.clone())?;
                }
            }
            _ => {
                for item in items {
                    collection.push(item.clone())?;
                }
            }
        }
        Ok(())
    }

    fn remove_items(
        collection: &dyn TrackedCollection<T>,
        items: &[T],
        start: Option<usize>,
    ) -> Result<()> {
        match start {
            Some(start) if collection.supports_positional_insert() => {
                for _ in items {
                    collection.remove_at(start)?;
                }
            }
            _ => {
                for item in items {
                    collection.remove_item(item)?;
                }
            }
        }
        Ok(())
    }
}

/// Type-erased collection record stored inside [`ChangeRecord::Collection`]
pub trait CollectionRecord {
    /// Kind of splice
    fn action(&self) -> CollectionAction;

    /// Number of items removed
    fn removed_count(&self) -> usize;

    /// Number of items added
    fn added_count(&self) -> usize;

    /// Reverse the splice
    fn undo(&self) -> Result<()>;

    /// Apply the splice again
    fn redo(&self) -> Result<()>;
}

impl<T: Clone + PartialEq + 'static> CollectionRecord for CollectionChange<T> {
    fn action(&self) -> CollectionAction {
        self.action
    }

    fn removed_count(&self) -> usize {
        self.old_items.len()
    }

    fn added_count(&self) -> usize {
        self.new_items.len()
    }

    fn undo(&self) -> Result<()> {
        let collection = self.target()?;
        trace!(action = %self.action, "Undoing collection change");
        match self.action {
            CollectionAction::Add => {
                Self::remove_items(collection.as_ref(), &self.new_items, self.new_index)
            }
            CollectionAction::Remove | CollectionAction::Reset => {
                Self::insert_items(collection.as_ref(), &self.old_items, self.old_index)
            }
        }
    }

    fn redo(&self) -> Result<()> {
        let collection = self.target()?;
        trace!(action = %self.action, "Redoing collection change");
        match self.action {
            CollectionAction::Reset => collection.clear(),
            CollectionAction::Add => {
                Self::insert_items(collection.as_ref(), &self.new_items, self.new_index)
            }
            CollectionAction::Remove => {
                Self::remove_items(collection.as_ref(), &self.old_items, self.old_index)
            }
        }
    }
}

/// One reversible mutation
pub enum ChangeRecord {
    /// A property assignment
    Property(PropertyChange),
    /// A collection splice
    Collection(Box<dyn CollectionRecord>),
}

impl ChangeRecord {
    /// Wrap a typed collection change
    pub fn collection<T: Clone + PartialEq + 'static>(change: CollectionChange<T>) -> Self {
        ChangeRecord::Collection(Box::new(change))
    }

    /// Reverse the mutation
    pub fn undo(&self) -> Result<()> {
        match self {
            ChangeRecord::Property(change) => change.undo(),
            ChangeRecord::Collection(change) => change.undo(),
        }
    }

    /// Apply the mutation again
    pub fn redo(&self) -> Result<()> {
        match self {
            ChangeRecord::Property(change) => change.redo(),
            ChangeRecord::Collection(change) => change.redo(),
        }
    }

    /// Describe the record without its payload
    pub fn summary(&self) -> RecordSummary {
        match self {
            ChangeRecord::Property(change) => RecordSummary::Property {
                owner: change.owner_type,
                property: change.property,
            },
            ChangeRecord::Collection(change) => RecordSummary::Collection {
                action: change.action(),
                removed: change.removed_count(),
                added: change.added_count(),
            },
        }
    }
}

impl From<PropertyChange> for ChangeRecord {
    fn from(change: PropertyChange) -> Self {
        ChangeRecord::Property(change)
    }
}

impl fmt::Debug for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeRecord::Property(change) => fmt::Debug::fmt(change, f),
            ChangeRecord::Collection(change) => f
                .debug_struct("CollectionChange")
                .field("action", &change.action())
                .field("removed", &change.removed_count())
                .field("added", &change.added_count())
                .finish(),
        }
    }
}

/// Payload-free description of a record, for history views and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSummary {
    /// A property assignment
    Property {
        /// Type name of the owner
        owner: &'static str,
        /// Changed property
        property: PropertyKey,
    },
    /// A collection splice
    Collection {
        /// Kind of splice
        action: CollectionAction,
        /// Items removed
        removed: usize,
        /// Items added
        added: usize,
    },
}

impl fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSummary::Property { owner, property } => write!(f, "{}.{}", owner, property),
            RecordSummary::Collection {
                action,
                removed,
                added,
            } => write!(f, "{} (-{} +{})", action, removed, added),
        }
    }
}
