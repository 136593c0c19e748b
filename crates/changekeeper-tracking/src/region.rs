//! Capture hooks: property regions and collection notifications
//!
//! A setter opens a [`PropertyRegion`] before mutating and keeps it alive
//! until the mutation is done:
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use changekeeper_tracking::{ChangesetManager, PropertyKey, Result, Tracked, Value};
//!
//! struct Gauge {
//!     level: Cell<i64>,
//!     manager: Rc<ChangesetManager>,
//! }
//!
//! impl Gauge {
//!     const LEVEL: PropertyKey = PropertyKey::new("level");
//!
//!     fn set_level(self: &Rc<Self>, level: i64) -> Result<()> {
//!         let _region = self.manager.begin_region(self, Self::LEVEL, level)?;
//!         self.level.set(level);
//!         Ok(())
//!     }
//! }
//!
//! impl Tracked for Gauge {
//!     fn read_property(&self, _property: PropertyKey) -> Result<Value> {
//!         Ok(Value::Int(self.level.get()))
//!     }
//!
//!     fn write_property(&self, property: PropertyKey, value: Value) -> Result<()> {
//!         self.level.set(value.expect_int(property)?);
//!         Ok(())
//!     }
//! }
//!
//! let manager = Rc::new(ChangesetManager::new());
//! let gauge = Rc::new(Gauge { level: Cell::new(1), manager: manager.clone() });
//!
//! manager.start_changeset("Raise level")?;
//! gauge.set_level(5)?;
//! manager.commit(false)?;
//!
//! manager.undo()?;
//! assert_eq!(gauge.level.get(), 1);
//! # Ok::<(), changekeeper_tracking::TrackingError>(())
//! ```

use std::rc::{Rc, Weak};

use tracing::{error, trace};

use crate::change::{
    ChangeRecord, CollectionAction, CollectionChange, PropertyChange, Tracked, TrackedCollection,
};
use crate::changeset::Changeset;
use crate::error::Result;
use crate::manager::ChangesetManager;
use crate::value::{PropertyKey, Value};

/// Scope during which one property mutation is eligible for capture
///
/// Dropping the region closes it. Regions opened while another region of the
/// same changeset is open are nested and record nothing.
#[must_use = "the capture region closes as soon as the guard is dropped"]
pub struct PropertyRegion {
    changeset: Option<Rc<Changeset>>,
    outermost: bool,
}

impl PropertyRegion {
    fn inert() -> Self {
        PropertyRegion {
            changeset: None,
            outermost: false,
        }
    }

    /// Whether the region belongs to an open changeset
    pub fn is_active(&self) -> bool {
        self.changeset.is_some()
    }

    /// Whether this region recorded the change (not nested, not inert)
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    /// Close the region explicitly
    pub fn close(self) {}
}

impl Drop for PropertyRegion {
    fn drop(&mut self) {
        if let Some(changeset) = self.changeset.take() {
            changeset.exit_region();
        }
    }
}

impl ChangesetManager {
    /// Open a capture region for `property` of `owner` about to become `new_value`
    ///
    /// The old value is read from the owner before the caller mutates it. The
    /// returned region is inert when nothing is open, tracking is disabled or
    /// a replay is running.
    pub fn begin_region<O>(
        &self,
        owner: &Rc<O>,
        property: PropertyKey,
        new_value: impl Into<Value>,
    ) -> Result<PropertyRegion>
    where
        O: Tracked + 'static,
    {
        let weak: Weak<dyn Tracked> = Rc::downgrade(owner) as Weak<dyn Tracked>;
        self.begin_region_dyn(owner.as_ref(), weak, property, new_value.into())
    }

    /// [`begin_region`](Self::begin_region) for owners already erased to `dyn Tracked`
    pub fn begin_region_dyn(
        &self,
        owner: &dyn Tracked,
        handle: Weak<dyn Tracked>,
        property: PropertyKey,
        new_value: Value,
    ) -> Result<PropertyRegion> {
        if !self.is_capturing() {
            return Ok(PropertyRegion::inert());
        }
        let Some(changeset) = self.open_changeset() else {
            return Ok(PropertyRegion::inert());
        };
        if !changeset.enter_region() {
            trace!(property = %property, "Nested property region, not captured");
            return Ok(PropertyRegion {
                changeset: Some(changeset),
                outermost: false,
            });
        }

        let old_value = match owner.read_property(property) {
            Ok(value) => value,
            Err(err) => {
                changeset.exit_region();
                error!(
                    owner = owner.type_name(),
                    property = %property,
                    error = %err,
                    "Cannot capture property change"
                );
                return Err(err);
            }
        };
        trace!(
            owner = owner.type_name(),
            property = %property,
            from = %old_value,
            to = %new_value,
            "Capturing property change"
        );

        let record = PropertyChange::new(handle, owner.type_name(), property, old_value, new_value);
        if let Err(err) = changeset.append(record) {
            changeset.exit_region();
            return Err(err);
        }
        Ok(PropertyRegion {
            changeset: Some(changeset),
            outermost: true,
        })
    }

    /// Record a splice reported by an observable collection
    ///
    /// `old_items` start at `old_index` before the splice, `new_items` start
    /// at `new_index` after it.
    pub fn on_collection_changed<T>(
        &self,
        collection: Weak<dyn TrackedCollection<T>>,
        action: CollectionAction,
        old_items: Vec<T>,
        old_index: Option<usize>,
        new_items: Vec<T>,
        new_index: Option<usize>,
    ) -> Result<()>
    where
        T: Clone + PartialEq + 'static,
    {
        if !self.is_capturing() {
            return Ok(());
        }
        let Some(changeset) = self.open_changeset() else {
            return Ok(());
        };
        changeset.append(ChangeRecord::collection(CollectionChange::new(
            collection, action, old_items, old_index, new_items, new_index,
        )))
    }

    /// Record that a collection is about to be cleared
    ///
    /// Must be called before the items are removed, with all of them in order.
    pub fn on_collection_clearing<T>(
        &self,
        collection: Weak<dyn TrackedCollection<T>>,
        items: Vec<T>,
    ) -> Result<()>
    where
        T: Clone + PartialEq + 'static,
    {
        self.on_collection_changed(
            collection,
            CollectionAction::Reset,
            items,
            Some(0),
            Vec::new(),
            None,
        )
    }
}
