//! End-to-end scenarios for a document edited through the tracking engine
//!
//! A small layered document (shapes with a fill and a visibility flag, plus an
//! ordered layer list) is edited, undone, pruned and saved the way an editor
//! front end would drive it.

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::{Rc, Weak};

use changekeeper_tracking::{
    ChangesetManager, DirtyTracker, HistoryEntry, HistoryEvent, ObservableList, PropertyKey,
    Result, SavedIndex, Tracked, TrackingConfig, TrackingError, Value,
};

struct Shape {
    this: Weak<Shape>,
    manager: Rc<ChangesetManager>,
    fill: RefCell<String>,
    visible: Cell<bool>,
}

impl Shape {
    const FILL: PropertyKey = PropertyKey::new("fill");
    const VISIBLE: PropertyKey = PropertyKey::new("visible");

    fn new(manager: &Rc<ChangesetManager>, fill: &str) -> Rc<Self> {
        Rc::new_cyclic(|this| Shape {
            this: this.clone(),
            manager: manager.clone(),
            fill: RefCell::new(fill.to_string()),
            visible: Cell::new(true),
        })
    }

    fn fill(&self) -> String {
        self.fill.borrow().clone()
    }

    fn set_fill(self: &Rc<Self>, fill: &str) -> Result<()> {
        let _region = self.manager.begin_region(self, Self::FILL, fill)?;
        *self.fill.borrow_mut() = fill.to_string();
        Ok(())
    }

    fn set_visible(self: &Rc<Self>, visible: bool) -> Result<()> {
        let _region = self.manager.begin_region(self, Self::VISIBLE, visible)?;
        self.visible.set(visible);
        Ok(())
    }
}

impl Tracked for Shape {
    fn type_name(&self) -> &'static str {
        "Shape"
    }

    fn read_property(&self, property: PropertyKey) -> Result<Value> {
        match property {
            Self::FILL => Ok(Value::from(self.fill())),
            Self::VISIBLE => Ok(Value::Bool(self.visible.get())),
            other => Err(TrackingError::unknown_property("Shape", other.name())),
        }
    }

    fn write_property(&self, property: PropertyKey, value: Value) -> Result<()> {
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| TrackingError::target_dropped("Shape"))?;
        match property {
            Self::FILL => this.set_fill(value.expect_text(property)?),
            Self::VISIBLE => this.set_visible(value.expect_bool(property)?),
            other => Err(TrackingError::unknown_property("Shape", other.name())),
        }
    }
}

struct Document {
    manager: Rc<ChangesetManager>,
    dirty: Rc<DirtyTracker>,
    layers: Rc<ObservableList<String>>,
    shape: Rc<Shape>,
}

impl Document {
    fn open(config: TrackingConfig) -> Result<Self> {
        let manager = Rc::new(ChangesetManager::with_config(config)?);
        let dirty = DirtyTracker::attach(&manager);
        let layers = ObservableList::with_items(&manager, vec!["Background".to_string()]);
        let shape = Shape::new(&manager, "white");
        Ok(Document {
            manager,
            dirty,
            layers,
            shape,
        })
    }

    fn edit(&self, description: &str, f: impl FnOnce(&Self) -> Result<()>) -> Result<()> {
        self.manager.run_transaction(description, || f(self))
    }

    fn snapshot(&self) -> (Vec<String>, String, bool) {
        (
            self.layers.to_vec(),
            self.shape.fill(),
            self.shape.visible.get(),
        )
    }
}

fn commit_edits(document: &Document, count: usize) {
    for i in 0..count {
        document
            .edit(&format!("Layer {}", i), |doc| {
                doc.layers.push(format!("Layer {}", i))
            })
            .unwrap();
    }
}

#[test]
fn test_undo_redo_restores_identical_state() {
    let document = Document::open(TrackingConfig::default()).unwrap();
    let initial = document.snapshot();

    document
        .edit("Restyle", |doc| {
            doc.shape.set_fill("red")?;
            doc.shape.set_visible(false)?;
            doc.layers.insert(0, "Sketch".to_string())?;
            doc.layers.remove_at(1).map(|_| ())
        })
        .unwrap();
    let edited = document.snapshot();
    assert_eq!(
        edited,
        (vec!["Sketch".to_string()], "red".to_string(), false)
    );

    document.manager.undo().unwrap();
    assert_eq!(document.snapshot(), initial);
    document.manager.redo().unwrap();
    assert_eq!(document.snapshot(), edited);
    assert_eq!(document.manager.changeset(0).unwrap().len(), 4);
}

#[test]
fn test_saved_position_shifts_when_oldest_pruned() {
    let document = Document::open(TrackingConfig::default()).unwrap();
    commit_edits(&document, 3);
    assert_eq!(document.manager.cursor(), 3);

    document.dirty.mark_clean();
    assert_eq!(document.dirty.saved_index(), SavedIndex::At(3));

    document.manager.remove_to(1).unwrap();
    assert_eq!(document.dirty.saved_index(), SavedIndex::At(2));
    assert!(!document.dirty.is_dirty());
}

#[test]
fn test_saved_position_lost_when_removed_range_straddles_it() {
    let document = Document::open(TrackingConfig::default()).unwrap();
    commit_edits(&document, 3);
    document.manager.undo().unwrap();
    document.dirty.mark_clean();
    assert_eq!(document.dirty.saved_index(), SavedIndex::At(2));

    document.manager.remove_from(1).unwrap();
    assert_eq!(document.manager.len(), 1);
    assert_eq!(document.manager.cursor(), 1);
    assert_eq!(document.dirty.saved_index(), SavedIndex::Unknown);
    assert!(document.dirty.is_dirty());
}

#[test]
fn test_branch_discard_after_undo() {
    let document = Document::open(TrackingConfig::default()).unwrap();
    commit_edits(&document, 3);
    document.manager.undo().unwrap();
    document.manager.undo().unwrap();

    document
        .edit("Recolor", |doc| doc.shape.set_fill("blue"))
        .unwrap();

    assert_eq!(
        document.manager.descriptions(),
        vec!["Layer 0".to_string(), "Recolor".to_string()]
    );
    assert_eq!(document.manager.cursor(), 2);
    assert!(!document.manager.can_redo());
    assert_eq!(
        document.layers.to_vec(),
        vec!["Background".to_string(), "Layer 0".to_string()]
    );
}

#[test]
fn test_history_panel_follows_events() {
    let document = Document::open(TrackingConfig::default()).unwrap();
    let rows: Rc<RefCell<Vec<HistoryEntry>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = rows.clone();
    document
        .manager
        .subscribe(Rc::new(move |manager: &ChangesetManager, _: &HistoryEvent| {
            *sink.borrow_mut() = manager.history_entries();
        }));

    commit_edits(&document, 2);
    document.manager.undo().unwrap();

    let entries = rows.borrow().clone();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].is_applied);
    assert!(!entries[1].is_applied);
    assert_eq!(entries[1].description, "Layer 1");

    let json = serde_json::to_string(&entries).unwrap();
    let parsed: Vec<HistoryEntry> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, entries);
}

#[test]
fn test_empty_edit_is_discarded() {
    let document = Document::open(TrackingConfig::default()).unwrap();
    document.edit("Nothing", |_| Ok(())).unwrap();
    assert!(document.manager.is_empty());
    assert!(!document.dirty.is_dirty());
}

#[test]
fn test_document_opened_with_file_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_changesets = 2").unwrap();
    writeln!(file, "discard_empty_transactions = false").unwrap();
    let config = TrackingConfig::load(file.path()).unwrap();

    let document = Document::open(config).unwrap();
    commit_edits(&document, 4);
    document.edit("Empty", |_| Ok(())).unwrap();

    assert_eq!(
        document.manager.descriptions(),
        vec!["Layer 3".to_string(), "Empty".to_string()]
    );
    assert_eq!(document.layers.len(), 5);
    document.manager.restore_to(0).unwrap();
    assert_eq!(document.layers.len(), 4);
}

#[test]
fn test_document_without_tracking() {
    let config = TrackingConfig::default().with_tracking_enabled(false);
    let document = Document::open(config).unwrap();

    document
        .edit("Invisible", |doc| doc.shape.set_fill("green"))
        .unwrap();
    assert_eq!(document.shape.fill(), "green");
    assert!(document.manager.is_empty());
    assert!(document.manager.undo_description().is_none());
}
