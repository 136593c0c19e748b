//! Property-based tests for history navigation and pruning
//!
//! Random sequences of commits, undo/redo, pruning and saves are run against
//! the manager and a plain reference model. The live state must always equal
//! the initial state with `changesets[0..cursor)` applied, and the dirty flag
//! must be set exactly when the live state differs from the last saved one.
//! Random list splices grouped into changesets must replay to the list
//! contents recorded after each step.

use std::cell::Cell;
use std::rc::Rc;

use changekeeper_tracking::{
    ChangesetManager, DirtyTracker, ObservableList, PropertyKey, Result, Tracked, TrackingConfig,
    Value,
};
use proptest::prelude::*;

/// Object whose only property is the id of the last committed edit
struct Register {
    value: Cell<i64>,
}

impl Register {
    const VALUE: PropertyKey = PropertyKey::new("value");
}

impl Tracked for Register {
    fn read_property(&self, _property: PropertyKey) -> Result<Value> {
        Ok(Value::Int(self.value.get()))
    }

    fn write_property(&self, property: PropertyKey, value: Value) -> Result<()> {
        self.value.set(value.expect_int(property)?);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Commit,
    Undo,
    Redo,
    RemoveTo(usize),
    RemoveFrom(usize),
    MarkClean,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Commit),
        3 => Just(Op::Undo),
        2 => Just(Op::Redo),
        1 => (0usize..6).prop_map(Op::RemoveTo),
        1 => (0usize..6).prop_map(Op::RemoveFrom),
        1 => Just(Op::MarkClean),
    ]
}

/// Reference history: `base` is the state at cursor 0, `states[i]` the state
/// after changeset `i`
#[derive(Debug)]
struct Model {
    base: i64,
    states: Vec<i64>,
    cursor: usize,
    saved: i64,
}

impl Model {
    fn new() -> Self {
        Model {
            base: 0,
            states: Vec::new(),
            cursor: 0,
            saved: 0,
        }
    }

    fn live(&self) -> i64 {
        match self.cursor {
            0 => self.base,
            n => self.states[n - 1],
        }
    }

    fn commit(&mut self, id: i64, max: Option<usize>) {
        self.states.truncate(self.cursor);
        self.states.push(id);
        self.cursor = self.states.len();
        if let Some(max) = max {
            if self.states.len() > max {
                let excess = self.states.len() - max;
                self.remove_to(excess);
            }
        }
    }

    fn remove_to(&mut self, index: usize) {
        let index = index.min(self.states.len());
        if index == 0 {
            return;
        }
        self.cursor = self.cursor.max(index) - index;
        self.base = self.states[index - 1];
        self.states.drain(..index);
    }

    fn remove_from(&mut self, index: usize) {
        if index >= self.states.len() {
            return;
        }
        self.cursor = self.cursor.min(index);
        self.states.truncate(index);
    }
}

#[derive(Debug, Clone)]
enum ListOp {
    Push(u8),
    Insert(usize, u8),
    RemoveAt(usize),
    RemoveItem(u8),
    Clear,
}

fn arb_list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        3 => (0u8..5).prop_map(ListOp::Push),
        3 => (0usize..8, 0u8..5).prop_map(|(index, item)| ListOp::Insert(index, item)),
        2 => (0usize..8).prop_map(ListOp::RemoveAt),
        2 => (0u8..5).prop_map(ListOp::RemoveItem),
        1 => Just(ListOp::Clear),
    ]
}

/// Apply one edit, folding out-of-range positions into the current length
fn apply_list_op(list: &ObservableList<u8>, op: &ListOp) {
    match *op {
        ListOp::Push(item) => list.push(item).unwrap(),
        ListOp::Insert(index, item) => list.insert(index % (list.len() + 1), item).unwrap(),
        ListOp::RemoveAt(index) => {
            if !list.is_empty() {
                list.remove_at(index % list.len()).unwrap();
            }
        }
        ListOp::RemoveItem(item) => {
            list.remove_item(&item).unwrap();
        }
        ListOp::Clear => list.clear().unwrap(),
    }
}

fn run(ops: &[Op], max: Option<usize>) {
    let config = match max {
        Some(max) => TrackingConfig::default().with_max_changesets(max),
        None => TrackingConfig::default(),
    };
    let manager = Rc::new(ChangesetManager::with_config(config).unwrap());
    let tracker = DirtyTracker::attach(&manager);
    let register = Rc::new(Register {
        value: Cell::new(0),
    });
    let mut model = Model::new();
    let mut next_id = 1;

    for op in ops {
        match op {
            Op::Commit => {
                let id = next_id;
                next_id += 1;
                manager.start_changeset(format!("Edit {}", id)).unwrap();
                {
                    let _region = manager
                        .begin_region(&register, Register::VALUE, id)
                        .unwrap();
                    register.value.set(id);
                }
                manager.commit(false).unwrap();
                model.commit(id, max);
            }
            Op::Undo => {
                manager.undo().unwrap();
                model.cursor = model.cursor.saturating_sub(1);
            }
            Op::Redo => {
                manager.redo().unwrap();
                model.cursor = (model.cursor + 1).min(model.states.len());
            }
            Op::RemoveTo(index) => {
                manager.remove_to(*index).unwrap();
                model.remove_to(*index);
            }
            Op::RemoveFrom(index) => {
                manager.remove_from(*index).unwrap();
                model.remove_from(*index);
            }
            Op::MarkClean => {
                tracker.mark_clean();
                model.saved = model.live();
            }
        }

        assert_eq!(manager.len(), model.states.len(), "after {:?}", op);
        assert_eq!(manager.cursor(), model.cursor, "after {:?}", op);
        assert_eq!(register.value.get(), model.live(), "after {:?}", op);
        assert_eq!(
            tracker.is_dirty(),
            model.live() != model.saved,
            "after {:?}",
            op
        );
    }
}

proptest! {
    /// The live state always matches the reference model
    #[test]
    fn prop_history_matches_model(ops in prop::collection::vec(arb_op(), 1..60)) {
        run(&ops, None);
    }

    /// A history cap prunes like explicit `remove_to` calls
    #[test]
    fn prop_capped_history_matches_model(
        ops in prop::collection::vec(arb_op(), 1..60),
        max in 1usize..5,
    ) {
        run(&ops, Some(max));
    }

    /// Undoing everything and redoing everything is a round trip
    #[test]
    fn prop_full_undo_redo_round_trip(commits in 1usize..20) {
        let manager = Rc::new(ChangesetManager::new());
        let register = Rc::new(Register { value: Cell::new(0) });
        for id in 1..=commits as i64 {
            manager.start_changeset("Edit").unwrap();
            let region = manager.begin_region(&register, Register::VALUE, id).unwrap();
            register.value.set(id);
            region.close();
            manager.commit(false).unwrap();
        }

        manager.restore_to(0).unwrap();
        prop_assert_eq!(register.value.get(), 0);
        manager.restore_to(commits).unwrap();
        prop_assert_eq!(register.value.get(), commits as i64);
        prop_assert!(!manager.can_redo());
    }

    /// Collection splices replay to the exact list contents of every step
    #[test]
    fn prop_collection_changesets_round_trip(
        initial in prop::collection::vec(0u8..5, 0..6),
        groups in prop::collection::vec(prop::collection::vec(arb_list_op(), 1..6), 1..5),
    ) {
        let manager = Rc::new(ChangesetManager::new());
        let list = ObservableList::with_items(&manager, initial.clone());
        let mut snapshots = vec![initial];

        for (step, group) in groups.iter().enumerate() {
            manager.start_changeset(format!("Step {}", step)).unwrap();
            for op in group {
                apply_list_op(&list, op);
            }
            manager.commit(false).unwrap();
            snapshots.push(list.to_vec());
        }

        for step in (0..groups.len()).rev() {
            manager.undo().unwrap();
            prop_assert_eq!(&list.to_vec(), &snapshots[step]);
        }
        for step in 1..=groups.len() {
            manager.redo().unwrap();
            prop_assert_eq!(&list.to_vec(), &snapshots[step]);
        }
    }
}
