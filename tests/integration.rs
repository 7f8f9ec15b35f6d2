//! Integration tests for snapshots, evolvers and state cells.

use std::collections::HashMap;
use weakstore::{CellConfig, Evolver, Key, ReadStorage, Snapshot, StateCell, UnsyncLock};

#[derive(Debug)]
struct Widget {
    name: &'static str,
}

fn widget(name: &'static str) -> Key<Widget> {
    Key::new(Widget { name })
}

// --- Snapshot Workflows ---

#[test]
fn test_update_round_trip() {
    let a = widget("a");
    let b = widget("b");
    let c = widget("c");

    let base = Snapshot::from_entries([(a.clone(), 1), (b.clone(), 2)]);
    let next = base.update([(c.clone(), 3)]);

    let mut expected = base.to_dict();
    expected.insert(c.clone(), 3);
    assert_eq!(next.to_dict(), expected);

    assert_eq!(next.query(&a).unwrap(), 1);
    assert_eq!(next.query(&b).unwrap(), 2);
    assert_eq!(next.query(&c).unwrap(), 3);
    assert_eq!(next.len(), 3);
}

#[test]
fn test_empty_update_preserves_identity() {
    let a = widget("a");
    let snapshot = Snapshot::from_entries([(a, "value")]);
    let same = snapshot.update(Vec::new());
    assert!(Snapshot::ptr_eq(&snapshot, &same));
    assert_eq!(same.id(), snapshot.id());
}

#[test]
fn test_to_dict_keys_deref_to_objects() {
    let a = widget("alpha");
    let snapshot = Snapshot::empty().update([(a.clone(), 10)]);

    let dict = snapshot.to_dict();
    let (key, value) = dict.into_iter().next().unwrap();
    assert_eq!(key.name, "alpha");
    assert_eq!(key, a);
    assert_eq!(value, 10);
}

#[test]
fn test_lineage_parents() {
    let a = widget("a");
    let b = widget("b");
    let root: Snapshot<Widget, u32> = Snapshot::empty();
    let s1 = root.update([(a.clone(), 1)]);
    let s2 = s1.update([(b.clone(), 2)]);

    assert!(Snapshot::ptr_eq(&s2.parent().unwrap(), &s1));
    assert!(Snapshot::ptr_eq(&s1.parent().unwrap(), &root));
    assert!(root.parent().is_none());

    drop(s1);
    assert!(s2.parent().is_none());
    assert_eq!(s2.query(&a).unwrap(), 1);
}

// --- Evolver Workflows ---

#[test]
fn test_evolver_round_trip() {
    let a = widget("a");
    let b = widget("b");
    let c = widget("c");
    let storage = Snapshot::from_entries([(a.clone(), 1), (b.clone(), 2)]);

    let mut evolver = Evolver::new(storage.clone());
    assert_eq!(storage.to_dict(), evolver.to_dict());

    evolver.update([(c.clone(), 3)]);
    assert_ne!(storage.to_dict(), evolver.to_dict());

    let forked = evolver.fork();
    evolver.reset();
    assert_eq!(storage.to_dict(), evolver.to_dict());

    let committed = forked.storage();
    assert_eq!(committed.to_dict(), forked.to_dict());

    let expected: HashMap<_, _> = [(a.clone(), 1), (b.clone(), 2), (c.clone(), 3)]
        .into_iter()
        .collect();
    assert_eq!(committed.to_dict(), expected);
}

#[test]
fn test_evolver_fork_independence() {
    let key = widget("k");
    let mut evolver: Evolver<Widget, i32> = Evolver::default();
    evolver.update([(key.clone(), 1)]);

    let mut forked = evolver.fork();
    forked.update([(key.clone(), 2)]);

    assert_ne!(evolver.query(&key).unwrap(), forked.query(&key).unwrap());
}

#[test]
fn test_evolver_chained_updates() {
    let a = widget("a");
    let b = widget("b");
    let mut evolver = Snapshot::empty().evolver();
    evolver
        .update([(a.clone(), "first")])
        .update([(b.clone(), "second"), (a.clone(), "third")]);

    assert_eq!(evolver.updates().len(), 2);
    assert_eq!(evolver.query(&a).unwrap(), "third");
    assert_eq!(evolver.get(&b, "none"), "second");
}

#[test]
fn test_read_storage_is_generic() {
    fn total<S: ReadStorage<Widget, u32>>(storage: &S) -> u32 {
        storage.to_dict().values().sum()
    }

    let a = widget("a");
    let b = widget("b");
    let snapshot = Snapshot::from_entries([(a.clone(), 1)]);
    let mut evolver = snapshot.evolver();
    evolver.update([(b.clone(), 2)]);

    assert_eq!(total(&snapshot), 1);
    assert_eq!(total(&evolver), 3);
    assert!(ReadStorage::contains(&evolver, &b));
    assert_eq!(ReadStorage::get(&snapshot, &b, 0), 0);
}

// --- State Cell Workflows ---

#[test]
fn test_cell_transaction_workflow() {
    let cell: StateCell<Widget, String> = StateCell::new(CellConfig {
        name: "widgets".to_string(),
        history_limit: 4,
    });
    let a = widget("a");
    let b = widget("b");

    cell.write(|evolver| {
        evolver.update([(a.clone(), "created".to_string())]);
        evolver.update([(b.clone(), "created".to_string())]);
        Ok(())
    })
    .unwrap();
    let first = cell.take_snapshot();

    cell.write(|evolver| {
        let current = evolver.query(&a)?;
        evolver.update([(a.clone(), format!("{}+edited", current))]);
        Ok(())
    })
    .unwrap();

    assert_eq!(first.query(&a).unwrap(), "created");
    assert_eq!(
        cell.read(|snapshot| snapshot.query(&a)).unwrap(),
        "created+edited"
    );
    assert_eq!(cell.history().len(), 2);
}

#[test]
fn test_cell_nested_write_kept() {
    let cell: StateCell<Widget, u32, UnsyncLock> =
        StateCell::with_lock(CellConfig::default(), UnsyncLock::new());
    let outer = widget("outer");
    let inner = widget("inner");

    cell.write(|evolver| {
        evolver.update([(outer.clone(), 1)]);
        cell.write(|nested| {
            nested.update([(inner.clone(), 2)]);
            Ok(())
        })
    })
    .unwrap();

    let snapshot = cell.take_snapshot();
    assert_eq!(snapshot.query(&outer).unwrap(), 1);
    assert_eq!(snapshot.query(&inner).unwrap(), 2);
}

#[test]
fn test_cell_seeded_with_snapshot() {
    let a = widget("a");
    let seed = Snapshot::from_entries([(a.clone(), 5u8)]);
    let cell = StateCell::with_snapshot(CellConfig::default(), UnsyncLock::new(), seed.clone());

    assert!(Snapshot::ptr_eq(&cell.take_snapshot(), &seed));
    assert_eq!(cell.read(|snapshot| snapshot.get(&a, 0)), 5);
}
