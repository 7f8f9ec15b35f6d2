//! Error handling and edge case tests.

use weakstore::{
    CellConfig, ContextLock, Evolver, Key, LockContext, Snapshot, StateCell, StoreError,
    ThreadedLock, UnsyncLock,
};

// --- Lookup Errors ---

#[test]
fn test_query_absent_key() {
    let snapshot: Snapshot<(), u8> = Snapshot::empty();
    let key = Key::new(());

    let err = snapshot.query(&key).unwrap_err();
    assert_eq!(err, StoreError::NotFound(key.id()));
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), format!("Key not found: {}", key.id()));
}

#[test]
fn test_get_maps_not_found_to_fallback() {
    let present = Key::new(());
    let absent = Key::new(());
    let snapshot = Snapshot::from_entries([(present.clone(), 1)]);

    assert_eq!(snapshot.get(&present, 0), 1);
    assert_eq!(snapshot.get(&absent, 0), 0);

    let evolver = Evolver::new(snapshot);
    assert_eq!(evolver.get(&absent, -1), -1);
}

#[test]
fn test_evolver_query_propagates_not_found() {
    let key = Key::new(());
    let evolver: Evolver<(), i32> = Evolver::default();
    assert!(matches!(evolver.query(&key), Err(StoreError::NotFound(id)) if id == key.id()));
}

#[test]
fn test_lookup_after_reinsertion_under_new_identity() {
    let first = Key::new("obj");
    let snapshot = Snapshot::from_entries([(first.clone(), 1)]);
    let first_id = first.id();
    drop(first);

    let second = Key::new("obj");
    assert_ne!(second.id(), first_id);
    assert!(snapshot.query(&second).is_err());

    let next = snapshot.update([(second.clone(), 2)]);
    assert_eq!(next.to_dict().len(), 1);
    assert_eq!(next.query(&second).unwrap(), 2);
}

// --- Context Errors ---

fn assert_context_rules<L: ContextLock>(lock: &L) {
    assert!(matches!(
        lock.require_context(),
        Err(StoreError::InvalidContext(_))
    ));
    assert!(lock.require_read_context().is_err());
    assert!(lock.require_write_context().is_err());

    {
        let _read = lock.read_context();
        assert_eq!(lock.require_context().unwrap(), LockContext::Read);
        assert!(lock.require_read_context().is_ok());
        assert!(lock.require_write_context().is_err());

        let err = lock.write_context().err().unwrap();
        assert_eq!(
            err,
            StoreError::InvalidContext("can't write while reading".to_string())
        );
    }

    {
        let _write = lock.write_context().unwrap();
        assert_eq!(lock.require_context().unwrap(), LockContext::Write);
        assert!(lock.require_write_context().is_ok());
        assert!(lock.require_read_context().is_err());
    }

    assert_eq!(lock.current_context(), None);
}

#[test]
fn test_unsync_context_rules() {
    assert_context_rules(&UnsyncLock::new());
}

#[test]
fn test_threaded_context_rules() {
    assert_context_rules(&ThreadedLock::new());
}

#[test]
fn test_require_messages() {
    let lock = UnsyncLock::new();
    assert_eq!(
        lock.require_read_context().unwrap_err().to_string(),
        "Invalid context: not in a read context"
    );
    assert_eq!(
        lock.require_write_context().unwrap_err().to_string(),
        "Invalid context: not in a write context"
    );
    assert_eq!(
        lock.require_context().unwrap_err().to_string(),
        "Invalid context: not in a read/write context"
    );
}

#[test]
fn test_cell_write_from_read_leaves_state_untouched() {
    let cell: StateCell<(), u8> = StateCell::new(CellConfig::default());
    let key = Key::new(());
    let before = cell.take_snapshot();

    let result = cell.read(|_| {
        cell.write(|evolver| {
            evolver.update([(key.clone(), 1)]);
            Ok(())
        })
    });

    assert!(matches!(result, Err(StoreError::InvalidContext(_))));
    assert!(Snapshot::ptr_eq(&before, &cell.take_snapshot()));
    assert_eq!(cell.lock().current_context(), None);
}
