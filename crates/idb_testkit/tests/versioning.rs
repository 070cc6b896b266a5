//! Opening, upgrading and deleting databases.

use idb_core::{
    Engine, Event, Heap, IndexParameters, Key, ObjectStoreParameters, Outcome, Query, StructuredValue,
    TransactionMode, TransactionOptions, Value,
};
use idb_testkit::prelude::*;

#[test]
fn fresh_open_runs_an_upgrade_from_version_zero() {
    init_tracing();
    let engine = Engine::new();
    let request = engine.open("fresh", Some(3)).unwrap();

    let Some(Event::UpgradeNeeded {
        request: upgrade_request,
        connection,
        transaction,
        old_version,
        new_version,
    }) = engine.next_event()
    else {
        panic!("expected upgradeneeded");
    };
    assert_eq!((old_version, new_version), (0, 3));
    assert_eq!(upgrade_request, request);
    assert_eq!(request.transaction(), Some(transaction.clone()));
    assert_eq!(transaction.mode(), TransactionMode::VersionChange);
    assert_eq!(connection.version(), 3);
    connection.create_object_store("s", ObjectStoreParameters::new()).unwrap();

    assert_eq!(drain(&engine), vec!["complete", "success"]);
    assert_eq!(request.transaction(), None);
    assert_eq!(request.connection().unwrap(), connection);
    assert_eq!(engine.databases(), vec![("fresh".to_string(), 3)]);
}

#[test]
fn reopening_at_the_same_version_skips_the_upgrade() {
    let engine = Engine::new();
    open_with_stores(&engine, "db", &["s"]);
    let request = engine.open("db", None).unwrap();
    assert_eq!(drain(&engine), vec!["success"]);
    assert_eq!(request.connection().unwrap().version(), 1);
}

#[test]
fn lower_version_fails_with_version_error() {
    let engine = Engine::new();
    open_db(&engine, "db", 2, |_, _| {});
    let request = engine.open("db", Some(1)).unwrap();
    assert_eq!(drain(&engine), vec!["error"]);
    assert_eq!(failure(&request).name(), "VersionError");
    assert_eq!(request.result().unwrap(), Outcome::Undefined);
}

#[test]
fn upgrade_waits_for_other_connections_to_close() {
    let engine = Engine::new();
    let first = open_with_stores(&engine, "db", &["s"]);
    let request = engine.open("db", Some(2)).unwrap();

    let events = engine.run_until_idle();
    let names: Vec<&str> = events.iter().map(Event::name).collect();
    assert_eq!(names, vec!["versionchange", "blocked"]);
    match &events[0] {
        Event::VersionChange {
            connection,
            old_version,
            new_version,
        } => {
            assert_eq!(connection, &first);
            assert_eq!((*old_version, *new_version), (1, Some(2)));
        }
        other => panic!("unexpected {other:?}"),
    }

    first.close();
    assert_eq!(drain(&engine), vec!["upgradeneeded", "complete", "success"]);
    assert_eq!(request.connection().unwrap().version(), 2);
}

#[test]
fn closing_from_versionchange_avoids_blocked() {
    let engine = Engine::new();
    open_with_stores(&engine, "db", &["s"]);
    let request = engine.open("db", Some(2)).unwrap();

    let mut names = Vec::new();
    while let Some(event) = engine.next_event() {
        if let Event::VersionChange { connection, .. } = &event {
            connection.close();
        }
        names.push(event.name());
    }
    assert_eq!(names, vec!["versionchange", "upgradeneeded", "complete", "success"]);
    assert!(request.connection().is_some());
}

#[test]
fn aborted_upgrade_reverts_schema_and_fails_the_open() {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "db", &["keep"]);
    db.close();

    let request = engine.open("db", Some(2)).unwrap();
    let mut names = Vec::new();
    while let Some(event) = engine.next_event() {
        if let Event::UpgradeNeeded {
            connection, transaction, ..
        } = &event
        {
            connection.create_object_store("doomed", ObjectStoreParameters::new()).unwrap();
            connection.delete_object_store("keep").unwrap();
            transaction.abort().unwrap();
            assert_eq!(connection.version(), 1);
        }
        names.push(event.name());
    }
    assert_eq!(names, vec!["upgradeneeded", "abort", "error"]);
    assert_eq!(failure(&request).name(), "AbortError");

    let db = open_db(&engine, "db", 1, |_, _| panic!("no upgrade expected"));
    assert_eq!(db.object_store_names(), vec!["keep"]);
}

#[test]
fn aborted_upgrade_reverts_renames() {
    let engine = Engine::new();
    let db = open_db(&engine, "db", 1, |db, _| {
        let store = db.create_object_store("people", ObjectStoreParameters::new()).unwrap();
        store.create_index("by_name", "name", IndexParameters::new()).unwrap();
    });
    db.close();

    let request = engine.open("db", Some(2)).unwrap();
    while let Some(event) = engine.next_event() {
        if let Event::UpgradeNeeded {
            connection, transaction, ..
        } = &event
        {
            let store = transaction.object_store("people").unwrap();
            store.set_name("persons").unwrap();
            store.index("by_name").unwrap().set_name("by_full_name").unwrap();
            assert_eq!(connection.object_store_names(), vec!["persons"]);
            assert_eq!(store.index_names(), vec!["by_full_name"]);
            transaction.abort().unwrap();
        }
    }
    assert_eq!(failure(&request).name(), "AbortError");

    let db = open_db(&engine, "db", 1, |_, _| panic!("no upgrade expected"));
    assert_eq!(db.object_store_names(), vec!["people"]);
    let txn = transaction(&db, &["people"], TransactionMode::ReadOnly);
    assert_eq!(txn.object_store("people").unwrap().index_names(), vec!["by_name"]);
    drain(&engine);
}

#[test]
fn aborting_the_first_upgrade_forgets_the_database() {
    let engine = Engine::new();
    let request = engine.open("ghost", Some(1)).unwrap();
    while let Some(event) = engine.next_event() {
        if let Event::UpgradeNeeded { transaction, .. } = &event {
            transaction.abort().unwrap();
        }
    }
    assert_eq!(failure(&request).name(), "AbortError");
    assert!(engine.databases().is_empty());
}

#[test]
fn unique_index_over_conflicting_records_aborts_the_upgrade() {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "db", &["s"]);
    seed(
        &engine,
        &db,
        "s",
        &[(Key::from(1), StructuredValue::from("same")), (Key::from(2), StructuredValue::from("same"))],
    );
    db.close();

    let request = engine.open("db", Some(2)).unwrap();
    let mut aborted_with = None;
    while let Some(event) = engine.next_event() {
        match &event {
            Event::UpgradeNeeded { transaction, .. } => {
                let store = transaction.object_store("s").unwrap();
                store.create_index("value", "", IndexParameters::new().unique(true)).unwrap();
            }
            Event::Abort { error, .. } => aborted_with = error.clone(),
            _ => {}
        }
    }
    assert_eq!(aborted_with.map(|e| e.name()), Some("ConstraintError"));
    assert_eq!(failure(&request).name(), "AbortError");
}

#[test]
fn multi_entry_index_over_invalid_elements_aborts_the_upgrade() {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "db", &["s"]);
    let mut heap = Heap::new();
    let tags = heap.array([Value::from("a"), Value::Null]);
    let root = heap.object([("tags", tags)]);
    seed(&engine, &db, "s", &[(Key::from(1), StructuredValue::new(heap, root))]);
    db.close();

    let request = engine.open("db", Some(2)).unwrap();
    let mut aborted_with = None;
    while let Some(event) = engine.next_event() {
        match &event {
            Event::UpgradeNeeded { transaction, .. } => {
                let store = transaction.object_store("s").unwrap();
                store.create_index("tags", "tags", IndexParameters::new().multi_entry(true)).unwrap();
            }
            Event::Abort { error, .. } => aborted_with = error.clone(),
            _ => {}
        }
    }
    assert_eq!(aborted_with.map(|e| e.name()), Some("DataError"));
    assert_eq!(failure(&request).name(), "AbortError");
}

#[test]
fn schema_changes_outside_an_upgrade_fail() {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "db", &["s"]);
    assert_eq!(
        db.create_object_store("t", ObjectStoreParameters::new()).unwrap_err().name(),
        "InvalidStateError"
    );
    assert_eq!(db.delete_object_store("s").unwrap_err().name(), "InvalidStateError");

    let txn = transaction(&db, &["s"], TransactionMode::ReadWrite);
    let store = txn.object_store("s").unwrap();
    assert_eq!(store.set_name("t").unwrap_err().name(), "InvalidStateError");
    assert_eq!(
        store.create_index("i", "x", IndexParameters::new()).unwrap_err().name(),
        "InvalidStateError"
    );
    drain(&engine);
}

#[test]
fn create_object_store_checks_in_order() {
    let engine = Engine::new();
    open_db(&engine, "db", 1, |db, _| {
        db.create_object_store("s", ObjectStoreParameters::new()).unwrap();
        assert_eq!(
            db.create_object_store("s", ObjectStoreParameters::new().key_path("a b"))
                .unwrap_err()
                .name(),
            "SyntaxError"
        );
        assert_eq!(
            db.create_object_store("s", ObjectStoreParameters::new()).unwrap_err().name(),
            "ConstraintError"
        );
        assert_eq!(
            db.create_object_store("t", ObjectStoreParameters::new().key_path("").auto_increment(true))
                .unwrap_err()
                .name(),
            "InvalidAccessError"
        );
        assert_eq!(
            db.create_object_store("t", ObjectStoreParameters::new().key_path(vec!["a", "b"]).auto_increment(true))
                .unwrap_err()
                .name(),
            "InvalidAccessError"
        );
        assert_eq!(db.delete_object_store("missing").unwrap_err().name(), "NotFoundError");
    });
}

#[test]
fn renames_during_an_upgrade_are_visible_and_checked() {
    let engine = Engine::new();
    let db = open_db(&engine, "db", 1, |db, _| {
        let a = db.create_object_store("a", ObjectStoreParameters::new()).unwrap();
        db.create_object_store("b", ObjectStoreParameters::new()).unwrap();
        assert_eq!(a.set_name("b").unwrap_err().name(), "ConstraintError");
        a.set_name("c").unwrap();
        assert_eq!(a.name(), "c");
        let index = a.create_index("i", "x", IndexParameters::new()).unwrap();
        index.set_name("j").unwrap();
        assert_eq!(a.index_names(), vec!["j"]);
    });
    assert_eq!(db.object_store_names(), vec!["b", "c"]);
}

#[test]
fn deleted_store_handle_fails_with_invalid_state() {
    let engine = Engine::new();
    open_db(&engine, "db", 1, |db, _| {
        let store = db.create_object_store("s", ObjectStoreParameters::new()).unwrap();
        db.delete_object_store("s").unwrap();
        assert_eq!(store.name(), "s");
        assert_eq!(
            store.put(&StructuredValue::from(1.0), Some(Key::from(1))).unwrap_err().name(),
            "InvalidStateError"
        );
        assert_eq!(store.count(Query::All).unwrap_err().name(), "InvalidStateError");
        assert_eq!(store.index("i").unwrap_err().name(), "InvalidStateError");
    });
}

#[test]
fn delete_database_waits_for_connections_and_removes_data() {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "db", &["s"]);
    seed(&engine, &db, "s", &[(Key::from(1), StructuredValue::from("x"))]);

    let request = engine.delete_database("db");
    let mut names = Vec::new();
    while let Some(event) = engine.next_event() {
        if let Event::VersionChange { new_version, connection, .. } = &event {
            assert_eq!(*new_version, None);
            connection.close();
        }
        names.push(event.name());
    }
    assert_eq!(names, vec!["versionchange", "success"]);
    assert_eq!(outcome(&request), Outcome::Undefined);
    assert!(engine.databases().is_empty());

    let db = open_with_stores(&engine, "db", &["s"]);
    let txn = db
        .transaction(["s"], TransactionMode::ReadOnly, TransactionOptions::new())
        .unwrap();
    let count = txn.object_store("s").unwrap().count(Query::All).unwrap();
    drain(&engine);
    assert_eq!(outcome(&count), Outcome::Count(0));
}

#[test]
fn requests_for_one_database_run_in_order() {
    let engine = Engine::new();
    let open = engine.open("db", Some(1)).unwrap();
    let delete = engine.delete_database("db");
    let reopen = engine.open("db", None).unwrap();

    let mut names = Vec::new();
    while let Some(event) = engine.next_event() {
        if let Event::VersionChange { connection, .. } = &event {
            connection.close();
        }
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec!["upgradeneeded", "complete", "success", "versionchange", "success", "upgradeneeded", "complete", "success"]
    );
    assert!(open.connection().is_some());
    assert_eq!(outcome(&delete), Outcome::Undefined);
    assert_eq!(reopen.connection().unwrap().version(), 1);
}

#[test]
fn renaming_a_store_to_its_own_name_changes_nothing() {
    let engine = Engine::new();
    let db = open_db(&engine, "db", 1, |db, _| {
        let store = db.create_object_store("s", ObjectStoreParameters::new()).unwrap();
        store.create_index("i", "", IndexParameters::new()).unwrap();
    });
    seed(&engine, &db, "s", &[(Key::from(1), StructuredValue::from("x"))]);
    db.close();

    let db = open_db(&engine, "db", 2, |_, txn| {
        txn.object_store("s").unwrap().set_name("s").unwrap();
    });
    assert_eq!(db.object_store_names(), vec!["s"]);
    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let store = txn.object_store("s").unwrap();
    assert_eq!(store.index_names(), vec!["i"]);
    let via_index = store.index("i").unwrap().get_key("x").unwrap();
    drain(&engine);
    assert_eq!(outcome(&via_index), Outcome::Key(Key::from(1)));
}
