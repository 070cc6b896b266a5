//! Cursor iteration, movement and modification through the public API.

use idb_core::{
    Connection, CursorDirection, Engine, Event, Heap, IndexParameters, Key, KeyRange, ObjectStoreParameters, Outcome,
    Query, Request, StructuredValue, TransactionMode, Value,
};
use idb_testkit::prelude::*;

fn numbered(engine: &Engine) -> Connection {
    let db = open_with_stores(engine, "db", &["s"]);
    let records: Vec<(Key, StructuredValue)> = (1..=5)
        .map(|n| (Key::from(n), StructuredValue::from(format!("v{n}"))))
        .collect();
    seed(engine, &db, "s", &records);
    db
}

fn tagged(tag: &str, n: i32) -> StructuredValue {
    let mut heap = Heap::new();
    let root = heap.object([("id", Value::from(n)), ("tag", Value::from(tag))]);
    StructuredValue::new(heap, root)
}

/// Store `items` keyed on `id` with a non-unique `tag` index.
fn tagged_store(engine: &Engine) -> Connection {
    let db = open_db(engine, "tags", 1, |db, _| {
        let store = db
            .create_object_store("items", ObjectStoreParameters::new().key_path("id"))
            .unwrap();
        store.create_index("tag", "tag", IndexParameters::new()).unwrap();
    });
    let txn = transaction(&db, &["items"], TransactionMode::ReadWrite);
    let store = txn.object_store("items").unwrap();
    for (tag, n) in [("a", 1), ("b", 2), ("a", 3), ("c", 4), ("b", 5)] {
        store.put(&tagged(tag, n), None).unwrap();
    }
    drain(engine);
    db
}

fn is_success_of(event: &Event, request: &Request) -> bool {
    matches!(event, Event::Success { request: done } if done == request)
}

#[test]
fn store_cursor_visits_range_in_both_directions() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let range = KeyRange::bound(Key::from(2), Key::from(4), true, false).unwrap();

    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let forward = txn
        .object_store("s")
        .unwrap()
        .open_cursor(range.clone(), CursorDirection::Next)
        .unwrap();
    let keys: Vec<Key> = collect_cursor(&engine, &forward).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![Key::from(3), Key::from(4)]);
    assert_eq!(forward.result().unwrap(), Outcome::Null);

    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let backward = txn
        .object_store("s")
        .unwrap()
        .open_key_cursor(range, CursorDirection::Prev)
        .unwrap();
    let keys: Vec<Key> = collect_cursor(&engine, &backward).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![Key::from(4), Key::from(3)]);
}

#[test]
fn empty_range_yields_null_immediately() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let request = txn
        .object_store("s")
        .unwrap()
        .open_cursor(KeyRange::lower_bound(Key::from(100), false).unwrap(), CursorDirection::Next)
        .unwrap();
    drain(&engine);
    assert_eq!(outcome(&request), Outcome::Null);
    assert!(request.cursor().is_none());
}

#[test]
fn cursor_exposes_key_primary_key_and_value() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let request = txn.object_store("s").unwrap().open_cursor(Key::from(2), CursorDirection::Next).unwrap();

    let event = engine.next_event().unwrap();
    assert!(is_success_of(&event, &request));
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.key(), Some(Key::from(2)));
    assert_eq!(cursor.primary_key(), Some(Key::from(2)));
    assert_eq!(cursor.value(), Some(StructuredValue::from("v2")));
    assert_eq!(cursor.direction(), CursorDirection::Next);
    assert_eq!(cursor.request(), request);
    assert_eq!(cursor.transaction(), Some(txn.clone()));
    drain(&engine);
}

#[test]
fn key_cursor_has_no_value() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let request = txn.object_store("s").unwrap().open_key_cursor(Query::All, CursorDirection::Next).unwrap();
    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.key(), Some(Key::from(1)));
    assert_eq!(cursor.value(), None);
    drain(&engine);
}

#[test]
fn continue_to_key_skips_ahead_and_rejects_going_back() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let request = txn.object_store("s").unwrap().open_cursor(Query::All, CursorDirection::Next).unwrap();

    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    cursor.continue_(Some(Key::from(4))).unwrap();
    // The cursor is iterating until the next success.
    assert_eq!(cursor.continue_(None).unwrap_err().name(), "InvalidStateError");

    let event = engine.next_event().unwrap();
    assert!(is_success_of(&event, &request));
    assert_eq!(cursor.key(), Some(Key::from(4)));

    assert_eq!(cursor.continue_(Some(Key::from(4))).unwrap_err().name(), "DataError");
    assert_eq!(cursor.continue_(Some(Key::from(3))).unwrap_err().name(), "DataError");
    assert_eq!(
        cursor.continue_(Some(Key::Number(f64::NAN))).unwrap_err().name(),
        "DataError"
    );
    drain(&engine);
}

#[test]
fn advance_skips_and_validates_count() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let request = txn.object_store("s").unwrap().open_cursor(Query::All, CursorDirection::Next).unwrap();

    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.advance(0.0).unwrap_err().name(), "TypeError");
    assert_eq!(cursor.advance(-1.0).unwrap_err().name(), "TypeError");
    cursor.advance(3.0).unwrap();
    engine.next_event().unwrap();
    assert_eq!(cursor.key(), Some(Key::from(4)));

    cursor.advance(5.0).unwrap();
    engine.next_event().unwrap();
    assert_eq!(request.result().unwrap(), Outcome::Null);
    assert_eq!(cursor.key(), None);
    drain(&engine);
}

#[test]
fn cursor_update_and_delete_write_through() {
    let engine = Engine::new();
    let db = numbered(&engine);
    let txn = transaction(&db, &["s"], TransactionMode::ReadWrite);
    let request = txn.object_store("s").unwrap().open_cursor(Query::All, CursorDirection::Next).unwrap();

    let mut writes = Vec::new();
    while let Some(event) = engine.next_event() {
        if !is_success_of(&event, &request) {
            continue;
        }
        let Some(cursor) = request.cursor() else { continue };
        match cursor.key() {
            Some(k) if k == Key::from(2) => writes.push(cursor.update(&StructuredValue::from("two")).unwrap()),
            Some(k) if k == Key::from(4) => writes.push(cursor.delete().unwrap()),
            _ => {}
        }
        cursor.continue_(None).unwrap();
    }
    assert!(writes.iter().all(|w| matches!(w.error(), Ok(None))));
    assert_eq!(writes[0].result().unwrap(), Outcome::Key(Key::from(2)));
    assert_eq!(writes[1].result().unwrap(), Outcome::Undefined);

    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let all = txn.object_store("s").unwrap().get_all(Query::All, None).unwrap();
    drain(&engine);
    let expected: Vec<StructuredValue> = ["v1", "two", "v3", "v5"].into_iter().map(StructuredValue::from).collect();
    assert_eq!(outcome(&all), Outcome::Values(expected));
}

#[test]
fn cursor_modification_errors() {
    let engine = Engine::new();
    let db = numbered(&engine);

    let txn = transaction(&db, &["s"], TransactionMode::ReadOnly);
    let request = txn.object_store("s").unwrap().open_cursor(Query::All, CursorDirection::Next).unwrap();
    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.update(&StructuredValue::from(1.0)).unwrap_err().name(), "ReadOnlyError");
    assert_eq!(cursor.delete().unwrap_err().name(), "ReadOnlyError");
    drain(&engine);
    // The transaction has finished.
    assert_eq!(cursor.continue_(None).unwrap_err().name(), "TransactionInactiveError");

    let txn = transaction(&db, &["s"], TransactionMode::ReadWrite);
    let request = txn.object_store("s").unwrap().open_key_cursor(Query::All, CursorDirection::Next).unwrap();
    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.delete().unwrap_err().name(), "InvalidStateError");
    assert_eq!(cursor.continue_primary_key(Key::from(1), Key::from(1)).unwrap_err().name(), "InvalidAccessError");
    drain(&engine);
}

#[test]
fn update_rejects_a_changed_inline_key() {
    let engine = Engine::new();
    let db = tagged_store(&engine);
    let txn = transaction(&db, &["items"], TransactionMode::ReadWrite);
    let request = txn.object_store("items").unwrap().open_cursor(Query::All, CursorDirection::Next).unwrap();
    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.update(&tagged("z", 99)).unwrap_err().name(), "DataError");
    cursor.update(&tagged("z", 1)).unwrap();
    drain(&engine);
}

#[test]
fn index_cursor_directions() {
    let engine = Engine::new();
    let db = tagged_store(&engine);
    let cases = [
        (CursorDirection::Next, vec![("a", 1), ("a", 3), ("b", 2), ("b", 5), ("c", 4)]),
        (CursorDirection::NextUnique, vec![("a", 1), ("b", 2), ("c", 4)]),
        (CursorDirection::Prev, vec![("c", 4), ("b", 5), ("b", 2), ("a", 3), ("a", 1)]),
        (CursorDirection::PrevUnique, vec![("c", 4), ("b", 2), ("a", 1)]),
    ];
    for (direction, expected) in cases {
        let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
        let index = txn.object_store("items").unwrap().index("tag").unwrap();
        let request = index.open_cursor(Query::All, direction).unwrap();
        let expected: Vec<(Key, Key)> = expected.into_iter().map(|(t, n)| (Key::from(t), Key::from(n))).collect();
        assert_eq!(collect_cursor(&engine, &request), expected, "{direction}");
    }
}

#[test]
fn continue_primary_key_on_index_cursor() {
    let engine = Engine::new();
    let db = tagged_store(&engine);
    let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
    let index = txn.object_store("items").unwrap().index("tag").unwrap();
    let request = index.open_cursor(Query::All, CursorDirection::Next).unwrap();

    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(
        cursor.continue_primary_key(Key::from("a"), Key::from(1)).unwrap_err().name(),
        "DataError"
    );
    cursor.continue_primary_key(Key::from("b"), Key::from(3)).unwrap();
    engine.next_event().unwrap();
    assert_eq!(cursor.key(), Some(Key::from("b")));
    assert_eq!(cursor.primary_key(), Some(Key::from(5)));
    drain(&engine);

    let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
    let index = txn.object_store("items").unwrap().index("tag").unwrap();
    let request = index.open_cursor(Query::All, CursorDirection::NextUnique).unwrap();
    engine.next_event().unwrap();
    let cursor = request.cursor().unwrap();
    assert_eq!(
        cursor.continue_primary_key(Key::from("b"), Key::from(2)).unwrap_err().name(),
        "InvalidAccessError"
    );
    drain(&engine);
}

#[test]
fn index_reads_resolve_through_index_keys() {
    let engine = Engine::new();
    let db = tagged_store(&engine);
    let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
    let index = txn.object_store("items").unwrap().index("tag").unwrap();
    let first_b = index.get_key(Key::from("b")).unwrap();
    let all_a = index.get_all_keys(Key::from("a"), None).unwrap();
    let count = index.count(KeyRange::bound(Key::from("a"), Key::from("b"), false, false).unwrap()).unwrap();
    let missing = index.get(Key::from("zzz")).unwrap();
    drain(&engine);

    assert_eq!(outcome(&first_b), Outcome::Key(Key::from(2)));
    assert_eq!(outcome(&all_a), Outcome::Keys(vec![Key::from(1), Key::from(3)]));
    assert_eq!(outcome(&count), Outcome::Count(4));
    assert_eq!(outcome(&missing), Outcome::Undefined);
}

#[test]
fn finished_transaction_wins_over_deleted_index() {
    let engine = Engine::new();
    let request = engine.open("db", Some(1)).unwrap();
    let mut cursor_request = None;
    let mut kept = None;
    while let Some(event) = engine.next_event() {
        match &event {
            Event::UpgradeNeeded { connection, .. } => {
                let store = connection
                    .create_object_store("items", ObjectStoreParameters::new().key_path("id"))
                    .unwrap();
                let index = store.create_index("tag", "tag", IndexParameters::new()).unwrap();
                store.put(&tagged("a", 1), None).unwrap();
                store.put(&tagged("a", 2), None).unwrap();
                cursor_request = Some(index.open_cursor(Query::All, CursorDirection::Next).unwrap());
            }
            Event::Success { request } if Some(request) == cursor_request.as_ref() => {
                let cursor = request.cursor().unwrap();
                let store = request.transaction().unwrap().object_store("items").unwrap();
                store.delete_index("tag").unwrap();
                let err = cursor.continue_primary_key(Key::from("a"), Key::from(2)).unwrap_err();
                assert_eq!(err.name(), "InvalidStateError");
                kept = Some(cursor);
            }
            _ => {}
        }
    }
    assert!(request.connection().is_some());

    let cursor = kept.unwrap();
    let err = cursor.continue_primary_key(Key::from("a"), Key::from(2)).unwrap_err();
    assert_eq!(err.name(), "TransactionInactiveError");
}

#[test]
fn cursor_reads_back_an_out_of_line_record() {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "db", &["store"]);
    seed(&engine, &db, "store", &[(Key::from("key"), StructuredValue::from("value"))]);

    let txn = transaction(&db, &["store"], TransactionMode::ReadOnly);
    let request = txn.object_store("store").unwrap().open_cursor(Query::All, CursorDirection::Next).unwrap();
    let Some(event) = engine.next_event() else {
        panic!("expected the cursor's first success");
    };
    assert!(is_success_of(&event, &request));
    let cursor = request.cursor().unwrap();
    assert_eq!(cursor.value(), Some(StructuredValue::from("value")));
    assert_eq!(engine.cmp(&cursor.key().unwrap(), &Key::from("key")).unwrap(), 0);
    drain(&engine);
}

/// A record `{ id, tags }` whose `tags` comes from `build`.
fn with_tags(n: i32, build: impl FnOnce(&mut Heap) -> Value) -> StructuredValue {
    let mut heap = Heap::new();
    let tags = build(&mut heap);
    let root = heap.object([("id", Value::from(n)), ("tags", tags)]);
    StructuredValue::new(heap, root)
}

/// Store `items` keyed on `id` with a multiEntry `tags` index.
fn multi_entry_store(engine: &Engine) -> Connection {
    let db = open_db(engine, "labels", 1, |db, _| {
        let store = db
            .create_object_store("items", ObjectStoreParameters::new().key_path("id"))
            .unwrap();
        store.create_index("tags", "tags", IndexParameters::new().multi_entry(true)).unwrap();
    });
    let txn = transaction(&db, &["items"], TransactionMode::ReadWrite);
    let store = txn.object_store("items").unwrap();
    let records = [
        with_tags(1, |h| h.array([Value::from("a"), Value::from("b")])),
        with_tags(2, |h| h.array([Value::from("c"), Value::from("b"), Value::from("b")])),
        with_tags(3, |_| Value::from("c")),
        with_tags(4, |h| h.object::<&str>([])),
    ];
    for record in &records {
        store.put(record, None).unwrap();
    }
    assert_eq!(drain(engine).last(), Some(&"complete"));
    db
}

#[test]
fn multi_entry_index_has_one_entry_per_element() {
    let engine = Engine::new();
    let db = multi_entry_store(&engine);
    let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
    let index = txn.object_store("items").unwrap().index("tags").unwrap();
    let request = index.open_cursor(Query::All, CursorDirection::Next).unwrap();
    let tagged_b = index.get_all_keys(Key::from("b"), None).unwrap();
    let count = index.count(Query::All).unwrap();

    let seen = collect_cursor(&engine, &request);
    let expected: Vec<(Key, Key)> = [("a", 1), ("b", 1), ("b", 2), ("c", 2), ("c", 3)]
        .into_iter()
        .map(|(tag, n)| (Key::from(tag), Key::from(n)))
        .collect();
    assert_eq!(seen, expected);
    assert_eq!(outcome(&tagged_b), Outcome::Keys(vec![Key::from(1), Key::from(2)]));
    assert_eq!(outcome(&count), Outcome::Count(5));
}

#[test]
fn invalid_multi_entry_element_fails_the_put() {
    let engine = Engine::new();
    let db = multi_entry_store(&engine);
    let txn = transaction(&db, &["items"], TransactionMode::ReadWrite);
    let store = txn.object_store("items").unwrap();
    let put = store
        .put(&with_tags(5, |h| h.array([Value::from("a"), Value::Null])), None)
        .unwrap();
    assert_eq!(drain(&engine), vec!["error", "abort"]);
    assert_eq!(failure(&put).name(), "DataError");

    let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
    let store = txn.object_store("items").unwrap();
    let count = store.index("tags").unwrap().count(Key::from("a")).unwrap();
    let missing = store.get(5).unwrap();
    drain(&engine);
    assert_eq!(outcome(&count), Outcome::Count(1));
    assert_eq!(outcome(&missing), Outcome::Undefined);
}

#[test]
fn exhausted_index_cursor_has_no_primary_key() {
    let engine = Engine::new();
    let db = multi_entry_store(&engine);
    let txn = transaction(&db, &["items"], TransactionMode::ReadOnly);
    let index = txn.object_store("items").unwrap().index("tags").unwrap();
    let request = index.open_cursor(Key::from("a"), CursorDirection::Next).unwrap();

    let mut last = None;
    while let Some(event) = engine.next_event() {
        if !is_success_of(&event, &request) {
            continue;
        }
        if let Some(cursor) = request.cursor() {
            assert_eq!(cursor.primary_key(), Some(Key::from(1)));
            cursor.continue_(None).unwrap();
            last = Some(cursor);
        }
    }
    let cursor = last.expect("cursor was positioned once");
    assert_eq!(request.result().unwrap(), Outcome::Null);
    assert_eq!(cursor.key(), None);
    assert_eq!(cursor.primary_key(), None);
    assert_eq!(cursor.value(), None);
}
