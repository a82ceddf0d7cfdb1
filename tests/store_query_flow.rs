use chrono::NaiveDate;
use serde_json::json;
use staffdesk_core::db::Database;
use staffdesk_core::{
    calendar, configure_blob_store, get_instance, query, Predicate, RecordDraft, RecordKind,
    RecordStore, SortKey,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn draft(date: NaiveDate, fields: &[(&str, serde_json::Value)]) -> RecordDraft {
    RecordDraft {
        date,
        fields: fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    }
}

#[test]
fn sqlite_backed_store_feeds_queries_and_calendars() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("staffdesk.db");
    configure_blob_store(Arc::new(Database::new(&db_path).expect("open db"))).expect("configure");

    let store = get_instance(RecordKind::Leave).expect("store");
    for (date, status, department) in [
        (day(2025, 9, 3), "approved", "engineering"),
        (day(2025, 9, 8), "pending", "engineering"),
        (day(2025, 9, 15), "approved", "finance"),
        (day(2025, 9, 20), "approved", "engineering"),
        (day(2025, 10, 1), "approved", "finance"),
    ] {
        store
            .add(draft(
                date,
                &[("status", json!(status)), ("department", json!(department))],
            ))
            .expect("add");
    }

    // List view: approved engineering leave, oldest first, two per page.
    let predicates = vec![
        Predicate::field_equals("status", "approved"),
        Predicate::field_equals("department", "engineering"),
    ];
    let page = query::query(
        store.records().expect("records"),
        &predicates,
        &SortKey::DateAsc,
        1,
        2,
    )
    .expect("query");
    assert_eq!(page.total_items, 2);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.items[0].date, day(2025, 9, 3));
    assert_eq!(page.items[1].date, day(2025, 9, 20));

    // Calendar view: only September records land in day cells.
    let cells =
        calendar::build_month_grid(2025, 9, &store.records().expect("records")).expect("grid");
    assert_eq!(cells.len() % 7, 0);
    let placed: usize = cells.iter().map(|cell| cell.records.len()).sum();
    assert_eq!(placed, 4);

    // The same kind resolves to the same singleton.
    let again = get_instance(RecordKind::Leave).expect("store");
    assert!(Arc::ptr_eq(&store, &again));

    // A fresh store over the same database sees the persisted snapshot.
    let reopened = RecordStore::new(
        RecordKind::Leave,
        Arc::new(Database::new(&db_path).expect("reopen db")),
    );
    assert_eq!(
        reopened.records().expect("records"),
        store.records().expect("records")
    );
}

#[test]
fn crud_round_trip_with_pagination_coverage() {
    let store = get_instance(RecordKind::Task).expect("store");

    let mut ids = Vec::new();
    for index in 0..7 {
        let record = store
            .add(draft(
                day(2025, 11, 1 + index),
                &[("title", json!(format!("task {}", index)))],
            ))
            .expect("add");
        ids.push(record.id);
    }

    let mut patch = BTreeMap::new();
    patch.insert("title".to_string(), json!("rewritten"));
    store.update(&ids[2], patch).expect("update");
    store.remove(&ids[5]).expect("remove");

    let records = store.records().expect("records");
    let first = query::query(records.clone(), &[], &SortKey::DateAsc, 1, 4).expect("query");
    assert_eq!(first.total_items, 6);
    assert_eq!(first.total_pages, 2);

    let mut collected = Vec::new();
    for page_number in 1..=first.total_pages {
        let page =
            query::query(records.clone(), &[], &SortKey::DateAsc, page_number, 4).expect("query");
        collected.extend(page.items);
    }
    assert_eq!(collected.len(), 6);
    assert_eq!(
        collected.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>()
    );
    assert!(collected.iter().all(|record| record.id != ids[5]));
}
