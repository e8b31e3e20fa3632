#![cfg(feature = "memory")]

use std::time::Duration;

use rowflow_source::{AsyncRowSource, Bson, MemorySource, RowSource, SourceError};

fn accounts() -> MemorySource {
    MemorySource::new(
        ["id", "Name", "status"],
        vec![
            vec![Bson::Int32(1), Bson::String("Acme".into()), Bson::Null],
            vec![Bson::Int32(2), Bson::String("Globex".into()), Bson::String("active".into())],
        ],
    )
}

#[test]
fn read_walks_rows_then_reports_end() {
    let mut source = accounts();
    assert!(source.read().unwrap());
    assert_eq!(source.value(0).unwrap(), Bson::Int32(1));
    assert!(source.read().unwrap());
    assert_eq!(source.value(1).unwrap(), Bson::String("Globex".into()));
    assert!(!source.read().unwrap());
    assert!(!source.read().unwrap());
    assert_eq!(source.reads(), 4);
}

#[test]
fn value_before_first_read_fails() {
    let source = accounts();
    assert_eq!(source.value(0).unwrap_err(), SourceError::NoCurrentRow);
}

#[test]
fn value_after_end_fails() {
    let mut source = accounts();
    while source.read().unwrap() {}
    assert_eq!(source.value(0).unwrap_err(), SourceError::NoCurrentRow);
}

#[test]
fn values_keep_null_sentinel() {
    let mut source = accounts();
    source.read().unwrap();
    assert_eq!(
        source.values().unwrap(),
        vec![Bson::Int32(1), Bson::String("Acme".into()), Bson::Null]
    );
}

#[test]
fn values_at_follows_requested_order() {
    let mut source = accounts();
    source.read().unwrap();
    assert_eq!(
        source.values_at(&[2, 0]).unwrap(),
        vec![Bson::Null, Bson::Int32(1)]
    );
}

#[test]
fn ordinal_prefers_exact_then_case_insensitive() {
    let source = MemorySource::new(["name", "NAME", "Status"], vec![]);
    assert_eq!(source.ordinal("NAME").unwrap(), 1);
    assert_eq!(source.ordinal("name").unwrap(), 0);
    assert_eq!(source.ordinal("status").unwrap(), 2);
    assert_eq!(
        source.ordinal("missing").unwrap_err(),
        SourceError::ColumnNotFound("missing".into())
    );
}

#[test]
fn names_and_out_of_range() {
    let source = accounts();
    assert_eq!(source.names().unwrap(), vec!["id", "Name", "status"]);
    assert_eq!(source.field_count(), 3);
    assert_eq!(
        source.name(3).unwrap_err(),
        SourceError::OrdinalOutOfRange(3)
    );
}

#[test]
fn injected_failure_hits_the_requested_read() {
    let mut source = accounts().fail_on_read(2, "connection reset");
    assert!(source.read().unwrap());
    let err = source.read().unwrap_err();
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn read_async_honours_delay() {
    let mut source = accounts().read_delay(Duration::from_millis(5));
    let started = std::time::Instant::now();
    assert!(source.read_async().await.unwrap());
    assert!(source.read_async().await.unwrap());
    assert!(!source.read_async().await.unwrap());
    assert!(started.elapsed() >= Duration::from_millis(15));
    assert_eq!(source.reads(), 3);
}
