mod common;
use common::*;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rowflow_bind::{BindError, Bson, Columns, FieldMap, Row};
use rowflow_source::MemorySource;
use rowflow_stage::{StageBuilder, StageError, StageState, link, stream, stream_async};
use tokio::time::timeout;

/// Accounts behind extra columns, in a layout that differs from `COLUMNS`.
fn wide_accounts(n: i32) -> MemorySource {
    let rows = (1..=n)
        .map(|i| {
            vec![
                Bson::String("emea".into()),
                Bson::String(format!("account-{i}")),
                Bson::Null,
                Bson::Int32(i),
            ]
        })
        .collect();
    MemorySource::new(["region", "Name", "note", "ID"], rows)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_projects_named_columns() {
    let result = stream(
        wide_accounts(3),
        Columns::Names {
            names: &["id", "name"],
            sort: false,
        },
        StageBuilder::raw(),
    )
    .unwrap();
    assert_eq!(result.ordinals(), &[3, 1]);
    assert_eq!(result.names(), &["id".to_string(), "name".to_string()]);

    let (_, _, (stage, records)) = result.into_parts();
    let rows: Vec<Row> = records.map(Result::unwrap).collect().await;
    assert_eq!(rows, (1..=3).map(account_row).collect::<Vec<_>>());
    assert_eq!(stage.completion().await, StageState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_sorts_by_ordinal_on_request() {
    let result = stream(
        wide_accounts(1),
        Columns::Names {
            names: &["id", "region"],
            sort: true,
        },
        StageBuilder::raw(),
    )
    .unwrap();
    assert_eq!(result.ordinals(), &[0, 3]);
    assert_eq!(result.names(), &["region".to_string(), "id".to_string()]);

    let (_, _, (_, mut records)) = result.into_parts();
    assert_eq!(
        records.recv_async().await.unwrap().unwrap(),
        vec![Bson::String("emea".into()), Bson::Int32(1)]
    );
    assert!(records.recv_async().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_rejects_unknown_columns_before_reading() {
    let err = stream(
        wide_accounts(3),
        Columns::Names {
            names: &["id", "missing2", "missing1"],
            sort: false,
        },
        StageBuilder::raw(),
    )
    .unwrap_err();
    match err {
        StageError::Bind(BindError::SchemaMismatch { missing }) => {
            assert_eq!(missing, vec!["missing1".to_string(), "missing2".to_string()]);
        }
        other => panic!("expected schema mismatch, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_columns_link_into_records() {
    let result = stream_async(
        wide_accounts(50).read_delay(Duration::from_millis(1)),
        Columns::Names {
            names: &["ID", "Name"],
            sort: false,
        },
        StageBuilder::raw().capacity(1),
    )
    .unwrap();
    let (_, mut records) = link(
        result,
        StageBuilder::records(Arc::new(FieldMap::<Account>::new())).capacity(1),
    )
    .unwrap();

    let mut got = Vec::new();
    while let Some(record) = timeout(PATIENCE, records.recv_async()).await.unwrap() {
        got.push(record.unwrap());
    }
    assert_eq!(ids(&got), (1..=50).collect::<Vec<_>>());
    assert_eq!(got[0].name, "account-1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completing_downstream_stops_the_stream() {
    let result = stream(
        wide_accounts(100_000),
        Columns::Ordinals(&[3, 1]),
        StageBuilder::raw().capacity(2),
    )
    .unwrap();
    assert_eq!(result.names(), &["ID".to_string(), "Name".to_string()]);
    let upstream = result.rows().0.clone();
    let (downstream, mut records) = link(
        result,
        StageBuilder::records(Arc::new(FieldMap::<Account>::new())).capacity(2),
    )
    .unwrap();

    assert_eq!(records.recv_async().await.unwrap().unwrap().id, 1);
    downstream.complete();

    assert_eq!(
        timeout(PATIENCE, upstream.completion()).await.unwrap(),
        StageState::Completed
    );
    assert!(upstream.accepted() < 100_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_source_error_faults_the_stream() {
    let result = stream_async(
        wide_accounts(10).fail_on_read(2, "connection reset"),
        Columns::All,
        StageBuilder::raw(),
    )
    .unwrap();
    let (_, _, (stage, records)) = result.into_parts();
    let items: Vec<_> = timeout(PATIENCE, records.collect::<Vec<_>>()).await.unwrap();
    match items.last() {
        Some(Err(StageError::Faulted(message))) => assert!(message.contains("connection reset")),
        other => panic!("expected fault, got {other:?}"),
    }
    assert!(items.len() <= 2);
    assert_eq!(stage.completion().await, StageState::Faulted);
}

#[test]
fn stream_outside_runtime_is_usage_error() {
    let err = stream(wide_accounts(1), Columns::All, StageBuilder::raw()).unwrap_err();
    assert!(matches!(err, StageError::Usage(_)));
}
