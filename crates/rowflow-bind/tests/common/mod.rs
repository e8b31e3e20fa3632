#![allow(dead_code)]

use rowflow_bind::{Bson, Row};
use rowflow_source::MemorySource;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Account {
    pub id: i32,
    pub name: String,
}

rowflow_bind::shape!(Account { id, name });

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub revenue: Option<f64>,
}

rowflow_bind::shape!(Customer {
    id,
    name,
    status,
    revenue,
});

pub fn s(v: &str) -> Bson {
    Bson::String(v.into())
}

pub fn source(columns: &[&str], rows: Vec<Row>) -> MemorySource {
    MemorySource::new(columns.iter().copied(), rows)
}

/// The two-row `id`/`name` result set.
pub fn two_accounts() -> MemorySource {
    source(
        &["id", "name"],
        vec![vec![Bson::Int32(1), s("a")], vec![Bson::Int32(2), s("b")]],
    )
}

/// Five customers with a mix of nulls, in a layout that differs from
/// `Customer`'s field order.
pub fn customers() -> MemorySource {
    source(
        &["status", "ID", "Name", "revenue", "region"],
        vec![
            vec![s("active"), Bson::Int64(1), s("Acme Corp"), Bson::Double(50000.0), s("us")],
            vec![s("snoozed"), Bson::Int64(2), s("Globex"), Bson::Null, s("eu")],
            vec![Bson::Null, Bson::Int64(3), s("Initech"), Bson::Double(12000.0), Bson::Null],
            vec![s("active"), Bson::Int64(4), Bson::Null, Bson::Double(95000.0), s("us")],
            vec![s("active"), Bson::Int64(5), s("Stark"), Bson::Double(200000.0), s("apac")],
        ],
    )
}
