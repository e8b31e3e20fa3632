#![allow(dead_code)]

use std::time::Duration;

use rowflow_bind::Bson;
use rowflow_source::MemorySource;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Account {
    pub id: i32,
    pub name: String,
}

rowflow_bind::shape!(Account { id, name });

pub const COLUMNS: [&str; 2] = ["id", "name"];

/// `n` accounts with ids `1..=n`.
pub fn accounts(n: i32) -> MemorySource {
    let rows = (1..=n)
        .map(|i| vec![Bson::Int32(i), Bson::String(format!("account-{i}"))])
        .collect();
    MemorySource::new(COLUMNS, rows)
}

pub fn account_row(id: i32) -> Vec<Bson> {
    vec![Bson::Int32(id), Bson::String(format!("account-{id}"))]
}

pub fn ids(records: &[Account]) -> Vec<i32> {
    records.iter().map(|a| a.id).collect()
}

/// Upper bound for anything a test waits on.
pub const PATIENCE: Duration = Duration::from_secs(5);
