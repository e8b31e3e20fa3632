use bson::Bson;
use rowflow_source::Row;
use serde::de::DeserializeOwned;

use crate::shape::BoxError;

/// Map the source's null marker to `None`; every other value passes through.
pub fn normalize(value: Bson) -> Option<Bson> {
    match value {
        Bson::Null => None,
        other => Some(other),
    }
}

pub fn normalize_row(row: Row) -> Vec<Option<Bson>> {
    row.into_iter().map(normalize).collect()
}

pub fn null_to_sentinel(value: Option<Bson>) -> Bson {
    value.unwrap_or(Bson::Null)
}

/// Convert a normalized column value into a field value.
///
/// `None` only converts into fields that accept null (`Option<_>`, `()`).
pub fn from_value<V: DeserializeOwned>(value: Option<Bson>) -> Result<V, BoxError> {
    Ok(bson::deserialize_from_bson(null_to_sentinel(value))?)
}
