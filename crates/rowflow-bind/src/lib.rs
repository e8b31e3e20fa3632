mod binding;
mod error;
mod field_map;
mod materialize;
mod ordinal;
mod retrieve;
mod shape;
mod value;

pub use bson::Bson;
pub use rowflow_source::Row;

pub use binding::ColumnBinding;
pub use error::BindError;
pub use field_map::FieldMap;
pub use materialize::Materializer;
pub use ordinal::{ColumnOrdinal, find_ordinal, ordinal_mapping, resolve_matching, resolve_ordinals};
pub use retrieve::{
    BufferedResult, Columns, DequeueRecords, DrainRows, QueryResult, first_column,
    first_column_async, iterate_while, results, results_async, retrieve, retrieve_async, row_map,
};
pub use shape::{BoxError, FieldDef, Setter, Shape};
pub use value::{from_value, normalize, normalize_row, null_to_sentinel};
