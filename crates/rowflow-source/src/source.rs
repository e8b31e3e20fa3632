use std::future::Future;

use bson::Bson;

use crate::error::SourceError;

/// One row of untyped column values, in layout order.
///
/// `Bson::Null` is the source's "no data" marker; it is kept as-is until a
/// caller explicitly normalizes it.
pub type Row = Vec<Bson>;

/// A forward-only cursor over one result set.
///
/// Only one reader may drive a source at a time; every method that advances
/// takes `&mut self`.
pub trait RowSource {
    /// Advance to the next row. Returns `false` once the result set is exhausted.
    fn read(&mut self) -> Result<bool, SourceError>;

    fn field_count(&self) -> usize;

    fn name(&self, ordinal: usize) -> Result<&str, SourceError>;

    /// Resolve a column name to its position.
    ///
    /// An exact match wins; otherwise the first case-insensitive match is
    /// used. Fails with [`SourceError::ColumnNotFound`] when neither exists.
    fn ordinal(&self, name: &str) -> Result<usize, SourceError>;

    /// Value of the current row at `ordinal`.
    fn value(&self, ordinal: usize) -> Result<Bson, SourceError>;

    fn names(&self) -> Result<Vec<String>, SourceError> {
        (0..self.field_count())
            .map(|i| self.name(i).map(str::to_string))
            .collect()
    }

    /// Copy every value of the current row.
    fn values(&self) -> Result<Row, SourceError> {
        (0..self.field_count()).map(|i| self.value(i)).collect()
    }

    /// Copy the values at `ordinals`, in the order given.
    fn values_at(&self, ordinals: &[usize]) -> Result<Row, SourceError> {
        ordinals.iter().map(|&i| self.value(i)).collect()
    }
}

/// A row source that can advance without blocking the calling task.
///
/// Dropping the returned future abandons the read.
pub trait AsyncRowSource: RowSource + Send {
    fn read_async(&mut self) -> impl Future<Output = Result<bool, SourceError>> + Send;
}
