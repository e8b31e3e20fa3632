use std::collections::{HashMap, VecDeque};
use std::iter::FusedIterator;
use std::sync::Arc;

use bson::Bson;
use rowflow_source::{AsyncRowSource, Row, RowSource};

use crate::binding::ColumnBinding;
use crate::error::BindError;
use crate::field_map::FieldMap;
use crate::ordinal::{resolve_matching, resolve_ordinals};
use crate::shape::Shape;
use crate::value::{normalize, normalize_row};

/// Rows of one result set together with the columns they carry.
///
/// `names[i]` is the display name of the value at `ordinals[i]` in the
/// source; every row holds one value per entry, in that order.
#[derive(Debug)]
pub struct QueryResult<R> {
    ordinals: Vec<usize>,
    names: Vec<String>,
    rows: R,
}

impl<R> QueryResult<R> {
    pub fn new(ordinals: Vec<usize>, names: Vec<String>, rows: R) -> Result<Self, BindError> {
        if ordinals.len() != names.len() {
            return Err(BindError::Usage(format!(
                "{} ordinals but {} column names",
                ordinals.len(),
                names.len()
            )));
        }
        Ok(Self {
            ordinals,
            names,
            rows,
        })
    }

    pub fn ordinals(&self) -> &[usize] {
        &self.ordinals
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &R {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut R {
        &mut self.rows
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<String>, R) {
        (self.ordinals, self.names, self.rows)
    }
}

/// A result set drained into memory.
pub type BufferedResult = QueryResult<VecDeque<Row>>;

impl BufferedResult {
    /// Remove and return the oldest row, nulls kept as `Bson::Null`.
    pub fn dequeue(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Remove and return the oldest row with nulls mapped to `None`.
    pub fn dequeue_normalized(&mut self) -> Option<Vec<Option<Bson>>> {
        self.rows.pop_front().map(normalize_row)
    }

    /// Iterator that dequeues as it goes. Rows not pulled stay buffered.
    pub fn drain_rows(&mut self) -> DrainRows<'_> {
        DrainRows {
            rows: &mut self.rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the buffer as typed records, binding `map` against this
    /// result's column names.
    pub fn into_records<T: Shape>(self, map: Arc<FieldMap<T>>) -> DequeueRecords<T> {
        let binding = ColumnBinding::bind(&map, &self.names);
        DequeueRecords {
            rows: self.rows,
            binding,
        }
    }
}

pub struct DrainRows<'a> {
    rows: &'a mut VecDeque<Row>,
}

impl Iterator for DrainRows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

impl ExactSizeIterator for DrainRows<'_> {}
impl FusedIterator for DrainRows<'_> {}

/// Typed records pulled from a drained buffer, one row per item.
///
/// A row that fails to materialize yields its error; the next call moves on
/// to the following row.
pub struct DequeueRecords<T> {
    rows: VecDeque<Row>,
    binding: ColumnBinding<T>,
}

impl<T> DequeueRecords<T> {
    pub fn binding(&self) -> &ColumnBinding<T> {
        &self.binding
    }
}

impl<T: Shape> Iterator for DequeueRecords<T> {
    type Item = Result<T, BindError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.pop_front()?;
        Some(self.binding.materialize(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

impl<T: Shape> ExactSizeIterator for DequeueRecords<T> {}
impl<T: Shape> FusedIterator for DequeueRecords<T> {}

/// Which columns a retrieval captures.
#[derive(Debug, Clone, Copy)]
pub enum Columns<'a> {
    /// Every column, in layout order.
    All,
    /// Explicit positions, named after the source's columns.
    Ordinals(&'a [usize]),
    /// Named columns, resolved strictly. `sort` orders them by position.
    Names { names: &'a [&'a str], sort: bool },
}

impl Columns<'_> {
    /// Resolve against `source`'s layout into parallel ordinals and names.
    ///
    /// Nothing is read, so a strict mismatch leaves the source untouched.
    pub fn resolve<S: RowSource + ?Sized>(
        self,
        source: &S,
    ) -> Result<(Vec<usize>, Vec<String>), BindError> {
        match self {
            Columns::All => {
                let names = source.names()?;
                Ok(((0..names.len()).collect(), names))
            }
            Columns::Ordinals(ordinals) => {
                let names = ordinals
                    .iter()
                    .map(|&o| source.name(o).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((ordinals.to_vec(), names))
            }
            Columns::Names { names, sort } => {
                let resolved = resolve_ordinals(&source.names()?, names, sort)?;
                Ok(resolved.into_iter().map(|c| (c.ordinal, c.name)).unzip())
            }
        }
    }
}

/// Drain `source` into memory.
///
/// Columns are resolved before the first read, so a strict mismatch fails
/// without consuming anything. Once this returns the source is exhausted
/// and can be dropped.
pub fn retrieve<S: RowSource + ?Sized>(
    source: &mut S,
    columns: Columns<'_>,
) -> Result<BufferedResult, BindError> {
    let (ordinals, names) = columns.resolve(source)?;
    let mut rows = VecDeque::new();
    while source.read()? {
        rows.push_back(source.values_at(&ordinals)?);
    }
    QueryResult::new(ordinals, names, rows)
}

pub async fn retrieve_async<S: AsyncRowSource>(
    source: &mut S,
    columns: Columns<'_>,
) -> Result<BufferedResult, BindError> {
    let (ordinals, names) = columns.resolve(source)?;
    let mut rows = VecDeque::new();
    while source.read_async().await? {
        rows.push_back(source.values_at(&ordinals)?);
    }
    QueryResult::new(ordinals, names, rows)
}

/// Source positions of the map's columns, in layout order.
fn map_ordinals<T, S: RowSource + ?Sized>(
    source: &S,
    map: &FieldMap<T>,
) -> Result<Vec<usize>, BindError> {
    let wanted: Vec<&str> = map.columns().collect();
    let resolved = resolve_matching(&source.names()?, &wanted, true)?;
    Ok(resolved.into_iter().map(|c| c.ordinal).collect())
}

/// Drain `source` and return its rows as records of `T`.
///
/// Only the columns `map` knows about are kept; map columns the source
/// lacks leave their fields at the default.
pub fn results<T: Shape, S: RowSource + ?Sized>(
    source: &mut S,
    map: Arc<FieldMap<T>>,
) -> Result<DequeueRecords<T>, BindError> {
    let ordinals = map_ordinals(source, &map)?;
    let buffered = retrieve(source, Columns::Ordinals(&ordinals))?;
    Ok(buffered.into_records(map))
}

pub async fn results_async<T: Shape, S: AsyncRowSource>(
    source: &mut S,
    map: Arc<FieldMap<T>>,
) -> Result<DequeueRecords<T>, BindError> {
    let ordinals = map_ordinals(source, &map)?;
    let buffered = retrieve_async(source, Columns::Ordinals(&ordinals)).await?;
    Ok(buffered.into_records(map))
}

/// Values of the first column of every row, nulls mapped to `None`.
pub fn first_column<S: RowSource + ?Sized>(
    source: &mut S,
) -> Result<Vec<Option<Bson>>, BindError> {
    let buffered = retrieve(source, Columns::Ordinals(&[0]))?;
    Ok(first_values(buffered))
}

pub async fn first_column_async<S: AsyncRowSource>(
    source: &mut S,
) -> Result<Vec<Option<Bson>>, BindError> {
    let buffered = retrieve_async(source, Columns::Ordinals(&[0])).await?;
    Ok(first_values(buffered))
}

fn first_values(buffered: BufferedResult) -> Vec<Option<Bson>> {
    let (_, _, rows) = buffered.into_parts();
    rows.into_iter()
        .map(|row| row.into_iter().next().and_then(normalize))
        .collect()
}

/// The current row as a name → value map, nulls mapped to `None`.
///
/// An empty `names` selects every column. Otherwise only the named columns
/// are included, matched case-insensitively and keyed by the source's
/// spelling; names the source lacks are skipped.
pub fn row_map<S: RowSource + ?Sized>(
    source: &S,
    names: &[&str],
) -> Result<HashMap<String, Option<Bson>>, BindError> {
    let actual = source.names()?;
    let selected: Vec<(usize, String)> = if names.is_empty() {
        actual.into_iter().enumerate().collect()
    } else {
        resolve_matching(&actual, names, true)?
            .into_iter()
            .map(|c| (c.ordinal, c.name))
            .collect()
    };

    let mut map = HashMap::with_capacity(selected.len());
    for (i, name) in selected {
        map.insert(name, normalize(source.value(i)?));
    }
    Ok(map)
}

/// Advance `source` for as long as `predicate` accepts the current row.
///
/// Stops at the first rejected row (which stays current) or at the end.
pub fn iterate_while<S, F>(source: &mut S, mut predicate: F) -> Result<(), BindError>
where
    S: RowSource + ?Sized,
    F: FnMut(&S) -> bool,
{
    while source.read()? && predicate(source) {}
    Ok(())
}
