use std::collections::HashMap;
use std::fmt;

use crate::error::BindError;
use crate::ordinal::fold;
use crate::shape::{Setter, Shape};

pub(crate) struct Entry<T> {
    pub field: &'static str,
    pub column: String,
    pub set: Setter<T>,
}

/// Field → column correspondence for one record shape.
///
/// Starts as the identity mapping over every field of `T`; overrides rename
/// (`Some(column)`) or exclude (`None`) fields. Column lookups are
/// case-insensitive. Immutable once built.
pub struct FieldMap<T> {
    entries: Vec<Entry<T>>,
    by_column: HashMap<String, usize>,
}

impl<T: Shape> FieldMap<T> {
    pub fn new() -> Self {
        let entries = T::fields()
            .into_iter()
            .map(|def| Entry {
                field: def.name(),
                column: def.name().to_string(),
                set: def.setter(),
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Apply `(field, column)` overrides in order; a later override for the
    /// same field replaces an earlier one.
    ///
    /// Excluding a field the shape does not have is a no-op. Renaming one is
    /// a usage error, since there is nothing to bind the column to.
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self, BindError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let defs = T::fields();
        let mut columns: Vec<Option<String>> =
            defs.iter().map(|d| Some(d.name().to_string())).collect();

        for (field, column) in overrides {
            match defs.iter().position(|d| d.name() == field) {
                Some(i) => columns[i] = column.map(str::to_string),
                None if column.is_some() => {
                    return Err(BindError::Usage(format!(
                        "override renames unknown field: {field}"
                    )));
                }
                None => {}
            }
        }

        let entries = defs
            .into_iter()
            .zip(columns)
            .filter_map(|(def, column)| {
                column.map(|column| Entry {
                    field: def.name(),
                    column,
                    set: def.setter(),
                })
            })
            .collect();
        Ok(Self::from_entries(entries))
    }
}

impl<T> FieldMap<T> {
    fn from_entries(entries: Vec<Entry<T>>) -> Self {
        // Later entries overwrite earlier ones on a case-insensitive collision.
        let by_column = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (fold(&e.column), i))
            .collect();
        Self { entries, by_column }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.field)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.column.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.field, e.column.as_str()))
    }

    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.column.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry bound to `column`, compared case-insensitively.
    pub(crate) fn lookup(&self, column: &str) -> Option<&Entry<T>> {
        self.by_column.get(&fold(column)).map(|&i| &self.entries[i])
    }
}

impl<T: Shape> Default for FieldMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FieldMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}
