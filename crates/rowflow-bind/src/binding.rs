use std::fmt;

use crate::field_map::FieldMap;
use crate::shape::Setter;

pub(crate) struct Slot<T> {
    pub field: &'static str,
    pub column: String,
    pub set: Setter<T>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            column: self.column.clone(),
            set: self.set,
        }
    }
}

/// Positional setter table for one column layout.
///
/// `slots[i]` is the setter for column `i`, or `None` when that column has
/// no field. Built once per layout and never patched; a new layout means a
/// new binding.
pub struct ColumnBinding<T> {
    columns: Vec<String>,
    pub(crate) slots: Vec<Option<Slot<T>>>,
}

impl<T> ColumnBinding<T> {
    /// Bind `columns` (in physical order) against `map`.
    ///
    /// Matching is case-insensitive. When two map entries fold to the same
    /// column, the later one gets the slot.
    pub fn bind<C: AsRef<str>>(map: &FieldMap<T>, columns: &[C]) -> Self {
        let slots = columns
            .iter()
            .map(|column| {
                let column = column.as_ref();
                map.lookup(column).map(|entry| Slot {
                    field: entry.field,
                    column: column.to_string(),
                    set: entry.set,
                })
            })
            .collect();
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            slots,
        }
    }

    /// The layout this binding was built for.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of column positions in the layout, bound or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Field bound to column `position`, if any.
    pub fn field_at(&self, position: usize) -> Option<&'static str> {
        self.slots.get(position)?.as_ref().map(|s| s.field)
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl<T> Clone for ColumnBinding<T> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            slots: self.slots.clone(),
        }
    }
}

impl<T> fmt::Debug for ColumnBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| s.as_ref().map(|s| s.field)))
            .finish()
    }
}
