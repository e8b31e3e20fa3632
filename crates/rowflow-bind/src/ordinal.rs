use std::collections::{BTreeSet, HashSet};

use rowflow_source::RowSource;

use crate::error::BindError;

/// A column name paired with its position in the source layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOrdinal {
    pub name: String,
    pub ordinal: usize,
}

impl ColumnOrdinal {
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }
}

/// Canonical form used for every case-insensitive column comparison.
pub(crate) fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn check_requested<R: AsRef<str>>(requested: &[R]) -> Result<(), BindError> {
    if requested.iter().any(|r| r.as_ref().trim().is_empty()) {
        return Err(BindError::Usage(
            "column names cannot be empty or whitespace only".into(),
        ));
    }
    Ok(())
}

/// Position of `name` in `actual`: an exact match first, then the first
/// case-insensitive one.
pub fn find_ordinal<A: AsRef<str>>(actual: &[A], name: &str) -> Option<usize> {
    actual
        .iter()
        .position(|a| a.as_ref() == name)
        .or_else(|| {
            let wanted = fold(name);
            actual.iter().position(|a| fold(a.as_ref()) == wanted)
        })
}

/// Tolerant resolution: requested names without a match are skipped.
///
/// Each requested name resolves to a single column, picked the way
/// [`find_ordinal`] picks it, and each column appears at most once. With
/// `sort` the result follows the source layout; otherwise it follows
/// `requested`. Returned names are the source's spelling.
pub fn resolve_matching<A: AsRef<str>, R: AsRef<str>>(
    actual: &[A],
    requested: &[R],
    sort: bool,
) -> Result<Vec<ColumnOrdinal>, BindError> {
    check_requested(requested)?;

    let mut seen = HashSet::with_capacity(requested.len());
    let mut resolved: Vec<ColumnOrdinal> = requested
        .iter()
        .filter_map(|r| find_ordinal(actual, r.as_ref()))
        .filter(|&i| seen.insert(i))
        .map(|i| ColumnOrdinal::new(actual[i].as_ref(), i))
        .collect();
    if sort {
        resolved.sort_by_key(|c| c.ordinal);
    }
    Ok(resolved)
}

/// Strict resolution: every requested name must exist.
///
/// On failure the error carries all unmatched names at once, sorted, so a
/// caller can fix the whole mapping in one pass. Returned names are the
/// requested spelling.
pub fn resolve_ordinals<A: AsRef<str>, R: AsRef<str>>(
    actual: &[A],
    requested: &[R],
    sort: bool,
) -> Result<Vec<ColumnOrdinal>, BindError> {
    check_requested(requested)?;

    let mut resolved = Vec::with_capacity(requested.len());
    let mut missing = BTreeSet::new();
    for r in requested {
        let r = r.as_ref();
        match find_ordinal(actual, r) {
            Some(i) => resolved.push(ColumnOrdinal::new(r, i)),
            None => {
                missing.insert(r.to_string());
            }
        }
    }

    if !missing.is_empty() {
        return Err(BindError::SchemaMismatch {
            missing: missing.into_iter().collect(),
        });
    }
    if sort {
        resolved.sort_by_key(|c| c.ordinal);
    }
    Ok(resolved)
}

/// The full layout of a source, in physical order.
pub fn ordinal_mapping<S: RowSource + ?Sized>(source: &S) -> Result<Vec<ColumnOrdinal>, BindError> {
    Ok(source
        .names()?
        .into_iter()
        .enumerate()
        .map(|(i, name)| ColumnOrdinal::new(name, i))
        .collect())
}
