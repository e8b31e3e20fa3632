use std::sync::{Arc, OnceLock};

use bson::Bson;
use rowflow_bind::{BindError, ColumnBinding, FieldMap, Row, Shape, normalize_row};

use crate::error::StageError;

/// What a stage does to each row.
///
/// `plan` runs once, when the stage's layout is established; `apply` then
/// runs per row against that plan, possibly from several tasks at once.
pub trait RowTransform: Send + Sync + 'static {
    type Output: Send + 'static;
    type Plan: Send + Sync + 'static;

    fn plan(&self, columns: &[String]) -> Self::Plan;

    fn apply(&self, plan: &Self::Plan, row: Row) -> Result<Self::Output, BindError>;
}

/// Rows into records of `T`.
pub struct Materialize<T> {
    map: Arc<FieldMap<T>>,
}

impl<T: Shape> Materialize<T> {
    pub fn new(map: Arc<FieldMap<T>>) -> Self {
        Self { map }
    }
}

impl<T: Shape> RowTransform for Materialize<T> {
    type Output = T;
    type Plan = ColumnBinding<T>;

    fn plan(&self, columns: &[String]) -> ColumnBinding<T> {
        ColumnBinding::bind(&self.map, columns)
    }

    fn apply(&self, plan: &ColumnBinding<T>, row: Row) -> Result<T, BindError> {
        plan.materialize(row)
    }
}

fn check_width(width: usize, row: &Row) -> Result<(), BindError> {
    if row.len() != width {
        return Err(BindError::Usage(format!(
            "row has {} values but the layout has {width} columns",
            row.len()
        )));
    }
    Ok(())
}

/// Rows passed through untouched; `Bson::Null` stays as it is.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawRows;

impl RowTransform for RawRows {
    type Output = Row;
    type Plan = usize;

    fn plan(&self, columns: &[String]) -> usize {
        columns.len()
    }

    fn apply(&self, width: &usize, row: Row) -> Result<Row, BindError> {
        check_width(*width, &row)?;
        Ok(row)
    }
}

/// Rows with `Bson::Null` replaced by `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizedRows;

impl RowTransform for NormalizedRows {
    type Output = Vec<Option<Bson>>;
    type Plan = usize;

    fn plan(&self, columns: &[String]) -> usize {
        columns.len()
    }

    fn apply(&self, width: &usize, row: Row) -> Result<Vec<Option<Bson>>, BindError> {
        check_width(*width, &row)?;
        Ok(normalize_row(row))
    }
}

// ── Write-once layout ───────────────────────────────────────

/// A transform and the plan for its layout, erased to its output type so a
/// stage handle only carries `O`.
pub(crate) trait Layout<O>: Send + Sync {
    fn establish(&self, columns: &[String]) -> Result<(), StageError>;

    fn is_established(&self) -> bool;

    fn apply(&self, row: Row) -> Result<O, StageError>;
}

pub(crate) struct Planned<X: RowTransform> {
    transform: X,
    plan: OnceLock<X::Plan>,
}

impl<X: RowTransform> Planned<X> {
    pub(crate) fn new(transform: X) -> Self {
        Self {
            transform,
            plan: OnceLock::new(),
        }
    }
}

impl<X: RowTransform> Layout<X::Output> for Planned<X> {
    fn establish(&self, columns: &[String]) -> Result<(), StageError> {
        if self.plan.get().is_some() {
            return Err(StageError::Usage("layout already established".into()));
        }
        self.plan
            .set(self.transform.plan(columns))
            .map_err(|_| StageError::Usage("layout already established".into()))
    }

    fn is_established(&self) -> bool {
        self.plan.get().is_some()
    }

    fn apply(&self, row: Row) -> Result<X::Output, StageError> {
        let plan = self
            .plan
            .get()
            .ok_or_else(|| StageError::Usage("row processed before layout was established".into()))?;
        self.transform.apply(plan, row).map_err(StageError::from)
    }
}
