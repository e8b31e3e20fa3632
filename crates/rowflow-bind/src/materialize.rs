use std::sync::Arc;

use rowflow_source::Row;

use crate::binding::ColumnBinding;
use crate::error::BindError;
use crate::field_map::FieldMap;
use crate::shape::Shape;
use crate::value::normalize;

impl<T: Shape> ColumnBinding<T> {
    /// Build one record from `row`.
    ///
    /// The record starts at `T::default()`. Each bound position has its
    /// value normalized (`Bson::Null` → `None`) and handed to the field's
    /// setter; the first setter failure aborts the row. The binding itself
    /// is untouched by a failure.
    pub fn materialize(&self, row: Row) -> Result<T, BindError> {
        if row.len() != self.slots.len() {
            return Err(BindError::Usage(format!(
                "row has {} values but the layout has {} columns",
                row.len(),
                self.slots.len()
            )));
        }

        let mut record = T::default();
        for (slot, value) in self.slots.iter().zip(row) {
            let Some(slot) = slot else { continue };
            (slot.set)(&mut record, normalize(value)).map_err(|source| {
                BindError::FieldBinding {
                    field: slot.field.to_string(),
                    column: slot.column.clone(),
                    source,
                }
            })?;
        }
        Ok(record)
    }
}

/// A field map together with the binding for the current layout.
pub struct Materializer<T> {
    map: Arc<FieldMap<T>>,
    binding: ColumnBinding<T>,
}

impl<T: Shape> Materializer<T> {
    pub fn new<C: AsRef<str>>(map: Arc<FieldMap<T>>, columns: &[C]) -> Self {
        let binding = ColumnBinding::bind(&map, columns);
        Self { map, binding }
    }

    /// Replace the binding with one for a new layout.
    pub fn rebind<C: AsRef<str>>(&mut self, columns: &[C]) {
        self.binding = ColumnBinding::bind(&self.map, columns);
    }

    pub fn binding(&self) -> &ColumnBinding<T> {
        &self.binding
    }

    pub fn map(&self) -> &Arc<FieldMap<T>> {
        &self.map
    }

    pub fn materialize(&self, row: Row) -> Result<T, BindError> {
        self.binding.materialize(row)
    }
}

impl<T> Clone for Materializer<T> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            binding: self.binding.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::Bson;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct User {
        id: i32,
        name: String,
        nickname: Option<String>,
    }

    crate::shape!(User { id, name, nickname });

    fn s(v: &str) -> Bson {
        Bson::String(v.into())
    }

    #[test]
    fn materializes_each_bound_field() {
        let m = Materializer::new(Arc::new(FieldMap::<User>::new()), &["id", "name", "nickname"]);
        let user = m.materialize(vec![Bson::Int32(4), s("ada"), Bson::Null]).unwrap();
        assert_eq!(
            user,
            User {
                id: 4,
                name: "ada".into(),
                nickname: None,
            }
        );
    }

    #[test]
    fn ignored_positions_are_skipped() {
        let m = Materializer::new(Arc::new(FieldMap::<User>::new()), &["unknown", "id"]);
        // The unknown column holds a value no field could accept.
        let user = m.materialize(vec![Bson::Boolean(true), Bson::Int32(9)]).unwrap();
        assert_eq!(user.id, 9);
        assert_eq!(user.name, "");
    }

    #[test]
    fn setter_failure_names_field_and_column() {
        let map = FieldMap::<User>::with_overrides([("name", Some("display_name"))]).unwrap();
        let m = Materializer::new(Arc::new(map), &["id", "display_name"]);
        let err = m.materialize(vec![Bson::Int32(1), Bson::Null]).unwrap_err();
        match &err {
            BindError::FieldBinding { field, column, .. } => {
                assert_eq!(field, "name");
                assert_eq!(column, "display_name");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(std::error::Error::source(&err).is_some());

        // The binding is still usable for the next row.
        let user = m.materialize(vec![Bson::Int32(2), s("bob")]).unwrap();
        assert_eq!(user.name, "bob");
    }

    #[test]
    fn row_length_must_match_layout() {
        let m = Materializer::new(Arc::new(FieldMap::<User>::new()), &["id", "name"]);
        let err = m.materialize(vec![Bson::Int32(1)]).unwrap_err();
        assert!(matches!(err, BindError::Usage(_)));
    }

    #[test]
    fn rebind_replaces_layout() {
        let mut m = Materializer::new(Arc::new(FieldMap::<User>::new()), &["id", "name"]);
        m.rebind(&["name", "id"]);
        assert_eq!(m.binding().columns(), ["name", "id"]);
        let user = m.materialize(vec![s("eve"), Bson::Int32(3)]).unwrap();
        assert_eq!((user.id, user.name.as_str()), (3, "eve"));
    }
}
