use std::fmt;

use rowflow_source::SourceError;

use crate::shape::BoxError;

#[derive(Debug)]
pub enum BindError {
    /// Requested columns with no match in the layout, sorted and deduplicated.
    SchemaMismatch { missing: Vec<String> },
    FieldBinding {
        field: String,
        column: String,
        source: BoxError,
    },
    Usage(String),
    Source(SourceError),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::SchemaMismatch { missing } => {
                write!(f, "invalid columns: {}", missing.join(", "))
            }
            BindError::FieldBinding {
                field,
                column,
                source,
            } => write!(
                f,
                "unable to set field '{field}' from column '{column}': {source}"
            ),
            BindError::Usage(msg) => write!(f, "usage error: {msg}"),
            BindError::Source(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BindError::FieldBinding { source, .. } => Some(source.as_ref()),
            BindError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for BindError {
    fn from(e: SourceError) -> Self {
        BindError::Source(e)
    }
}
