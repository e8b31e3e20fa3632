use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    ColumnNotFound(String),
    OrdinalOutOfRange(usize),
    NoCurrentRow,
    Backend(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::ColumnNotFound(name) => write!(f, "column not found: {name}"),
            SourceError::OrdinalOutOfRange(ordinal) => {
                write!(f, "ordinal out of range: {ordinal}")
            }
            SourceError::NoCurrentRow => write!(f, "no current row"),
            SourceError::Backend(msg) => write!(f, "source error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}
