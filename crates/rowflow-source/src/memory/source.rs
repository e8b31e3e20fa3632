use std::future::Future;
use std::time::Duration;

use bson::Bson;

use crate::error::SourceError;
use crate::source::{AsyncRowSource, Row, RowSource};

/// An in-memory cursor over a fixed set of rows.
///
/// Counts every call to `read` so callers can assert how far a consumer
/// drove the cursor.
pub struct MemorySource {
    columns: Vec<String>,
    rows: Vec<Row>,
    position: Option<usize>,
    reads: usize,
    fail_on_read: Option<(usize, String)>,
    read_delay: Option<Duration>,
}

impl MemorySource {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Row>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
            position: None,
            reads: 0,
            fail_on_read: None,
            read_delay: None,
        }
    }

    /// Make the `n`th call to `read` (1-based) fail with a backend error.
    pub fn fail_on_read(mut self, n: usize, message: impl Into<String>) -> Self {
        self.fail_on_read = Some((n, message.into()));
        self
    }

    /// Sleep before every asynchronous read.
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Number of `read` calls made so far, including the one that hit the end.
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn current(&self) -> Result<&Row, SourceError> {
        self.position
            .and_then(|p| self.rows.get(p))
            .ok_or(SourceError::NoCurrentRow)
    }
}

impl RowSource for MemorySource {
    fn read(&mut self) -> Result<bool, SourceError> {
        self.reads += 1;
        if let Some((n, msg)) = &self.fail_on_read {
            if *n == self.reads {
                return Err(SourceError::Backend(msg.clone()));
            }
        }
        let next = self.position.map_or(0, |p| p + 1).min(self.rows.len());
        self.position = Some(next);
        Ok(next < self.rows.len())
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, ordinal: usize) -> Result<&str, SourceError> {
        self.columns
            .get(ordinal)
            .map(String::as_str)
            .ok_or(SourceError::OrdinalOutOfRange(ordinal))
    }

    fn ordinal(&self, name: &str) -> Result<usize, SourceError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
            .ok_or_else(|| SourceError::ColumnNotFound(name.to_string()))
    }

    fn value(&self, ordinal: usize) -> Result<Bson, SourceError> {
        if ordinal >= self.columns.len() {
            return Err(SourceError::OrdinalOutOfRange(ordinal));
        }
        self.current()?
            .get(ordinal)
            .cloned()
            .ok_or(SourceError::OrdinalOutOfRange(ordinal))
    }
}

impl AsyncRowSource for MemorySource {
    fn read_async(&mut self) -> impl Future<Output = Result<bool, SourceError>> + Send {
        let delay = self.read_delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.read()
        }
    }
}
