use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Sizing for one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Rows the input queue holds before pushes have to wait. The output
    /// queue has the same bound.
    pub capacity: usize,
    /// Rows materialized concurrently. Output order never depends on it.
    pub parallelism: usize,
    /// Complete the stage once this many rows have been accepted.
    pub max_rows: Option<usize>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            parallelism: 1,
            max_rows: None,
        }
    }
}

impl StageConfig {
    /// Read `ROWFLOW_STAGE_CAPACITY`, `ROWFLOW_STAGE_PARALLELISM` and
    /// `ROWFLOW_STAGE_MAX_ROWS`; unset or unparsable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<usize>().ok());
        let defaults = Self::default();
        Self {
            capacity: parse("ROWFLOW_STAGE_CAPACITY").unwrap_or(defaults.capacity),
            parallelism: parse("ROWFLOW_STAGE_PARALLELISM").unwrap_or(defaults.parallelism),
            max_rows: parse("ROWFLOW_STAGE_MAX_ROWS").or(defaults.max_rows),
        }
    }

    pub fn validate(&self) -> Result<(), StageError> {
        if self.capacity == 0 {
            return Err(StageError::Usage("stage capacity must be at least 1".into()));
        }
        if self.parallelism == 0 {
            return Err(StageError::Usage("stage parallelism must be at least 1".into()));
        }
        Ok(())
    }
}
