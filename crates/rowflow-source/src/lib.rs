mod error;
mod source;

pub use bson::Bson;
pub use error::SourceError;
pub use source::{AsyncRowSource, Row, RowSource};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::MemorySource;
