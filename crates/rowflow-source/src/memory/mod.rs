mod source;

pub use source::MemorySource;
