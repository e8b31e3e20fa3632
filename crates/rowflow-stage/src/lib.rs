//! Bounded, backpressured pipeline stages that turn raw rows into outputs.
//!
//! A stage is a pair: a [`Stage`] handle that producers push rows into and
//! a [`Records`] receiver the consumer drains. [`feed`] and [`feed_async`]
//! drive a row source into a stage; [`stream`] does the same behind a
//! [`StreamingResult`] that carries the selected columns; [`link`] chains
//! stages so completion and faults travel in both directions.

mod config;
mod error;
mod feed;
mod link;
mod stage;
mod stream;
mod transform;

pub use config::StageConfig;
pub use error::StageError;
pub use feed::{FeedStats, feed, feed_async};
pub use link::{StreamingResult, link};
pub use stage::{BlockingRecords, PushError, Records, Stage, StageBuilder, StageState};
pub use stream::{stream, stream_async};
pub use transform::{Materialize, NormalizedRows, RawRows, RowTransform};
