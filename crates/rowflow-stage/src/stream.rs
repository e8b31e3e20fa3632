use rowflow_bind::{Columns, QueryResult};
use rowflow_source::{AsyncRowSource, RowSource};
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::StageError;
use crate::feed::{feed_projected, feed_projected_async};
use crate::link::StreamingResult;
use crate::stage::StageBuilder;
use crate::transform::RawRows;

fn runtime() -> Result<Handle, StageError> {
    Handle::try_current()
        .map_err(|_| StageError::Usage("streaming a source requires a tokio runtime".into()))
}

/// Stream `source` through a raw stage built from `builder`.
///
/// Columns are resolved the way [`rowflow_bind::retrieve`] resolves them,
/// before anything is read, so a strict mismatch fails here and the source
/// is never touched. The stage's layout is the resolved names and each row
/// carries only the selected columns. The source is fed from a blocking
/// task until it runs out or the stage stops.
pub fn stream<S: RowSource + Send + 'static>(
    mut source: S,
    columns: Columns<'_>,
    builder: StageBuilder<RawRows>,
) -> Result<StreamingResult, StageError> {
    let handle = runtime()?;
    let (ordinals, names) = columns.resolve(&source)?;
    let (stage, records) = builder.layout(&names).spawn_on(&handle)?;

    let feeder = stage.clone();
    let projection = ordinals.clone();
    handle.spawn_blocking(move || {
        match feed_projected(&mut source, &feeder, Some(&projection)) {
            Ok(stats) => debug!(reads = stats.reads, pushed = stats.pushed, "stream source drained"),
            Err(e) => debug!(error = %e, "stream source failed"),
        }
    });

    Ok(QueryResult::new(ordinals, names, (stage, records))?)
}

/// [`stream`] for an async source, fed from a runtime task.
pub fn stream_async<S: AsyncRowSource + 'static>(
    mut source: S,
    columns: Columns<'_>,
    builder: StageBuilder<RawRows>,
) -> Result<StreamingResult, StageError> {
    let handle = runtime()?;
    let (ordinals, names) = columns.resolve(&source)?;
    let (stage, records) = builder.layout(&names).spawn_on(&handle)?;

    let feeder = stage.clone();
    let projection = ordinals.clone();
    handle.spawn(async move {
        match feed_projected_async(&mut source, &feeder, Some(&projection)).await {
            Ok(stats) => debug!(reads = stats.reads, pushed = stats.pushed, "stream source drained"),
            Err(e) => debug!(error = %e, "stream source failed"),
        }
    });

    Ok(QueryResult::new(ordinals, names, (stage, records))?)
}
