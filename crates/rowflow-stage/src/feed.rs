use std::future::Future;
use std::pin::Pin;

use rowflow_source::{AsyncRowSource, Row, RowSource, SourceError};
use tracing::debug;

use crate::error::StageError;
use crate::stage::{PushError, Stage};

/// What a feeder did before it stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    /// Calls to `read`, including the one that reported the end.
    pub reads: usize,
    /// Rows the stage accepted.
    pub pushed: usize,
    /// Pushes that found the queue full and had to wait.
    pub waits: usize,
}

fn prepare<S: RowSource + ?Sized, O>(source: &S, stage: &Stage<O>) -> Result<(), StageError> {
    if !stage.has_layout() {
        stage.establish_layout(&source.names()?)?;
    }
    Ok(())
}

fn finish<O>(
    stage: &Stage<O>,
    outcome: Result<(), StageError>,
    stats: FeedStats,
) -> Result<FeedStats, StageError> {
    match outcome {
        Ok(()) => {
            stage.complete();
            debug!(
                reads = stats.reads,
                pushed = stats.pushed,
                waits = stats.waits,
                "feeder stopped"
            );
            Ok(stats)
        }
        Err(e) => {
            stage.fault(e.to_string());
            Err(e)
        }
    }
}

fn source_failed(e: SourceError) -> Result<(), StageError> {
    Err(StageError::Source(e))
}

/// The current row, or only the columns at `ordinals` when projecting.
fn current_row<S: RowSource + ?Sized>(
    source: &S,
    ordinals: Option<&[usize]>,
) -> Result<Row, SourceError> {
    match ordinals {
        Some(ordinals) => source.values_at(ordinals),
        None => source.values(),
    }
}

/// Drive `source` into `stage` from a blocking thread.
///
/// Liveness is checked before every read, so once the stage stops
/// accepting input at most the read already in progress is wasted. Each
/// row is offered with `try_push` first and only waits when the queue is
/// full. The stage is completed when the source runs out or the stage
/// stops; a source error faults it instead.
pub fn feed<S: RowSource + ?Sized, O>(
    source: &mut S,
    stage: &Stage<O>,
) -> Result<FeedStats, StageError> {
    feed_projected(source, stage, None)
}

pub(crate) fn feed_projected<S: RowSource + ?Sized, O>(
    source: &mut S,
    stage: &Stage<O>,
    ordinals: Option<&[usize]>,
) -> Result<FeedStats, StageError> {
    let mut stats = FeedStats::default();
    let outcome = prepare(source, stage).and_then(|()| loop {
        if !stage.is_alive() {
            break Ok(());
        }
        stats.reads += 1;
        match source.read() {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(e) => break source_failed(e),
        }
        let row = match current_row(&*source, ordinals) {
            Ok(row) => row,
            Err(e) => break source_failed(e),
        };
        match stage.try_push(row) {
            Ok(()) => stats.pushed += 1,
            Err(PushError::Full(row)) => {
                stats.waits += 1;
                match stage.push(row) {
                    Ok(true) => stats.pushed += 1,
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
            Err(PushError::Closed(_)) => break Ok(()),
            Err(e @ PushError::Unbound(_)) => break Err(StageError::Usage(e.to_string())),
        }
    });
    finish(stage, outcome, stats)
}

type PendingSend<'a> = Pin<Box<dyn Future<Output = Result<bool, StageError>> + Send + 'a>>;

/// Drive `source` into `stage` from async code.
///
/// Like [`feed`], but when the queue is full the wait for that send is
/// overlapped with the next read. At most one send is outstanding, and the
/// next row is only offered after it lands, so order is preserved. The
/// overlap costs at most one extra read if the stage stops while a send is
/// pending.
pub async fn feed_async<S: AsyncRowSource, O: Send + 'static>(
    source: &mut S,
    stage: &Stage<O>,
) -> Result<FeedStats, StageError> {
    feed_projected_async(source, stage, None).await
}

pub(crate) async fn feed_projected_async<S: AsyncRowSource, O: Send + 'static>(
    source: &mut S,
    stage: &Stage<O>,
    ordinals: Option<&[usize]>,
) -> Result<FeedStats, StageError> {
    let mut stats = FeedStats::default();
    if let Err(e) = prepare(source, stage) {
        return finish(stage, Err(e), stats);
    }

    let mut pending: Option<PendingSend<'_>> = None;
    let outcome = loop {
        if !stage.is_alive() {
            break Ok(());
        }
        stats.reads += 1;
        let read = match pending.take() {
            Some(send) => {
                let (read, sent) = tokio::join!(source.read_async(), send);
                match sent {
                    Ok(true) => stats.pushed += 1,
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                }
                read
            }
            None => source.read_async().await,
        };
        match read {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(e) => break source_failed(e),
        }
        let row = match current_row(&*source, ordinals) {
            Ok(row) => row,
            Err(e) => break source_failed(e),
        };
        match stage.try_push(row) {
            Ok(()) => stats.pushed += 1,
            Err(PushError::Full(row)) => {
                stats.waits += 1;
                pending = Some(Box::pin(stage.send(row)));
            }
            Err(PushError::Closed(_)) => break Ok(()),
            Err(e @ PushError::Unbound(_)) => break Err(StageError::Usage(e.to_string())),
        }
    };

    let outcome = match (outcome, pending.take()) {
        (Ok(()), Some(send)) => match send.await {
            Ok(true) => {
                stats.pushed += 1;
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        },
        (outcome, _) => outcome,
    };
    finish(stage, outcome, stats)
}
