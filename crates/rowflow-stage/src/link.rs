use rowflow_bind::{QueryResult, Row};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::error::StageError;
use crate::stage::{Records, Stage, StageBuilder, StageState};
use crate::transform::RowTransform;

/// A live stream of raw rows plus the column snapshot that describes them.
pub type StreamingResult = QueryResult<(Stage<Row>, Records<Row>)>;

/// Attach a downstream stage to `upstream`.
///
/// The downstream stage is bound to the upstream column names and fed by a
/// forwarder task. Completion travels both ways: when upstream ends (or
/// faults) downstream is completed (or faulted), and when downstream stops
/// accepting input upstream is asked to complete.
pub fn link<X: RowTransform>(
    upstream: StreamingResult,
    builder: StageBuilder<X>,
) -> Result<(Stage<X::Output>, Records<X::Output>), StageError> {
    let handle = Handle::try_current()
        .map_err(|_| StageError::Usage("linking stages requires a tokio runtime".into()))?;
    let (_, names, (up_stage, up_records)) = upstream.into_parts();
    let (stage, records) = builder.layout(&names).spawn_on(&handle)?;
    handle.spawn(forward(up_stage, up_records, stage.clone()));
    Ok((stage, records))
}

async fn stopped(state: &mut watch::Receiver<StageState>) {
    let _ = state.wait_for(|s| !s.is_alive()).await;
}

async fn forward<O: Send + 'static>(
    upstream: Stage<Row>,
    mut rows: Records<Row>,
    downstream: Stage<O>,
) {
    let mut down_state = downstream.subscribe();
    loop {
        tokio::select! {
            biased;

            _ = stopped(&mut down_state) => {
                debug!(state = ?downstream.state(), "downstream stopped, completing upstream");
                upstream.complete();
                // Let upstream finish normally instead of seeing its consumer vanish.
                while rows.recv_async().await.is_some() {}
                break;
            }

            item = rows.recv_async() => match item {
                Some(Ok(row)) => match downstream.send(row).await {
                    Ok(true) => {}
                    Ok(false) => {
                        upstream.complete();
                        while rows.recv_async().await.is_some() {}
                        break;
                    }
                    Err(e) => {
                        downstream.fault(e.to_string());
                        upstream.complete();
                        break;
                    }
                },
                Some(Err(e)) => {
                    debug!(error = %e, "upstream failed, faulting downstream");
                    downstream.fault(e.to_string());
                    break;
                }
                None => {
                    downstream.complete();
                    break;
                }
            },
        }
    }
    debug!(
        upstream = ?upstream.state(),
        downstream = ?downstream.state(),
        "link closed"
    );
}
