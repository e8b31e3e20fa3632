use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rowflow_bind::{BindError, Bson, FieldMap, Row};
use rowflow_source::MemorySource;
use rowflow_stage::{StageBuilder, StageConfig, StageError, feed_async};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bind error: {0}")]
    Bind(#[from] BindError),

    #[error("stage error: {0}")]
    Stage(#[from] StageError),

    #[error("feeder task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Default)]
struct Customer {
    id: i64,
    full_name: Option<String>,
    status: Option<String>,
    revenue: Option<f64>,
}

rowflow_bind::shape!(Customer {
    id,
    full_name,
    status,
    revenue,
});

fn customers(n: i64) -> MemorySource {
    let rows: Vec<Row> = (1..=n)
        .map(|i| {
            vec![
                Bson::Int64(i),
                Bson::String(format!("Customer {i}")),
                if i % 3 == 0 {
                    Bson::Null
                } else {
                    Bson::String("active".into())
                },
                Bson::Double(i as f64 * 125.5),
                Bson::String("emea".into()),
            ]
        })
        .collect();
    MemorySource::new(["ID", "Name", "status", "revenue", "region"], rows)
        .read_delay(Duration::from_millis(2))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!("demo failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = StageConfig::from_env();
    let rows = std::env::var("ROWFLOW_DEMO_ROWS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(25);

    info!(
        capacity = config.capacity,
        parallelism = config.parallelism,
        max_rows = ?config.max_rows,
        rows,
        "starting rowflow-demo"
    );

    let map = Arc::new(FieldMap::<Customer>::with_overrides([(
        "full_name",
        Some("name"),
    )])?);

    // Buffered: drain everything, then materialize.
    let mut source = customers(rows);
    let buffered: Vec<Customer> = rowflow_bind::results(&mut source, map.clone())?
        .collect::<Result<_, _>>()?;
    info!(records = buffered.len(), reads = source.reads(), "buffered retrieval done");

    // Streaming: feed the stage while records are consumed.
    let (stage, mut records) = StageBuilder::records(map).config(config).spawn()?;
    let feeder = tokio::spawn({
        let stage = stage.clone();
        async move {
            let mut source = customers(rows);
            feed_async(&mut source, &stage).await
        }
    });

    let mut total = 0.0;
    let mut seen = 0usize;
    while let Some(record) = records.next().await {
        match record {
            Ok(customer) => {
                seen += 1;
                total += customer.revenue.unwrap_or_default();
                println!(
                    "{:>4}  {:<14} {:<8} {:>10.2}",
                    customer.id,
                    customer.full_name.as_deref().unwrap_or("-"),
                    customer.status.as_deref().unwrap_or("-"),
                    customer.revenue.unwrap_or_default(),
                );
            }
            Err(e) => warn!(error = %e, "record failed"),
        }
    }

    let stats = feeder.await??;
    info!(
        records = seen,
        revenue = total,
        reads = stats.reads,
        waits = stats.waits,
        state = ?stage.completion().await,
        "streaming done"
    );
    Ok(())
}
