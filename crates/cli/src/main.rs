mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use latprobe_client::{LiftWingScorer, WikipediaSource};
use latprobe_core::config::{load_dotenv, load_dotenv_from};
use latprobe_core::Config;
use latprobe_engine::{BatchProducer, RunController};
use latprobe_storage::SqliteSink;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Cli::parse();

    match &args.env_file {
        Some(path) => load_dotenv_from(path).context("failed to load env file")?,
        None => load_dotenv(),
    }

    let config = Config::from_env(|key| args.override_for(key)).context("invalid configuration")?;
    config.log_summary();

    let db_path = &config.sink.database_path;
    let sink = Arc::new(
        SqliteSink::open(db_path)
            .await
            .with_context(|| format!("failed to open measurement database {}", db_path.display()))?,
    );

    let source = Arc::new(WikipediaSource::new(&config.source).context("failed to build content source client")?);
    let scorer = Arc::new(LiftWingScorer::new(&config.scoring).context("failed to build scoring client")?);

    let producer = BatchProducer::new(source, config.source.tags.clone(), config.run.batch_size)?;
    let controller = RunController::new(config.run.clone(), scorer, sink.clone())?;

    info!("starting load run");
    let summary = controller.execute(producer).await.context("load run failed")?;
    sink.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.report);
    }

    Ok(())
}
