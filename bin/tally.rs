use anyhow::Context;
use jemallocator::Jemalloc;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use tally::{writer::replay_file, MetricAggregator, PostgresClient, Settings};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .context("Failed to initialize logger")?;

    let settings = Settings::new()
        .context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let aggregator = MetricAggregator::new(settings.aggregator.clone());
    let config = aggregator.settings();
    info!(
        "Aggregating with decimals={}, precision={}, timezone={}, global bucket {}",
        config.decimals,
        config.display_precision,
        config.timezone,
        if config.include_global_bucket { "on" } else { "off" }
    );

    let store = PostgresClient::new(&settings.postgres)
        .await
        .context("Failed to initialize database connection")?;
    store.health_check().await?;

    let cancellation_token = CancellationToken::new();

    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        warn!("Shutdown requested, stopping replay...");
        signal_token.cancel();
    });

    let summary = replay_file(
        &aggregator,
        &store,
        &settings.replay.path,
        settings.replay.concurrency,
        &cancellation_token,
    )
    .await
    .with_context(|| format!("Replay of {} failed", settings.replay.path))?;

    if cancellation_token.is_cancelled() {
        info!(
            "Replay interrupted after {} applied and {} skipped events",
            summary.applied, summary.skipped
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received shutdown signal (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            },
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (Ctrl+C)");
    }
}
