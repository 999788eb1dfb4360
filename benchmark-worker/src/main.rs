use anyhow::Result;
use benchmark_worker::config::Config;
use benchmark_worker::{BenchmarkServer, WorkerContext};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("benchmark_worker={}", config.log_level).parse()?),
        )
        .init();

    let ctx = WorkerContext::production();
    let server = match BenchmarkServer::start(&config.server, config.fallback_port, &ctx).await {
        Ok(server) => server,
        Err(e) if e.is_fatal() => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Benchmark server rejected its configuration: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Benchmark worker serving on port {} with {} core(s)",
        server.port(),
        server.cores()
    );

    match config.stats_interval {
        Some(interval) => {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = server.get_stats();
                        tracing::info!(
                            "elapsed: {:.3}s, user: {:.3}s, system: {:.3}s",
                            stats.time_elapsed,
                            stats.time_user,
                            stats.time_system
                        );
                        server.reset();
                    }
                    result = tokio::signal::ctrl_c() => {
                        result?;
                        break;
                    }
                }
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    let stats = server.get_stats();
    tracing::info!("Stopping after {:.3}s since last reset", stats.time_elapsed);
    // Joins the listener thread
    tokio::task::spawn_blocking(move || server.shutdown()).await??;

    Ok(())
}
