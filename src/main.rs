use scoreboard_ranker::cli::Cli;
use scoreboard_ranker::config::Settings;
use scoreboard_ranker::core::ranking::RankingAggregator;
use scoreboard_ranker::rcon::client::Rcon;
use scoreboard_ranker::scheduler::{publish_rankings, JobProcess, Scheduler};
use scoreboard_ranker::storage::MemoryCache;

use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    // A missing or invalid configuration is the only fatal error.
    let settings = Settings::load(&cli)?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(settings.get_trace_level())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let aggregator = Arc::new(RankingAggregator::new(
        Rcon::new(settings.rcon.clone()),
        MemoryCache::new(),
        settings.scores.clone(),
    ));

    let interval = match (cli.once, settings.refresh_interval()) {
        (false, Some(interval)) => interval,
        _ => {
            publish_rankings(&aggregator, &settings.page_title).await;
            return Ok(());
        }
    };

    let mut sched = Scheduler::new(aggregator, &settings.page_title).await?;

    let jobs = vec![
        JobProcess::InitializeRankings, // only ran once, at startup.
        JobProcess::RefreshRankings(interval),
    ];
    for job in jobs {
        sched.add_job(job).await?;
    }

    info!(
        "Starting scheduler, refreshing {} score(s) every {:?}.",
        settings.scores.len(),
        interval
    );
    sched.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down.");
    sched.shutdown().await?;

    Ok(())
}
