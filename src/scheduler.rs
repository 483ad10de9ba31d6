use tokio_cron_scheduler::{Job, JobScheduler};

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::core::{display, ranking::RankingAggregator};
use crate::error::BoardResult;
use crate::rcon::client::Rcon;

type SharedAggregator = Arc<RankingAggregator<Rcon>>;

pub struct Scheduler {
    scheduler: JobScheduler,
    aggregator: SharedAggregator,
    page_title: Arc<str>,
}

pub enum JobProcess {
    InitializeRankings, // only ran once, at startup.
    RefreshRankings(Duration),
}

impl Scheduler {
    pub async fn new(aggregator: SharedAggregator, page_title: &str) -> BoardResult<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Scheduler {
            scheduler,
            aggregator,
            page_title: Arc::from(page_title),
        })
    }

    pub async fn add_job(&self, job_process: JobProcess) -> BoardResult<uuid::Uuid> {
        let job = match job_process {
            JobProcess::InitializeRankings => {
                initialize_rankings_job(self.aggregator.clone(), self.page_title.clone()).await?
            }
            JobProcess::RefreshRankings(interval) => {
                refresh_rankings_job(interval, self.aggregator.clone(), self.page_title.clone())
                    .await?
            }
        };
        Ok(self.scheduler.add(job).await?)
    }

    pub async fn start(&self) -> BoardResult<()> {
        Ok(self.scheduler.start().await?)
    }

    pub async fn shutdown(&mut self) -> BoardResult<()> {
        Ok(self.scheduler.shutdown().await?)
    }
}

// Refreshes the rankings and prints the rendered page.
pub async fn publish_rankings(aggregator: &RankingAggregator<Rcon>, page_title: &str) {
    let rankings = aggregator.get_rankings().await;
    match display::rankings(page_title, &rankings, Local::now()) {
        Ok(page) => println!("{page}\n"),
        Err(e) => error!("Could not render rankings. {e}"),
    }
}

//////////////////
// Jobs definition
//////////////////

async fn initialize_rankings_job(
    aggregator: SharedAggregator,
    page_title: Arc<str>,
) -> BoardResult<Job> {
    let job = Job::new_one_shot_async(Duration::from_secs(0), move |_uuid, _l| {
        let aggregator = aggregator.clone();
        let page_title = page_title.clone();
        Box::pin(async move {
            publish_rankings(&aggregator, &page_title).await;
        })
    })?;
    Ok(job)
}

async fn refresh_rankings_job(
    interval: Duration,
    aggregator: SharedAggregator,
    page_title: Arc<str>,
) -> BoardResult<Job> {
    let job = Job::new_repeated_async(interval, move |uuid, mut l| {
        let aggregator = aggregator.clone();
        let page_title = page_title.clone();
        Box::pin(async move {
            publish_rankings(&aggregator, &page_title).await;

            // Query the next execution time for this job
            let next_tick = l.next_tick_for_job(uuid).await;
            match next_tick {
                Ok(Some(ts)) => info!("Next rankings refresh at {:?}", ts),
                _ => error!("Could not get next tick for refresh rankings job"),
            }
        })
    })?;
    Ok(job)
}
