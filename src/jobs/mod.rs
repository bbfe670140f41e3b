use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawler::url::Domain;
use crate::crawler::CrawlEngine;
use crate::graph;
use crate::store::Store;

/// A queued crawl, as handed from the API layer to the background
/// worker. The job row already exists (status `pending`) by the time
/// this is constructed.
pub struct CrawlJobPayload {
    pub job_id: i64,
    pub target_domain: Domain,
    pub seed_urls: Vec<String>,
    pub max_pages: Option<u32>,
}

/// Owns the background task that drains queued crawl jobs one at a
/// time off an mpsc channel, running up to `max_concurrent_jobs` of
/// them at once. Submission is fire-and-forget from the caller's
/// perspective -- job progress is observed through the store, not
/// through this struct.
pub struct JobManager {
    tx: mpsc::Sender<CrawlJobPayload>,
}

impl JobManager {
    pub fn new(config: Arc<Config>, store: Arc<Store>, engine: Arc<CrawlEngine>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(Self::process_loop(rx, config, store, engine));
        JobManager { tx }
    }

    /// Enqueue a job for background processing.
    pub async fn submit(&self, payload: CrawlJobPayload) {
        if let Err(e) = self.tx.send(payload).await {
            tracing::error!(error = %e, "failed to enqueue crawl job");
        }
    }

    async fn process_loop(
        mut rx: mpsc::Receiver<CrawlJobPayload>,
        config: Arc<Config>,
        store: Arc<Store>,
        engine: Arc<CrawlEngine>,
    ) {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        while let Some(payload) = rx.recv().await {
            let config = config.clone();
            let store = store.clone();
            let engine = engine.clone();
            let slots = slots.clone();
            tokio::spawn(async move {
                let _permit = slots.acquire_owned().await;
                Self::run_job(payload, &config, &store, &engine).await;
            });
        }
    }

    async fn run_job(payload: CrawlJobPayload, config: &Config, store: &Store, engine: &CrawlEngine) {
        let job_id = payload.job_id;

        if let Err(e) = store.mark_running(job_id).await {
            tracing::error!(job_id, error = %e, "failed to mark job running");
            return;
        }

        let cfg = config.default_crawl_config(payload.max_pages);
        let cancel = CancellationToken::new();

        let pages = match engine
            .crawl(&payload.seed_urls, &payload.target_domain, &cfg, cancel)
            .await
        {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "crawl failed to start");
                let _ = store.mark_failed(job_id, &e.to_string()).await;
                return;
            }
        };

        let metrics = graph::build_metrics(&pages, &payload.target_domain);
        if let Err(e) = store.store_crawl(job_id, &metrics, &pages).await {
            tracing::error!(job_id, error = %e, "failed to persist crawl result");
            let _ = store.mark_failed(job_id, &e.to_string()).await;
        } else {
            tracing::info!(
                job_id,
                pages_crawled = pages.len(),
                total_backlinks = metrics.total_backlinks,
                "crawl job complete"
            );
        }
    }
}
