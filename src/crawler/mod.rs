pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod robots;
pub mod url;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::models::{CrawlConfig, Page};
use fetcher::{FetchOutcome, Fetcher};
use frontier::Frontier;
use robots::RobotsCache;
use url::Domain;

const QUIET_CHECK_INTERVAL: Duration = Duration::from_millis(500);
const QUIET_CHECKS_BEFORE_DONE: u32 = 3;
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("no valid seed URLs")]
    EmptySeeds,
}

/// Ties the frontier, fetcher, and robots cache together into one
/// bounded-concurrency crawl. One engine instance is reused across many
/// crawl jobs -- its robots cache is process-wide and write-mostly-once
/// per host.
pub struct CrawlEngine {
    fetcher: Fetcher,
    robots: Arc<RobotsCache>,
}

impl CrawlEngine {
    pub fn new(fetcher: Fetcher, robots: Arc<RobotsCache>) -> Self {
        CrawlEngine { fetcher, robots }
    }

    /// Run one crawl to completion (or cancellation). `target_domain`
    /// must already be resolved to a bare domain by the caller -- this
    /// engine never parses a raw `target_domain` string itself.
    pub async fn crawl(
        &self,
        seed_urls: &[String],
        target_domain: &Domain,
        cfg: &CrawlConfig,
        cancel: CancellationToken,
    ) -> Result<Vec<Page>, CrawlError> {
        let seeds: Vec<url::Url> = seed_urls
            .iter()
            .filter_map(|raw| url::canonicalize(raw, None).ok())
            .collect();
        if seeds.is_empty() {
            return Err(CrawlError::EmptySeeds);
        }

        let mut frontier = Frontier::new(seeds);
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrent));
        let mut results: Vec<Page> = Vec::new();
        let mut join_set: JoinSet<Option<Page>> = JoinSet::new();
        let mut quiet_checks = 0u32;
        let target_domain_str = target_domain.as_str().to_string();

        loop {
            if cancel.is_cancelled() {
                join_set.abort_all();
                break;
            }
            if results.len() as u32 >= cfg.max_pages {
                break;
            }

            while join_set.len() < cfg.max_concurrent
                && (results.len() + join_set.len()) < cfg.max_pages as usize
            {
                let Some(next_url) = frontier.pop() else {
                    break;
                };
                let fetcher = self.fetcher.clone();
                let robots = self.robots.clone();
                let semaphore = semaphore.clone();
                let cfg = cfg.clone();
                let target_domain_str = target_domain_str.clone();
                join_set.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    crawl_one(&fetcher, &robots, &next_url, &target_domain_str, &cfg).await
                });
            }

            if join_set.is_empty() {
                if frontier.is_empty() {
                    quiet_checks += 1;
                    if quiet_checks >= QUIET_CHECKS_BEFORE_DONE {
                        break;
                    }
                    tokio::time::sleep(QUIET_CHECK_INTERVAL).await;
                    continue;
                }
                // Frontier has entries but we're already at the max_pages bound.
                break;
            }
            quiet_checks = 0;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    break;
                }
                joined = tokio::time::timeout(DEQUEUE_TIMEOUT, join_set.join_next()) => {
                    match joined {
                        Ok(Some(Ok(Some(page)))) => {
                            for link in &page.links {
                                if link.is_internal {
                                    if let Ok(canon) = url::canonicalize(link.href.as_str(), None) {
                                        frontier.push_if_new(canon);
                                    }
                                }
                            }
                            results.push(page);
                        }
                        Ok(Some(Ok(None))) => {}
                        Ok(Some(Err(join_err))) => {
                            tracing::error!(error = %join_err, "crawl worker task failed");
                        }
                        Ok(None) => {}
                        Err(_elapsed) => {}
                    }
                }
            }
        }

        Ok(results)
    }
}

async fn crawl_one(
    fetcher: &Fetcher,
    robots: &RobotsCache,
    page_url: &url::Url,
    target_domain: &str,
    cfg: &CrawlConfig,
) -> Option<Page> {
    if cfg.request_delay_s > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(cfg.request_delay_s)).await;
    }

    if cfg.respect_robots {
        let domain = url::domain_of(page_url);
        if !robots.allowed(&domain, page_url, &cfg.user_agent).await {
            tracing::debug!(url = %page_url, "blocked by robots.txt");
            return None;
        }
    }

    let outcome = tokio::time::timeout(
        Duration::from_secs(cfg.per_request_timeout_s),
        fetcher.get(page_url),
    )
    .await;

    match outcome {
        Err(_elapsed) => {
            tracing::warn!(url = %page_url, "fetch timed out");
            None
        }
        Ok(FetchOutcome::Skipped { reason }) => {
            tracing::warn!(url = %page_url, reason = %reason, "fetch skipped");
            None
        }
        Ok(FetchOutcome::Fetched { final_url, body }) => {
            let final_canon =
                url::canonicalize(&final_url, None).unwrap_or_else(|_| page_url.clone());
            Some(extractor::extract(&body, &final_canon, target_domain))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            max_pages: 5,
            max_concurrent: 2,
            request_delay_s: 0.0,
            per_request_timeout_s: 5,
            user_agent: "test-agent".to_string(),
            respect_robots: false,
        }
    }

    #[tokio::test]
    async fn empty_seeds_is_rejected() {
        let engine = CrawlEngine::new(
            Fetcher::new("test-agent", StdDuration::from_secs(5)),
            Arc::new(RobotsCache::new()),
        );
        let target = Domain::from_raw("example.com");
        let result = engine
            .crawl(&[], &target, &test_config(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CrawlError::EmptySeeds)));
    }

    #[tokio::test]
    async fn unparseable_seeds_are_treated_as_empty() {
        let engine = CrawlEngine::new(
            Fetcher::new("test-agent", StdDuration::from_secs(5)),
            Arc::new(RobotsCache::new()),
        );
        let target = Domain::from_raw("example.com");
        let result = engine
            .crawl(
                &["not a url".to_string(), "javascript:void(0)".to_string()],
                &target,
                &test_config(),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(CrawlError::EmptySeeds)));
    }

    #[tokio::test]
    async fn cancelled_crawl_returns_partial_results_without_error() {
        let engine = CrawlEngine::new(
            Fetcher::new("test-agent", StdDuration::from_secs(5)),
            Arc::new(RobotsCache::new()),
        );
        let target = Domain::from_raw("example.invalid");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine
            .crawl(
                &["https://example.invalid/".to_string()],
                &target,
                &test_config(),
                cancel,
            )
            .await;
        assert!(result.unwrap().is_empty());
    }
}
