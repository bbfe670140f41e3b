//! SQLite-backed persistence for crawl jobs, pages, and derived metrics.
//!
//! One `Store` wraps a single connection pool and is shared across the
//! whole process (see `crate::jobs`). Schema is applied idempotently on
//! startup from an embedded migration; there is deliberately no
//! migration *history* tracking since this is a single-file, single-app
//! database, not a multi-version shared one.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::crawler::url::Domain;
use crate::models::{JobStatus, JobStatusResponse, Metrics, MetricsReport, Page};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("metrics serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if necessary) the SQLite database at `path` and
    /// apply the schema migration. `path` is a plain filesystem path,
    /// or `:memory:` for an ephemeral in-process database.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;

        let store = Store { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;
        tracing::info!("store schema ready");
        Ok(())
    }

    /// Record a new job as `pending` and return its id.
    pub async fn create_job(
        &self,
        target_domain: &Domain,
        seed_urls: &[String],
    ) -> Result<i64, StoreError> {
        let seed_urls_json = serde_json::to_string(seed_urls)?;
        let row = sqlx::query(
            "INSERT INTO crawl_jobs (target_domain, seed_urls_json, status)
             VALUES (?, ?, 'pending') RETURNING id",
        )
        .bind(target_domain.as_str())
        .bind(seed_urls_json)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("id"))
    }

    pub async fn mark_running(&self, job_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE crawl_jobs SET status = 'running' WHERE id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, job_id: i64, error: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE crawl_jobs SET status = 'failed', error = ? WHERE id = ?")
            .bind(error)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically persist every page gathered by a crawl plus its
    /// derived metrics, and flip the job to `completed`. Either all of
    /// this lands, or none of it does.
    pub async fn store_crawl(
        &self,
        job_id: i64,
        metrics: &Metrics,
        pages: &[Page],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for page in pages {
            let links_json = serde_json::to_string(&page.links)?;
            sqlx::query(
                "INSERT INTO crawl_pages
                   (job_id, url, domain, title, meta_description,
                    internal_count, external_count, follow_count, nofollow_count, links_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(job_id)
            .bind(page.url.as_str())
            .bind(page.domain.as_str())
            .bind(&page.title)
            .bind(&page.meta_description)
            .bind(page.internal_count)
            .bind(page.external_count)
            .bind(page.follow_count)
            .bind(page.nofollow_count)
            .bind(links_json)
            .execute(&mut *tx)
            .await?;
        }

        let metrics_json = serde_json::to_string(metrics)?;
        sqlx::query(
            "INSERT INTO crawl_metrics
               (job_id, target_domain, referring_domains, total_backlinks,
                follow_pct, estimated_da, metrics_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(job_id) DO UPDATE SET
               referring_domains = excluded.referring_domains,
               total_backlinks = excluded.total_backlinks,
               follow_pct = excluded.follow_pct,
               estimated_da = excluded.estimated_da,
               metrics_json = excluded.metrics_json,
               updated_at = datetime('now')",
        )
        .bind(job_id)
        .bind(metrics.target_domain.as_str())
        .bind(metrics.referring_domains)
        .bind(metrics.total_backlinks)
        .bind(metrics.follow_pct)
        .bind(metrics.estimated_da)
        .bind(metrics_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE crawl_jobs SET status = 'completed' WHERE id = ?")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn job_status(&self, job_id: i64) -> Result<Option<JobStatusResponse>, StoreError> {
        let row = sqlx::query("SELECT status, error FROM crawl_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let status_str: String = row.get("status");
        let status = JobStatus::from_db_str(&status_str).unwrap_or(JobStatus::Failed);
        Ok(Some(JobStatusResponse {
            job_id,
            status,
            error: row.get("error"),
        }))
    }

    /// Most recent completed-job report for `target_domain`, if any.
    pub async fn latest_report(
        &self,
        target_domain: &Domain,
    ) -> Result<Option<MetricsReport>, StoreError> {
        let row = sqlx::query(
            "SELECT m.metrics_json, m.updated_at
               FROM crawl_metrics m
               JOIN crawl_jobs j ON j.id = m.job_id
              WHERE m.target_domain = ? AND j.status = 'completed'
              ORDER BY m.updated_at DESC
              LIMIT 1",
        )
        .bind(target_domain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let metrics_json: String = row.get("metrics_json");
        let updated_at: String = row.get("updated_at");
        let metrics: Metrics = serde_json::from_str(&metrics_json)?;
        Ok(Some(MetricsReport { metrics, updated_at }))
    }

    /// All referrer URLs previously ingested for `domain`, oldest first.
    /// Used as a fallback seed list when `/crawl` is called with an
    /// empty `seed_urls` for a domain that has had referrers ingested.
    pub async fn referrer_seed_urls(&self, domain: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT url FROM referrer_seeds WHERE domain = ? ORDER BY created_at ASC")
            .bind(domain)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("url")).collect())
    }

    /// Record externally-supplied referrer URLs for a domain, ignoring
    /// ones already seen. Returns the count of newly stored URLs.
    pub async fn store_referrer_seeds(
        &self,
        domain: &str,
        urls: &[String],
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = 0usize;
        for url in urls {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO referrer_seeds (domain, url) VALUES (?, ?)",
            )
            .bind(domain)
            .bind(url)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                stored += 1;
            }
        }
        tx.commit().await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::url::canonicalize;
    use crate::models::Link;

    async fn test_store() -> Store {
        Store::connect(":memory:").await.unwrap()
    }

    fn sample_page(domain: &str) -> Page {
        Page {
            url: canonicalize(&format!("https://{domain}/"), None).unwrap(),
            domain: Domain::from_raw(domain),
            title: Some("Title".to_string()),
            meta_description: None,
            canonical: None,
            links: vec![Link {
                href: canonicalize("https://example.com/target", None).unwrap(),
                anchor: "anchor".to_string(),
                rel: String::new(),
                is_internal: false,
                is_nofollow: false,
            }],
            internal_count: 0,
            external_count: 1,
            follow_count: 1,
            nofollow_count: 0,
        }
    }

    #[tokio::test]
    async fn create_job_then_status_is_pending() {
        let store = test_store().await;
        let target = Domain::from_raw("example.com");
        let job_id = store
            .create_job(&target, &["https://example.com/".to_string()])
            .await
            .unwrap();
        let status = store.job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Pending);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn mark_failed_records_error_message() {
        let store = test_store().await;
        let target = Domain::from_raw("example.com");
        let job_id = store.create_job(&target, &[]).await.unwrap();
        store.mark_failed(job_id, "robots fetch timed out").await.unwrap();
        let status = store.job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("robots fetch timed out"));
    }

    #[tokio::test]
    async fn store_crawl_persists_pages_and_marks_completed() {
        let store = test_store().await;
        let target = Domain::from_raw("example.com");
        let job_id = store.create_job(&target, &[]).await.unwrap();

        let pages = vec![sample_page("referrer.com")];
        let metrics = crate::graph::build_metrics(&pages, &target);

        store.store_crawl(job_id, &metrics, &pages).await.unwrap();

        let status = store.job_status(job_id).await.unwrap().unwrap();
        assert_eq!(status.status, JobStatus::Completed);

        let report = store.latest_report(&target).await.unwrap().unwrap();
        assert_eq!(report.metrics.total_backlinks, 1);
    }

    #[tokio::test]
    async fn latest_report_is_none_before_any_completed_job() {
        let store = test_store().await;
        let target = Domain::from_raw("example.com");
        assert!(store.latest_report(&target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn referrer_seed_urls_returns_ingested_urls() {
        let store = test_store().await;
        store
            .store_referrer_seeds("example.com", &["https://a.com/".to_string()])
            .await
            .unwrap();
        let urls = store.referrer_seed_urls("example.com").await.unwrap();
        assert_eq!(urls, vec!["https://a.com/".to_string()]);
        assert!(store
            .referrer_seed_urls("other.com")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn referrer_seeds_are_deduplicated() {
        let store = test_store().await;
        let first = store
            .store_referrer_seeds("example.com", &["https://a.com/".to_string()])
            .await
            .unwrap();
        let second = store
            .store_referrer_seeds(
                "example.com",
                &["https://a.com/".to_string(), "https://b.com/".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }
}
