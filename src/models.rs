use serde::{Deserialize, Serialize};

use crate::crawler::url::{Domain, Url};

/// Maximum character lengths enforced at extraction time.
pub const MAX_ANCHOR_LEN: usize = 500;
pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_META_DESCRIPTION_LEN: usize = 1000;

/// Truncate `s` to at most `max_chars` characters, respecting UTF-8
/// char boundaries.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// A single hyperlink extracted from a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub href: Url,
    pub anchor: String,
    pub rel: String,
    pub is_internal: bool,
    pub is_nofollow: bool,
}

/// One successfully fetched and parsed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub url: Url,
    pub domain: Domain,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<Url>,
    pub links: Vec<Link>,
    pub internal_count: u32,
    pub external_count: u32,
    pub follow_count: u32,
    pub nofollow_count: u32,
}

impl Page {
    /// Debug-only consistency check for the two rollup invariants.
    /// Always checked in tests; a `debug_assert` elsewhere.
    pub fn check_invariants(&self) {
        debug_assert_eq!(
            self.follow_count + self.nofollow_count,
            self.links.len() as u32,
            "follow_count + nofollow_count must equal links.len()"
        );
        debug_assert_eq!(
            self.internal_count + self.external_count,
            self.links.len() as u32,
            "internal_count + external_count must equal links.len()"
        );
    }
}

/// Status of a crawl job, as persisted in the job store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// One tuple in the link graph: an edge from an external referrer page
/// to a page on the job's target domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backlink {
    pub source_url: Url,
    pub target_url: Url,
    pub anchor: String,
    pub nofollow: bool,
}

/// Derived summary for one completed crawl job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub target_domain: Domain,
    pub referring_domains: u32,
    pub total_backlinks: u32,
    pub follow_count: u32,
    pub nofollow_count: u32,
    pub follow_pct: f64,
    pub estimated_da: f64,
    pub pages_crawled: u32,
    pub backlinks: Vec<Backlink>,
}

/// `Metrics` plus the timestamp of the completed job they came from, as
/// served by `GET /report/:domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub updated_at: String,
}

/// Crawl behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub max_pages: u32,
    pub max_concurrent: usize,
    pub request_delay_s: f64,
    pub per_request_timeout_s: u64,
    pub user_agent: String,
    pub respect_robots: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            max_pages: 500,
            max_concurrent: 5,
            request_delay_s: 1.0,
            per_request_timeout_s: 15,
            user_agent:
                "LinkGraphBot/1.0 (+https://example.invalid; self-hosted research crawler)"
                    .to_string(),
            respect_robots: true,
        }
    }
}

// --- Wire payloads for the HTTP surface ---

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    pub seed_urls: Vec<String>,
    pub target_domain: String,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlAccepted {
    pub job_id: i64,
    pub status: &'static str,
    pub target_domain: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: i64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestReferrersRequest {
    pub domain: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReferrersResponse {
    pub ok: bool,
    pub urls_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OffPageAnalyzeRequest {
    pub url: String,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OffPageAnalyzeResponse {
    #[serde(flatten)]
    pub metrics: Metrics,
    #[serde(rename = "demoData")]
    pub demo_data: bool,
}
