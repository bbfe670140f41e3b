use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::crawler::url;
use crate::graph;
use crate::jobs::CrawlJobPayload;
use crate::models::{
    CrawlAccepted, CrawlRequest, IngestReferrersRequest, IngestReferrersResponse,
    JobStatusResponse, MetricsReport, OffPageAnalyzeRequest, OffPageAnalyzeResponse,
};
use crate::AppState;

/// Crawls kicked off synchronously via `/off-page-analyze` are capped
/// well below the configured background-job default so a single
/// request can't tie up the process indefinitely.
const OFF_PAGE_ANALYZE_MAX_PAGES: u32 = 500;

pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// POST /crawl
///
/// Enqueues a crawl job and returns immediately. The crawl runs in the
/// background via `JobManager`; poll `GET /report/:domain` for results.
pub async fn create_crawl(
    State(state): State<AppState>,
    Json(req): Json<CrawlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.target_domain.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "target_domain is required".to_string(),
        ));
    }
    let target_domain = url::resolve_domain(&req.target_domain);
    if target_domain.as_str().is_empty() {
        return Err(ApiError::InvalidInput("target_domain is invalid".to_string()));
    }

    let seed_urls = if req.seed_urls.is_empty() {
        state
            .store
            .referrer_seed_urls(target_domain.as_str())
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
    } else {
        req.seed_urls.clone()
    };
    if seed_urls.is_empty() {
        return Err(ApiError::InvalidInput(
            "seed_urls is required (or ingest referrers for this domain first)".to_string(),
        ));
    }

    let job_id = state
        .store
        .create_job(&target_domain, &seed_urls)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .job_manager
        .submit(CrawlJobPayload {
            job_id,
            target_domain: target_domain.clone(),
            seed_urls,
            max_pages: req.max_pages,
        })
        .await;

    tracing::info!(job_id, target_domain = %target_domain, "crawl job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(CrawlAccepted {
            job_id,
            status: "queued",
            target_domain: target_domain.to_string(),
        }),
    ))
}

/// GET /jobs/:id
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    state
        .store
        .job_status(job_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no job with id {job_id}")))
}

/// GET /report/:domain
///
/// Returns the most recent completed crawl's metrics for `domain`.
pub async fn get_report(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<MetricsReport>, ApiError> {
    let target_domain = url::resolve_domain(&domain);
    state
        .store
        .latest_report(&target_domain)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no completed crawl for domain: {domain}")))
}

/// POST /off-page-analyze
///
/// Synchronous whole-site crawl starting from `url`, returning the
/// derived metrics directly rather than queuing a background job.
pub async fn off_page_analyze(
    State(state): State<AppState>,
    Json(req): Json<OffPageAnalyzeRequest>,
) -> Result<Json<OffPageAnalyzeResponse>, ApiError> {
    if req.url.trim().is_empty() {
        return Err(ApiError::InvalidInput("url is required".to_string()));
    }

    let target_domain = match req.domain.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(domain) => url::resolve_domain(domain),
        None => {
            let parsed = url::canonicalize(&req.url, None)
                .map_err(|_| ApiError::InvalidInput("domain required or provide a valid url".to_string()))?;
            url::domain_of(&parsed)
        }
    };

    let mut cfg = state.config.default_crawl_config(None);
    cfg.max_pages = OFF_PAGE_ANALYZE_MAX_PAGES;

    let cancel = tokio_util::sync::CancellationToken::new();
    let pages = state
        .engine
        .crawl(&[req.url.clone()], &target_domain, &cfg, cancel)
        .await
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let metrics = graph::build_metrics(&pages, &target_domain);
    tracing::info!(
        target_domain = %target_domain,
        pages_crawled = metrics.pages_crawled,
        referring_domains = metrics.referring_domains,
        "off-page analysis complete"
    );

    Ok(Json(OffPageAnalyzeResponse {
        metrics,
        demo_data: false,
    }))
}

/// POST /ingest-referrers
///
/// Records candidate referrer URLs for `domain` so a later `/crawl`
/// with an empty `seed_urls` can use them as seeds.
pub async fn ingest_referrers(
    State(state): State<AppState>,
    Json(req): Json<IngestReferrersRequest>,
) -> Result<Json<IngestReferrersResponse>, ApiError> {
    if req.domain.trim().is_empty() || req.urls.is_empty() {
        return Err(ApiError::InvalidInput(
            "domain and urls are required".to_string(),
        ));
    }
    let target_domain = url::resolve_domain(&req.domain);
    let stored = state
        .store
        .store_referrer_seeds(target_domain.as_str(), &req.urls)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(IngestReferrersResponse {
        ok: true,
        urls_count: stored,
    }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
