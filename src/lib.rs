pub mod config;
pub mod crawler;
pub mod graph;
pub mod jobs;
pub mod models;
pub mod server;
pub mod store;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::crawler::robots::RobotsCache;
use crate::crawler::CrawlEngine;
use crate::jobs::JobManager;
use crate::store::Store;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub engine: Arc<CrawlEngine>,
    pub job_manager: Arc<JobManager>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<Store>) -> Self {
        let fetcher = crawler::fetcher::Fetcher::new(
            &config.default_user_agent,
            std::time::Duration::from_secs(config.default_request_timeout_s),
        );
        let engine = Arc::new(CrawlEngine::new(fetcher, Arc::new(RobotsCache::new())));
        let job_manager = Arc::new(JobManager::new(config.clone(), store.clone(), engine.clone()));
        AppState {
            config,
            store,
            engine,
            job_manager,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        .route("/crawl", post(server::routes::create_crawl))
        .route("/jobs/{id}", get(server::routes::get_job_status))
        .route("/report/{domain}", get(server::routes::get_report))
        .route("/off-page-analyze", post(server::routes::off_page_analyze))
        .route("/ingest-referrers", post(server::routes::ingest_referrers))
        .route("/health", get(server::routes::health));

    routes
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
