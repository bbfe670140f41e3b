use std::env;

use crate::models::CrawlConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub max_concurrent_jobs: usize,
    pub max_concurrent_fetches: usize,
    pub default_max_pages: u32,
    pub default_request_delay_s: f64,
    pub default_request_timeout_s: u64,
    pub default_user_agent: String,
    pub default_respect_robots: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("PORT", "must be a valid u16"))?;

        let database_path =
            env::var("SCRAPER_ENGINE_DB").unwrap_or_else(|_| "scraper_engine.db".to_string());

        let max_concurrent_jobs = env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_JOBS", "must be a valid usize")
            })?;

        let max_concurrent_fetches = env::var("MAX_CONCURRENT_FETCHES")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_FETCHES", "must be a valid usize")
            })?;

        let default_max_pages = env::var("DEFAULT_MAX_PAGES")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue("DEFAULT_MAX_PAGES", "must be a valid u32"))?;

        let default_request_delay_s = env::var("DEFAULT_REQUEST_DELAY_S")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse::<f64>()
            .map_err(|_| {
                ConfigError::InvalidValue("DEFAULT_REQUEST_DELAY_S", "must be a valid f64")
            })?;

        let default_request_timeout_s = env::var("DEFAULT_REQUEST_TIMEOUT_S")
            .unwrap_or_else(|_| "15".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("DEFAULT_REQUEST_TIMEOUT_S", "must be a valid u64")
            })?;

        let default_user_agent = env::var("DEFAULT_USER_AGENT").unwrap_or_else(|_| {
            "LinkGraphBot/1.0 (+https://example.invalid; self-hosted research crawler)"
                .to_string()
        });

        let default_respect_robots = env::var("DEFAULT_RESPECT_ROBOTS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Config {
            port,
            database_path,
            max_concurrent_jobs,
            max_concurrent_fetches,
            default_max_pages,
            default_request_delay_s,
            default_request_timeout_s,
            default_user_agent,
            default_respect_robots,
        })
    }

    /// Build a `CrawlConfig` for a new job, applying the request's
    /// `max_pages` override (if any) on top of the configured default.
    pub fn default_crawl_config(&self, max_pages_override: Option<u32>) -> CrawlConfig {
        CrawlConfig {
            max_pages: max_pages_override.unwrap_or(self.default_max_pages),
            max_concurrent: self.max_concurrent_fetches,
            request_delay_s: self.default_request_delay_s,
            per_request_timeout_s: self.default_request_timeout_s,
            user_agent: self.default_user_agent.clone(),
            respect_robots: self.default_respect_robots,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, &'static str),
}
