use std::time::Duration;

use super::url::Url;

/// Outcome of a single fetch attempt. Non-200 responses and transport
/// errors both collapse to `Skipped` -- the crawler treats a skip as
/// "do nothing, the frontier continues" rather than a hard failure.
pub enum FetchOutcome {
    Fetched { final_url: String, body: String },
    Skipped { reason: String },
}

/// HTTP client used by the crawler. One client is shared across all
/// workers of a single crawl job; redirects, timeouts, and the
/// user-agent header are all fixed for the lifetime of the job.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .pool_max_idle_per_host(20)
            .build()
            .expect("failed to build HTTP client");
        Fetcher { client }
    }

    /// GET `url`. Follows redirects. Returns `Skipped` (not an error) on
    /// any non-200 response or transport failure.
    pub async fn get(&self, url: &Url) -> FetchOutcome {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return FetchOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };

        if !response.status().is_success() {
            return FetchOutcome::Skipped {
                reason: format!("HTTP {}", response.status()),
            };
        }

        let final_url = response.url().to_string();
        match response.text().await {
            Ok(body) => FetchOutcome::Fetched { final_url, body },
            Err(e) => FetchOutcome::Skipped {
                reason: e.to_string(),
            },
        }
    }
}
