use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::url::{Domain, Url};

/// Parsed robots.txt rules for a single domain. A domain with no
/// reachable or parseable robots.txt gets an empty (permissive) ruleset.
#[derive(Debug, Default)]
struct RobotsRules {
    /// lowercase user-agent -> disallowed path prefixes
    disallow: HashMap<String, Vec<String>>,
}

impl RobotsRules {
    fn allows(&self, path: &str, user_agent: &str) -> bool {
        let ua_lower = user_agent.to_lowercase();
        for agent in [ua_lower.as_str(), "*"] {
            if let Some(patterns) = self.disallow.get(agent) {
                for pattern in patterns {
                    if !pattern.is_empty() && path.starts_with(pattern.as_str()) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn parse(content: &str) -> Self {
        let mut disallow: HashMap<String, Vec<String>> = HashMap::new();
        let mut current_agents: Vec<String> = Vec::new();

        for raw_line in content.lines() {
            let line = match raw_line.find('#') {
                Some(idx) => raw_line[..idx].trim(),
                None => raw_line.trim(),
            };

            if line.is_empty() {
                current_agents.clear();
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => current_agents.push(value.to_lowercase()),
                "disallow" => {
                    for agent in &current_agents {
                        disallow
                            .entry(agent.clone())
                            .or_default()
                            .push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        RobotsRules { disallow }
    }
}

/// Process-wide robots.txt cache, shared across crawl jobs and keyed by
/// domain. A domain is fetched and parsed at most once; a fetch failure
/// of any kind is cached as a permissive (no-rules) entry so a broken
/// robots endpoint never blocks a whole crawl.
pub struct RobotsCache {
    entries: RwLock<HashMap<Domain, Arc<RobotsRules>>>,
    client: reqwest::Client,
}

impl RobotsCache {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build robots HTTP client");
        RobotsCache {
            entries: RwLock::new(HashMap::new()),
            client,
        }
    }

    /// True if `url` may be fetched by `user_agent` according to the
    /// cached (or freshly fetched) robots.txt for its domain.
    pub async fn allowed(&self, domain: &Domain, url: &Url, user_agent: &str) -> bool {
        let rules = self.rules_for(domain).await;
        let path = ::url::Url::parse(url.as_str())
            .map(|u| {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            })
            .unwrap_or_default();
        rules.allows(&path, user_agent)
    }

    async fn rules_for(&self, domain: &Domain) -> Arc<RobotsRules> {
        {
            let cache = self.entries.read().await;
            if let Some(rules) = cache.get(domain) {
                return rules.clone();
            }
        }

        let rules = Arc::new(self.fetch(domain).await);

        let mut cache = self.entries.write().await;
        cache
            .entry(domain.clone())
            .or_insert_with(|| rules.clone())
            .clone()
    }

    async fn fetch(&self, domain: &Domain) -> RobotsRules {
        let robots_url = format!("https://{}/robots.txt", domain.as_str());
        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsRules::parse(&body),
                Err(e) => {
                    tracing::warn!(domain = %domain, error = %e, "failed to read robots.txt body");
                    RobotsRules::default()
                }
            },
            Ok(resp) => {
                tracing::debug!(domain = %domain, status = %resp.status(), "robots.txt not available");
                RobotsRules::default()
            }
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "robots.txt fetch failed, allowing all");
                RobotsRules::default()
            }
        }
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}
