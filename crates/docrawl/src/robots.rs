use std::sync::Arc;

use dashmap::DashMap;
use robots_txt::{Robots, matcher::SimpleMatcher};
use url::Url;

/// Per-run robots.txt policy consulted by every dispatch unit.
pub enum RobotsPolicy {
    /// Fetch every URL without consulting robots.txt (the default).
    Ignore,
    /// Fetch and cache robots.txt per host, skipping disallowed URLs.
    Respect(RobotsCache),
}

impl RobotsPolicy {
    pub async fn allows(&self, url: &Url) -> bool {
        match self {
            RobotsPolicy::Ignore => true,
            RobotsPolicy::Respect(cache) => cache.is_allowed(url).await,
        }
    }
}

/// Concurrent per-host cache of robots.txt bodies.
///
/// A missing or unreadable robots.txt means the host is fully allowed.
/// The cache is shared across dispatch units, so each host is fetched at
/// most a handful of times even under heavy concurrency.
pub struct RobotsCache {
    client: reqwest::Client,
    user_agent: String,
    by_host: DashMap<String, Arc<Option<String>>>,
}

impl RobotsCache {
    pub fn new(client: reqwest::Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            by_host: DashMap::new(),
        }
    }

    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            // No host means nothing to check against.
            return true;
        };
        let key = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let body = if let Some(cached) = self.by_host.get(&key) {
            Arc::clone(cached.value())
        } else {
            let fetched = Arc::new(self.fetch_robots(url).await);
            self.by_host.insert(key, Arc::clone(&fetched));
            fetched
        };

        match body.as_ref() {
            None => true,
            Some(text) => {
                let robots = Robots::from_str_lossy(text);
                let section = robots.choose_section(&self.user_agent);
                SimpleMatcher::new(&section.rules).check_path(url.path())
            }
        }
    }

    async fn fetch_robots(&self, url: &Url) -> Option<String> {
        let robots_url = url.join("/robots.txt").ok()?;
        tracing::info!("Fetching robots.txt from {}", robots_url);

        match self.client.get(robots_url.clone()).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                tracing::warn!(
                    "robots.txt at {} returned HTTP {}, allowing crawl",
                    robots_url,
                    response.status()
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Error fetching robots.txt from {}: {}, allowing crawl",
                    robots_url,
                    e
                );
                None
            }
        }
    }
}
