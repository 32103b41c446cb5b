//! Crossref API client.
//!
//! The works search endpoint ranks poorly on long boolean expressions, so this
//! adapter fans out into several short topical phrase queries, runs them
//! concurrently and concatenates the results. Each sub-query is retried a
//! bounded number of times with a fixed delay; a sub-query that keeps failing
//! contributes nothing instead of failing the source.

use crate::error::{ObservatoryError, Result};
use crate::normalize::{normalize, RawItem};
use crate::paper::{Paper, Source};
use crate::sources::{PaperSource, MIN_PUBLICATION_YEAR};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Crossref API base URL
pub const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Topical phrase combinations, one request each
pub const SUB_QUERIES: &[&str] = &[
    "food safety \"machine learning\"",
    "food security \"artificial intelligence\"",
    "\"deep learning\" \"food quality\"",
    "\"computer vision\" \"food inspection\"",
    "food traceability",
    "food adulteration",
    "HACCP AI",
];

/// Rows requested per sub-query
const ROWS: &str = "100";

/// Sub-queries in flight at once unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 7;

/// Retry policy for a single sub-query
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Crossref works-search adapter with bounded retries and concurrency control
pub struct CrossrefClient {
    client: reqwest::Client,
    base_url: String,
    mailto: String,
    queries: Vec<String>,
    retry: RetryPolicy,
    semaphore: Arc<Semaphore>,
}

impl CrossrefClient {
    /// Create a new CrossrefClient
    ///
    /// # Arguments
    ///
    /// * `base_url` - Works endpoint, normally [`CROSSREF_API_URL`]
    /// * `mailto` - Contact address for the polite pool
    /// * `timeout` - Per-request timeout
    /// * `retry` - Attempts and fixed delay per sub-query
    pub fn new(base_url: &str, mailto: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("food-observatory/0.1 (mailto:{})", mailto))
            .timeout(timeout)
            .build()
            .map_err(|e| ObservatoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            mailto: mailto.to_string(),
            queries: SUB_QUERIES.iter().map(|q| q.to_string()).collect(),
            retry,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        })
    }

    /// Cap the number of sub-queries in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Replace the default sub-queries
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    /// Run one sub-query, retrying with a fixed delay.
    ///
    /// Returns an empty list once every attempt has failed.
    pub async fn run_query(&self, query: &str) -> Vec<Paper> {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return Vec::new();
        };

        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.do_query(query).await {
                Ok(papers) => {
                    debug!(query = query, count = papers.len(), "Crossref query complete");
                    return papers;
                }
                Err(e) => {
                    warn!(query = query, attempt = attempt, error = %e, "Crossref attempt failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        warn!(query = query, attempts = max_attempts, "All Crossref attempts failed");
        Vec::new()
    }

    /// Internal request implementation
    async fn do_query(&self, query: &str) -> Result<Vec<Paper>> {
        let filter = format!("from-pub-date:{}-01-01", MIN_PUBLICATION_YEAR);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", query),
                ("rows", ROWS),
                ("filter", filter.as_str()),
                ("mailto", self.mailto.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ObservatoryError::Api {
                code: status.as_u16(),
                message: format!("Crossref API error: {}", status),
            });
        }

        let data: CrossrefResponse = response.json().await.map_err(|e| {
            ObservatoryError::Parse(format!("Failed to parse Crossref response: {}", e))
        })?;

        if data.status.as_deref() != Some("ok") {
            debug!(status = ?data.status, "Crossref response not ok, no items");
            return Ok(Vec::new());
        }

        Ok(data
            .message
            .map(|m| m.items)
            .unwrap_or_default()
            .into_iter()
            .map(|item| normalize(RawItem::Crossref(item)))
            .filter(|p| p.date.is_some())
            .collect())
    }
}

#[async_trait]
impl PaperSource for CrossrefClient {
    fn source(&self) -> Source {
        Source::Crossref
    }

    async fn search(&self) -> Result<Vec<Paper>> {
        info!(count = self.queries.len(), "Starting Crossref sub-queries");

        let futures: Vec<_> = self.queries.iter().map(|q| self.run_query(q)).collect();
        let results = join_all(futures).await;

        Ok(results.into_iter().flatten().collect())
    }
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    status: Option<String>,
    message: Option<CrossrefMessage>,
}

#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<CrossrefItem>,
}

/// Work item as returned by the search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CrossrefItem {
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub author: Vec<CrossrefAuthor>,
    #[serde(default)]
    pub published: Option<CrossrefPublished>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrossrefAuthor {
    #[serde(default)]
    pub given: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrossrefPublished {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Option<i32>>>,
}
