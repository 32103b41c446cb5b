//! Runtime configuration: endpoints, timeouts, retry policy and storage.

use crate::arxiv::{ArxivClient, ARXIV_API_URL};
use crate::cache::{default_data_dir, CacheStore, FRESHNESS_HOURS};
use crate::crossref::{CrossrefClient, RetryPolicy, CROSSREF_API_URL, DEFAULT_CONCURRENCY};
use crate::error::Result;
use crate::pipeline::Orchestrator;
use crate::semanticscholar::{SemanticScholarClient, SS_API_BASE};
use crate::sources::{PaperSource, MIN_PUBLICATION_YEAR};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Contact address sent to Crossref when none is configured.
pub const DEFAULT_MAILTO: &str = "observatory@example.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub semantic_scholar_url: String,
    pub semantic_scholar_api_key: Option<String>,
    pub semantic_scholar_timeout: Duration,
    pub crossref_url: String,
    pub crossref_timeout: Duration,
    pub crossref_retry: RetryPolicy,
    /// Crossref sub-queries in flight at once
    pub crossref_concurrency: usize,
    pub mailto: String,
    pub arxiv_url: String,
    pub arxiv_timeout: Duration,
    pub cutoff: NaiveDate,
    pub freshness: chrono::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_else(|_| PathBuf::from(".")),
            semantic_scholar_url: SS_API_BASE.to_string(),
            semantic_scholar_api_key: None,
            semantic_scholar_timeout: Duration::from_secs(15),
            crossref_url: CROSSREF_API_URL.to_string(),
            crossref_timeout: Duration::from_secs(15),
            crossref_retry: RetryPolicy::default(),
            crossref_concurrency: DEFAULT_CONCURRENCY,
            mailto: DEFAULT_MAILTO.to_string(),
            arxiv_url: ARXIV_API_URL.to_string(),
            arxiv_timeout: Duration::from_secs(10),
            cutoff: NaiveDate::from_ymd_opt(MIN_PUBLICATION_YEAR, 1, 1).unwrap_or(NaiveDate::MIN),
            freshness: chrono::Duration::hours(FRESHNESS_HOURS),
        }
    }
}

impl Config {
    /// Defaults overridden by `OBSERVATORY_DATA_DIR`, `OBSERVATORY_MAILTO`,
    /// `OBSERVATORY_CROSSREF_CONCURRENCY` and `SEMANTIC_SCHOLAR_API_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(dir) = non_empty("OBSERVATORY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(mailto) = non_empty("OBSERVATORY_MAILTO") {
            config.mailto = mailto;
        }
        if let Some(limit) = non_empty("OBSERVATORY_CROSSREF_CONCURRENCY").and_then(|v| v.parse::<usize>().ok()) {
            config.crossref_concurrency = limit.max(1);
        }
        config.semantic_scholar_api_key = non_empty("SEMANTIC_SCHOLAR_API_KEY");
        config
    }

    /// The three adapters, in concatenation order.
    pub fn build_sources(&self) -> Result<Vec<Arc<dyn PaperSource>>> {
        let sources: Vec<Arc<dyn PaperSource>> = vec![
            Arc::new(SemanticScholarClient::new(
                &self.semantic_scholar_url,
                self.semantic_scholar_api_key.clone(),
                self.semantic_scholar_timeout,
            )?),
            Arc::new(ArxivClient::new(&self.arxiv_url, self.arxiv_timeout)?),
            Arc::new(CrossrefClient::new(
                &self.crossref_url,
                &self.mailto,
                self.crossref_timeout,
                self.crossref_retry,
            )?
            .with_concurrency(self.crossref_concurrency)),
        ];
        Ok(sources)
    }

    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(&self.data_dir)
    }

    pub fn orchestrator(&self) -> Result<Orchestrator> {
        Ok(Orchestrator::new(
            self.build_sources()?,
            self.cache_store(),
            self.cutoff,
            self.freshness,
        ))
    }
}
