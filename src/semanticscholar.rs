//! Semantic Scholar API Client
//!
//! Runs the observatory's topical query against the paper search endpoint.
//!
//! API Details:
//! - Search endpoint: GET /graph/v1/paper/search
//! - Max 100 papers per request (`limit`)
//! - `year=2023-` restricts results to 2023 onwards
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::error::{ObservatoryError, Result};
use crate::normalize::{normalize, RawItem};
use crate::paper::{Paper, Source};
use crate::sources::{PaperSource, MIN_PUBLICATION_YEAR};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Semantic Scholar API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested for every paper
const FIELDS: &str = "title,authors,year,abstract,url,publicationDate,externalIds";

/// Maximum papers per search request
const SEARCH_LIMIT: u32 = 100;

/// Paper as returned by the search endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S2Paper {
    pub title: Option<String>,
    pub authors: Option<Vec<S2Author>>,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub url: Option<String>,
    pub publication_date: Option<String>,
    pub external_ids: Option<S2ExternalIds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S2Author {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S2ExternalIds {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    #[serde(default)]
    data: Option<Vec<S2Paper>>,
}

/// Semantic Scholar search adapter
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base, normally [`SS_API_BASE`]
    /// * `api_key` - Optional API key for higher rate limits
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObservatoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// Topical query: domain terms AND AI/ML terms.
pub const TOPIC_QUERY: &str = "(food safety OR food security OR HACCP) AND \
(machine learning OR \"artificial intelligence\" OR \"deep learning\" OR \"computer vision\" \
OR hyperspectral OR \"generative adversarial networks\" OR \"reinforcement learning\" \
OR \"natural language processing\")";

#[async_trait]
impl PaperSource for SemanticScholarClient {
    fn source(&self) -> Source {
        Source::SemanticScholar
    }

    async fn search(&self) -> Result<Vec<Paper>> {
        let url = format!("{}/paper/search", self.base_url);
        let limit = SEARCH_LIMIT.to_string();
        let year = format!("{}-", MIN_PUBLICATION_YEAR);

        info!(query = TOPIC_QUERY, "Starting Semantic Scholar search");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("query", TOPIC_QUERY),
                ("fields", FIELDS),
                ("limit", limit.as_str()),
                ("year", year.as_str()),
            ]);

        // Add API key header if provided
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!(status = status.as_u16(), "Semantic Scholar query failed");
            return Err(ObservatoryError::Api {
                code: status.as_u16(),
                message: format!("Semantic Scholar API error: {}", status),
            });
        }

        let body: SSSearchResponse = response.json().await.map_err(|e| {
            ObservatoryError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })?;

        let items = body.data.unwrap_or_default();
        debug!(count = items.len(), "Semantic Scholar items received");

        Ok(items
            .into_iter()
            .map(|item| normalize(RawItem::SemanticScholar(item)))
            .collect())
    }
}
