//! Source adapter seam.
//!
//! Each adapter wraps one external search service. `search` may fail; `fetch`
//! is what the pipeline calls, and it turns every failure into an empty list
//! so one broken service never blocks the others.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::paper::{Paper, Source};

/// Earliest publication year requested from the services.
pub const MIN_PUBLICATION_YEAR: i32 = 2023;

#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Which service this adapter talks to.
    fn source(&self) -> Source;

    /// Query the service and return normalized papers.
    async fn search(&self) -> Result<Vec<Paper>>;

    /// Like [`search`](Self::search), but failures degrade to an empty list.
    async fn fetch(&self) -> Vec<Paper> {
        match self.search().await {
            Ok(papers) => {
                info!(source = %self.source(), count = papers.len(), "Source search complete");
                papers
            }
            Err(e) => {
                warn!(source = %self.source(), error = %e, "Source search failed");
                Vec::new()
            }
        }
    }
}
