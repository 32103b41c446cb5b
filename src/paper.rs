//! Canonical paper record shared by every pipeline stage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ObservatoryError;

/// Sentinel stored in [`Paper::url`] when the service gave no usable link.
pub const NO_LINK: &str = "#";

/// Placeholder title for records the service sent without one.
pub const UNTITLED: &str = "No title available";

/// Placeholder abstract for records the service sent without one.
pub const NO_ABSTRACT: &str = "No abstract available.";

/// External search service a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "SemanticScholar")]
    SemanticScholar,
    #[serde(rename = "Crossref")]
    Crossref,
    #[serde(rename = "arXiv")]
    Arxiv,
}

impl Source {
    /// All sources, in pipeline concatenation order.
    pub const ALL: [Source; 3] = [Source::SemanticScholar, Source::Arxiv, Source::Crossref];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::SemanticScholar => "SemanticScholar",
            Source::Crossref => "Crossref",
            Source::Arxiv => "arXiv",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ObservatoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semanticscholar" | "semantic_scholar" | "s2" => Ok(Source::SemanticScholar),
            "crossref" => Ok(Source::Crossref),
            "arxiv" => Ok(Source::Arxiv),
            other => Err(ObservatoryError::Config(format!("Unknown source: {}", other))),
        }
    }
}

/// A normalized, categorized paper.
///
/// Built once by the normalizer and never mutated afterwards; a new pipeline
/// run replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: Vec<String>,
    pub date: Option<NaiveDate>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
    pub doi: Option<String>,
    pub source: Source,
    /// Taxonomy labels in taxonomy order, never empty.
    pub categories: Vec<String>,
}

impl Paper {
    /// Key used for title deduplication.
    pub fn dedup_key(&self) -> String {
        self.title.trim().to_lowercase()
    }

    pub fn has_link(&self) -> bool {
        self.url != NO_LINK
    }

    pub fn in_any_category<'a, I>(&self, selected: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        selected.into_iter().any(|c| self.categories.contains(c))
    }
}
