//! Normalizer: service-specific raw items → canonical [`Paper`].
//!
//! All field sanitization happens here. Nothing downstream re-validates URLs
//! or DOIs, so every text field leaves this module truncated and free of
//! markup.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::arxiv::ArxivEntry;
use crate::categorize;
use crate::crossref::CrossrefItem;
use crate::paper::{Paper, Source, NO_ABSTRACT, NO_LINK, UNTITLED};
use crate::semanticscholar::S2Paper;

pub const MAX_TITLE_CHARS: usize = 300;
pub const MAX_ABSTRACT_CHARS: usize = 3000;
pub const MAX_AUTHOR_CHARS: usize = 100;
pub const MAX_AUTHORS: usize = 10;

const ELLIPSIS: &str = "...";

static DOI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,}/\S+$").expect("DOI pattern is valid"));

// Also matches a dangling unterminated tag at the end of the text.
static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[^>]+(>|$)").expect("tag pattern is valid"));

/// One raw item per source adapter, exactly as the service shaped it.
#[derive(Debug, Clone)]
pub enum RawItem {
    SemanticScholar(S2Paper),
    Crossref(CrossrefItem),
    Arxiv(ArxivEntry),
}

/// Normalize and categorize one raw item.
pub fn normalize(raw: RawItem) -> Paper {
    let fields = match raw {
        RawItem::SemanticScholar(item) => from_semantic_scholar(item),
        RawItem::Crossref(item) => from_crossref(item),
        RawItem::Arxiv(entry) => from_arxiv(entry),
    };
    fields.finish()
}

/// Unsanitized fields pulled out of a raw item.
struct Fields {
    source: Source,
    title: Option<String>,
    authors: Vec<String>,
    date: Option<NaiveDate>,
    abstract_text: Option<String>,
    url: Option<String>,
    doi: Option<String>,
}

impl Fields {
    fn finish(self) -> Paper {
        let title = self
            .title
            .map(|t| clean_text(&t))
            .filter(|t| !t.is_empty())
            .map(|t| truncate_text(&t, MAX_TITLE_CHARS))
            .unwrap_or_else(|| UNTITLED.to_string());

        let abstract_text = self
            .abstract_text
            .map(|a| clean_text(&a))
            .filter(|a| !a.is_empty())
            .map(|a| truncate_text(&a, MAX_ABSTRACT_CHARS))
            .unwrap_or_else(|| NO_ABSTRACT.to_string());

        let authors = self
            .authors
            .iter()
            .map(|a| clean_text(a))
            .filter(|a| !a.is_empty())
            .take(MAX_AUTHORS)
            .map(|a| truncate_text(&a, MAX_AUTHOR_CHARS))
            .collect();

        let categories = categorize::categorize(&title, &abstract_text);

        Paper {
            title,
            authors,
            date: self.date,
            abstract_text,
            url: sanitize_url(self.url.as_deref()),
            doi: sanitize_doi(self.doi.as_deref()),
            source: self.source,
            categories,
        }
    }
}

fn from_semantic_scholar(item: S2Paper) -> Fields {
    // Full publication date when present, otherwise the publication year.
    let date = item
        .publication_date
        .as_deref()
        .and_then(parse_iso_date)
        .or_else(|| item.year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)));

    Fields {
        source: Source::SemanticScholar,
        title: item.title,
        authors: item
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .collect(),
        date,
        abstract_text: item.abstract_text,
        url: item.url,
        doi: item.external_ids.and_then(|ids| ids.doi),
    }
}

fn from_crossref(item: CrossrefItem) -> Fields {
    let authors = item
        .author
        .iter()
        .map(|a| {
            format!(
                "{} {}",
                a.given.as_deref().unwrap_or(""),
                a.family.as_deref().unwrap_or("")
            )
        })
        .collect();

    let date = item
        .published
        .as_ref()
        .and_then(|p| p.date_parts.first())
        .and_then(|parts| date_from_parts(parts));

    Fields {
        source: Source::Crossref,
        title: item.title.into_iter().next(),
        authors,
        date,
        abstract_text: item.abstract_text.map(|a| strip_markup(&a)),
        url: item.url,
        doi: item.doi,
    }
}

fn from_arxiv(entry: ArxivEntry) -> Fields {
    Fields {
        source: Source::Arxiv,
        title: Some(entry.title),
        authors: entry.authors,
        date: parse_iso_date(&entry.published),
        abstract_text: Some(entry.summary),
        url: Some(entry.id),
        doi: entry.doi,
    }
}

/// Crossref `date-parts`: `[year, month?, day?]`, missing parts default to 1.
fn date_from_parts(parts: &[Option<i32>]) -> Option<NaiveDate> {
    let year = parts.first().copied().flatten()?;
    let month = parts.get(1).copied().flatten().unwrap_or(1);
    let day = parts.get(2).copied().flatten().unwrap_or(1);
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Keep only `http`/`https` URLs; anything else becomes [`NO_LINK`].
pub fn sanitize_url(url: Option<&str>) -> String {
    let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return NO_LINK.to_string();
    };

    match Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => raw.to_string(),
        Ok(parsed) => {
            tracing::debug!(scheme = parsed.scheme(), "Rejected URL scheme");
            NO_LINK.to_string()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Invalid URL detected");
            NO_LINK.to_string()
        }
    }
}

/// Keep a DOI only when it has the `10.NNNN/suffix` shape.
pub fn sanitize_doi(doi: Option<&str>) -> Option<String> {
    doi.map(str::trim)
        .filter(|d| DOI_PATTERN.is_match(d))
        .map(str::to_string)
}

/// Remove markup tags such as the JATS `<jats:p>` wrappers.
pub fn strip_markup(text: &str) -> String {
    TAG_PATTERN.replace_all(text, "").into_owned()
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Strip tags, drop control characters and collapse whitespace runs.
fn clean_text(text: &str) -> String {
    strip_markup(text)
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
