//! arXiv API client.
//!
//! The export API answers with an Atom feed. The feed is parsed with
//! `quick-xml`; malformed markup (mismatched or unclosed tags, a body that is
//! not a feed at all) is reported as a parse error, which the pipeline turns
//! into an empty result for this source.

use crate::error::{ObservatoryError, OptionExt, Result};
use crate::normalize::{normalize, RawItem};
use crate::paper::{Paper, Source};
use crate::sources::PaperSource;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use tracing::{debug, info};

/// arXiv export API base URL
pub const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

/// Boolean search expression in arXiv field syntax
pub const SEARCH_QUERY: &str = "(all:\"food safety\" OR all:\"food security\") AND \
(all:\"machine learning\" OR all:\"deep learning\" OR all:\"artificial intelligence\" \
OR all:\"computer vision\")";

const MAX_RESULTS: u32 = 100;

/// One `<entry>` of the Atom feed, text content only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArxivEntry {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub published: String,
    pub doi: Option<String>,
}

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("food-observatory/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| ObservatoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn search_url(&self) -> String {
        format!(
            "{}?search_query={}&sortBy=submittedDate&sortOrder=descending&max_results={}",
            self.base_url,
            urlencoding::encode(SEARCH_QUERY),
            MAX_RESULTS
        )
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    fn source(&self) -> Source {
        Source::Arxiv
    }

    async fn search(&self) -> Result<Vec<Paper>> {
        let url = self.search_url();
        info!("Starting arXiv search");
        debug!(url = %url, "Fetching arXiv feed");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ObservatoryError::Api {
                code: status.as_u16(),
                message: format!("arXiv API error: {}", status),
            });
        }

        let body = response.text().await?;
        let entries = parse_atom_feed(&body)?;
        debug!(count = entries.len(), "arXiv entries found");

        Ok(entries
            .into_iter()
            .map(|entry| normalize(RawItem::Arxiv(entry)))
            .collect())
    }
}

/// Parse an Atom feed into its entries.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<ArxivEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut saw_feed = false;
    // Local names of the currently open elements.
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut author_name = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "feed" if path.is_empty() => saw_feed = true,
                    "entry" => current = Some(ArxivEntry::default()),
                    "author" => author_name.clear(),
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| ObservatoryError::Parse(format!("Invalid XML text: {}", err)))?;
                push_text(&path, current.as_mut(), &mut author_name, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).to_string();
                push_text(&path, current.as_mut(), &mut author_name, &text);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match path.pop() {
                    Some(open) if open == name => {}
                    _ => {
                        return Err(ObservatoryError::Parse(format!(
                            "Unexpected closing tag </{}>",
                            name
                        )))
                    }
                }
                match name.as_str() {
                    "entry" => {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                    }
                    "author" => {
                        if let Some(entry) = current.as_mut() {
                            let name = author_name.trim();
                            if !name.is_empty() {
                                entry.authors.push(name.to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ObservatoryError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(ObservatoryError::Parse(format!(
            "Truncated XML, unclosed <{}>",
            path.join("><")
        )));
    }

    saw_feed
        .then_some(entries)
        .ok_or_parse("Invalid XML response: no <feed> root element")
}

fn push_text(path: &[String], entry: Option<&mut ArxivEntry>, author_name: &mut String, text: &str) {
    let Some(entry) = entry else {
        return;
    };
    let Some(tag) = path.last() else {
        return;
    };
    // Only direct children of <entry>, except author/name.
    let parent = path.len().checked_sub(2).and_then(|i| path.get(i));

    match (parent.map(String::as_str), tag.as_str()) {
        (Some("entry"), "id") => entry.id.push_str(text.trim()),
        (Some("entry"), "title") => entry.title.push_str(text),
        (Some("entry"), "summary") => entry.summary.push_str(text),
        (Some("entry"), "published") => entry.published.push_str(text.trim()),
        (Some("entry"), "doi") => entry.doi = Some(text.trim().to_string()),
        (Some("author"), "name") => author_name.push_str(text),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2405.01234v1</id>
    <published>2024-05-02T17:57:40Z</published>
    <title>Hyperspectral Imaging for
      Food Fraud &amp; Adulteration</title>
    <summary>We detect adulteration in olive oil.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Grace Hopper</name><arxiv:affiliation>Navy</arxiv:affiliation></author>
    <arxiv:doi>10.48550/arXiv.2405.01234</arxiv:doi>
    <link href="http://arxiv.org/abs/2405.01234v1" rel="alternate" type="text/html"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2403.00001v2</id>
    <published>2024-03-01T00:00:00Z</published>
    <title>Second</title>
    <summary><![CDATA[Plain <summary> text]]></summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let entries = parse_atom_feed(SAMPLE_ATOM).expect("Parse failed");
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id, "http://arxiv.org/abs/2405.01234v1");
        assert!(first.title.contains("Food Fraud & Adulteration"));
        assert_eq!(first.authors, vec!["Ada Lovelace".to_string(), "Grace Hopper".to_string()]);
        assert_eq!(first.published, "2024-05-02T17:57:40Z");
        assert_eq!(first.doi.as_deref(), Some("10.48550/arXiv.2405.01234"));

        assert_eq!(entries[1].summary, "Plain <summary> text");
        assert!(entries[1].authors.is_empty());
    }

    #[test]
    fn test_feed_title_is_not_an_entry() {
        let entries = parse_atom_feed(SAMPLE_ATOM).expect("Parse failed");
        assert!(entries.iter().all(|e| e.title != "ArXiv Query Results"));
    }

    #[test]
    fn test_malformed_markup_is_parse_error() {
        let mismatched = "<feed><entry><title>x</summary></entry></feed>";
        assert!(matches!(parse_atom_feed(mismatched), Err(ObservatoryError::Parse(_))));

        let truncated = "<feed><entry><title>cut off";
        assert!(matches!(parse_atom_feed(truncated), Err(ObservatoryError::Parse(_))));

        let not_a_feed = "<html><body>Rate limited</body></html>";
        assert!(matches!(parse_atom_feed(not_a_feed), Err(ObservatoryError::Parse(_))));
    }

    #[test]
    fn test_search_url_is_encoded() {
        let client = ArxivClient::new(ARXIV_API_URL, Duration::from_secs(10)).expect("client");
        let url = client.search_url();
        assert!(url.starts_with("https://export.arxiv.org/api/query?search_query=%28all%3A%22food%20safety%22"));
        assert!(url.ends_with("&sortBy=submittedDate&sortOrder=descending&max_results=100"));
    }

    #[tokio::test]
    async fn test_search_normalizes_entries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".to_string(), SEARCH_QUERY.to_string()),
                Matcher::UrlEncoded("sortBy".to_string(), "submittedDate".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(SAMPLE_ATOM)
            .expect(1)
            .create_async()
            .await;

        let client = ArxivClient::new(&format!("{}/api/query", server.url()), Duration::from_secs(5))
            .expect("client");
        let papers = client.search().await.expect("search");
        mock.assert_async().await;

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Hyperspectral Imaging for Food Fraud & Adulteration");
        assert_eq!(papers[0].date, chrono::NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(papers[0].url, "http://arxiv.org/abs/2405.01234v1");
        assert_eq!(papers[0].categories, vec!["Contaminant & Adulteration Detection".to_string()]);
        assert_eq!(papers[1].abstract_text, "Plain text");
    }

    #[tokio::test]
    async fn test_malformed_body_degrades_to_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<feed><entry><title>oops</entry>")
            .create_async()
            .await;

        let client = ArxivClient::new(&format!("{}/api/query", server.url()), Duration::from_secs(5))
            .expect("client");
        assert!(client.fetch().await.is_empty());
    }

    #[tokio::test]
    async fn test_slow_feed_times_out() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(800));
                w.write_all(SAMPLE_ATOM.as_bytes())
            })
            .create_async()
            .await;

        let client = ArxivClient::new(&format!("{}/api/query", server.url()), Duration::from_millis(100))
            .expect("client");
        let started = std::time::Instant::now();
        assert!(client.fetch().await.is_empty());
        assert!(started.elapsed() < Duration::from_millis(800));
    }
}
