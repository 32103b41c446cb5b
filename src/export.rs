//! JSON, CSV and Markdown exports of the full working set.

use crate::error::{ObservatoryError, Result};
use crate::filter::DateBounds;
use crate::paper::Paper;
use crate::pipeline::PipelineContext;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Prefix of every exported file name
pub const EXPORT_PREFIX: &str = "foodSafetyAI-Observatory";

pub const EXPORT_NOTE: &str = "Generated by Food Safety & Security AI Observatory";

/// Abstracts are cut to this many characters in CSV output.
pub const CSV_ABSTRACT_CHARS: usize = 500;

const CSV_HEADERS: [&str; 7] = ["Title", "Authors", "Date", "Categories", "DOI", "URL", "Abstract"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ObservatoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(ObservatoryError::Config(format!("Unknown export format: {}", other))),
        }
    }
}

/// `foodSafetyAI-Observatory-YYYY-MM-DD.<ext>`
pub fn export_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!("{}-{}.{}", EXPORT_PREFIX, date.format("%Y-%m-%d"), format.extension())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    export_date: DateTime<Utc>,
    total_papers: usize,
    date_range: &'a DateBounds,
    categories: &'a [String],
    papers: Vec<NotedPaper<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotedPaper<'a> {
    #[serde(flatten)]
    paper: &'a Paper,
    export_note: &'static str,
}

pub fn to_json(context: &PipelineContext, exported_at: DateTime<Utc>) -> Result<String> {
    let export = JsonExport {
        export_date: exported_at,
        total_papers: context.papers.len(),
        date_range: &context.bounds,
        categories: &context.categories,
        papers: context
            .papers
            .iter()
            .map(|paper| NotedPaper {
                paper,
                export_note: EXPORT_NOTE,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Write every paper as one fully quoted CSV row.
pub fn write_csv<W: Write>(writer: W, papers: &[Paper]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    wtr.write_record(CSV_HEADERS)?;
    for paper in papers {
        let authors = paper.authors.join("; ");
        let date = paper.date.map(|d| d.to_string()).unwrap_or_default();
        let categories = paper.categories.join("; ");
        let abstract_text: String = paper.abstract_text.chars().take(CSV_ABSTRACT_CHARS).collect();
        wtr.write_record([
            paper.title.as_str(),
            authors.as_str(),
            date.as_str(),
            categories.as_str(),
            paper.doi.as_deref().unwrap_or(""),
            paper.url.as_str(),
            abstract_text.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Report grouped by category, labels sorted, newest paper first.
pub fn to_markdown(context: &PipelineContext, today: NaiveDate) -> String {
    let papers = &context.papers;
    let fmt_date = |d: Option<NaiveDate>| d.map_or_else(|| "N/A".to_string(), |d| d.to_string());

    let mut categories = context.categories.clone();
    categories.sort();

    let mut md = String::from("# Food Safety & Security AI Observatory\n\n");
    // Writing into a String cannot fail.
    let _ = writeln!(md, "**Generated:** {}  ", today);
    let _ = writeln!(md, "**Total Papers:** {}  ", papers.len());
    let _ = writeln!(
        md,
        "**Date Range:** {} - {}  \n",
        fmt_date(context.bounds.min_date),
        fmt_date(context.bounds.max_date)
    );

    md.push_str("## Categories\n\n");
    for category in &categories {
        let count = papers.iter().filter(|p| p.categories.contains(category)).count();
        let _ = writeln!(md, "- **{}**: {} papers", category, count);
    }
    md.push('\n');

    for category in &categories {
        let mut in_category: Vec<&Paper> = papers.iter().filter(|p| p.categories.contains(category)).collect();
        if in_category.is_empty() {
            continue;
        }
        in_category.sort_by(|a, b| b.date.cmp(&a.date));

        let _ = writeln!(md, "## {} ({} papers)\n", category, in_category.len());
        for paper in in_category {
            let _ = writeln!(md, "### {}\n", paper.title);
            let authors = if paper.authors.is_empty() {
                "N/A".to_string()
            } else {
                paper.authors.join(", ")
            };
            let _ = writeln!(md, "**Authors:** {}  ", authors);
            let _ = writeln!(md, "**Date:** {}  ", fmt_date(paper.date));
            if let Some(doi) = &paper.doi {
                let _ = writeln!(md, "**DOI:** [{}](https://doi.org/{})  ", doi, doi);
            }
            if paper.has_link() {
                let _ = writeln!(md, "**URL:** [Paper Link]({})  ", paper.url);
            }
            let _ = writeln!(md, "**Categories:** {}  \n", paper.categories.join(", "));
            let _ = writeln!(md, "**Abstract:** \n{}\n", paper.abstract_text);
            md.push_str("---\n\n");
        }
    }

    md
}

/// Write one export into `dir` and return the file path.
pub fn export_to_dir(
    format: ExportFormat,
    dir: &Path,
    context: &PipelineContext,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(format, now.date_naive()));

    match format {
        ExportFormat::Json => std::fs::write(&path, to_json(context, now)?)?,
        ExportFormat::Csv => write_csv(std::fs::File::create(&path)?, &context.papers)?,
        ExportFormat::Markdown => std::fs::write(&path, to_markdown(context, now.date_naive()))?,
    }

    info!(path = ?path, count = context.papers.len(), "Export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{Source, NO_LINK};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn context() -> PipelineContext {
        PipelineContext::from_papers(vec![
            Paper {
                title: "Robot \"pickers\" for berries".to_string(),
                authors: vec!["Ada Lovelace".to_string(), "Grace Hopper".to_string()],
                date: NaiveDate::from_ymd_opt(2024, 5, 2),
                abstract_text: "a".repeat(600),
                url: "https://example.org/robot".to_string(),
                doi: Some("10.1234/robot".to_string()),
                source: Source::Arxiv,
                categories: vec!["Robotics & Automation".to_string(), "Other".to_string()],
            },
            Paper {
                title: "Older robot study".to_string(),
                authors: vec![],
                date: NaiveDate::from_ymd_opt(2023, 7, 1),
                abstract_text: "No abstract available.".to_string(),
                url: NO_LINK.to_string(),
                doi: None,
                source: Source::Crossref,
                categories: vec!["Robotics & Automation".to_string()],
            },
        ])
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 8, 30, 0).single().expect("valid timestamp")
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date");
        assert_eq!(export_filename(ExportFormat::Markdown, date), "foodSafetyAI-Observatory-2025-01-15.md");
        assert_eq!("csv".parse::<ExportFormat>().expect("known"), ExportFormat::Csv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_export() -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(&to_json(&context(), now())?)?;
        assert_eq!(value["totalPapers"], 2);
        assert_eq!(value["dateRange"]["maxDate"], "2024-05-02");
        assert_eq!(value["categories"][0], "Robotics & Automation");
        assert_eq!(value["papers"][0]["exportNote"], EXPORT_NOTE);
        assert_eq!(value["papers"][0]["source"], "arXiv");
        assert!(value["exportDate"].as_str().is_some_and(|s| s.starts_with("2025-01-15T08:30:00")));
        Ok(())
    }

    #[test]
    fn test_csv_export() -> Result<()> {
        let mut buf = Vec::new();
        write_csv(&mut buf, &context().papers)?;
        let text = String::from_utf8(buf).expect("utf-8");
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("\"Title\",\"Authors\",\"Date\",\"Categories\",\"DOI\",\"URL\",\"Abstract\"")
        );
        let row = lines.next().expect("first row");
        assert!(row.starts_with("\"Robot \"\"pickers\"\" for berries\",\"Ada Lovelace; Grace Hopper\",\"2024-05-02\""));
        assert!(row.contains(&format!("\"{}\"", "a".repeat(CSV_ABSTRACT_CHARS))));
        assert!(!row.contains(&"a".repeat(CSV_ABSTRACT_CHARS + 1)));
        assert!(lines.next().expect("second row").contains(",\"\",\"#\","));
        Ok(())
    }

    #[test]
    fn test_markdown_export() {
        let md = to_markdown(&context(), now().date_naive());
        assert!(md.starts_with("# Food Safety & Security AI Observatory\n\n**Generated:** 2025-01-15  \n"));
        assert!(md.contains("**Date Range:** 2023-07-01 - 2024-05-02  \n"));
        assert!(md.contains("- **Other**: 1 papers\n- **Robotics & Automation**: 2 papers\n"));

        let section = md.split("## Robotics & Automation (2 papers)").nth(1).expect("section");
        let newer = section.find("### Robot \"pickers\"").expect("newer paper");
        let older = section.find("### Older robot study").expect("older paper");
        assert!(newer < older);

        assert!(md.contains("**DOI:** [10.1234/robot](https://doi.org/10.1234/robot)"));
        assert_eq!(md.matches("[Paper Link]").count(), 2);
        assert!(!md.contains("[Paper Link](#)"));
    }

    #[test]
    fn test_export_to_dir() -> Result<()> {
        let dir = TempDir::new()?;
        let path = export_to_dir(ExportFormat::Csv, dir.path(), &context(), now())?;
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("foodSafetyAI-Observatory-2025-01-15.csv"));
        assert!(std::fs::read_to_string(&path)?.contains("Older robot study"));
        Ok(())
    }
}
