//! Aggregation Module
//!
//! Merges the per-source lists into the working set: concatenate in source
//! order, deduplicate by title, drop undated or pre-cutoff records, sort
//! newest first.

use crate::paper::Paper;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Merge per-source batches into the working record set.
///
/// # Arguments
/// * `batches` - One list per source, already in concatenation order
/// * `cutoff` - Earliest publication date kept
pub fn aggregate(batches: Vec<Vec<Paper>>, cutoff: NaiveDate) -> Vec<Paper> {
    let merged: Vec<Paper> = batches.into_iter().flatten().collect();
    let mut papers = apply_cutoff(dedupe_by_title(merged), cutoff);
    sort_by_date_desc(&mut papers);
    papers
}

/// Deduplicate by case-insensitive, trimmed title.
///
/// On collision the later record replaces the earlier one but takes over the
/// slot where the title was first seen.
pub fn dedupe_by_title(papers: Vec<Paper>) -> Vec<Paper> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Paper> = Vec::with_capacity(papers.len());

    for paper in papers {
        match slots.get(&paper.dedup_key()) {
            Some(&idx) => unique[idx] = paper,
            None => {
                slots.insert(paper.dedup_key(), unique.len());
                unique.push(paper);
            }
        }
    }

    unique
}

/// Keep records dated on or after `cutoff`; undated records are dropped.
pub fn apply_cutoff(papers: Vec<Paper>, cutoff: NaiveDate) -> Vec<Paper> {
    papers
        .into_iter()
        .filter(|p| p.date.is_some_and(|d| d >= cutoff))
        .collect()
}

/// Stable sort, newest first.
pub fn sort_by_date_desc(papers: &mut [Paper]) {
    papers.sort_by(|a, b| b.date.cmp(&a.date));
}
