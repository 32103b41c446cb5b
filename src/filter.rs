//! Filter engine.
//!
//! A pure function from the working set and the current [`FilterSelection`]
//! to the visible subset. Category, source and date window combine with AND;
//! an empty category or source selection lets everything through.
//!
//! Dates are handled at month granularity. A month index counts months from
//! January of the base year (the year of the earliest record), and the window
//! `[start, end]` of selected months is tested as the half-open date range
//! `[first day of start, first day of the month after end)`.

use crate::error::{ObservatoryError, Result};
use crate::paper::{Paper, Source};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Base year used while no record carries a date.
pub const DEFAULT_BASE_YEAR: i32 = 2025;

/// Earliest and latest record date of a working set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateBounds {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl DateBounds {
    pub fn from_papers(papers: &[Paper]) -> Self {
        let dates = papers.iter().filter_map(|p| p.date);
        Self {
            min_date: dates.clone().min(),
            max_date: dates.max(),
        }
    }

    pub fn base_year(&self) -> i32 {
        self.min_date.map_or(DEFAULT_BASE_YEAR, |d| d.year())
    }

    /// Month indices of the earliest and latest record.
    pub fn index_range(&self) -> (i32, i32) {
        let base = self.base_year();
        match (self.min_date, self.max_date) {
            (Some(min), Some(max)) => (month_index(min, base), month_index(max, base)),
            _ => (0, 0),
        }
    }

    /// Window spanning every record.
    pub fn full_window(&self) -> MonthWindow {
        let (start, end) = self.index_range();
        MonthWindow {
            base_year: self.base_year(),
            start,
            end,
        }
    }
}

/// `(year - base_year) * 12 + month0`
pub fn month_index(date: NaiveDate, base_year: i32) -> i32 {
    (date.year() - base_year) * 12 + date.month0() as i32
}

/// First day of the month with the given index.
pub fn month_start(base_year: i32, index: i32) -> Option<NaiveDate> {
    let year = base_year + index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Parse a `YYYY-MM` month into its first day.
pub fn parse_year_month(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| ObservatoryError::Config(format!("Invalid month '{}', expected YYYY-MM", s)))
}

/// Inclusive range of selected months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub base_year: i32,
    pub start: i32,
    pub end: i32,
}

impl MonthWindow {
    pub fn start_date(&self) -> Option<NaiveDate> {
        month_start(self.base_year, self.start)
    }

    /// First day of the month after the selected end month.
    pub fn end_exclusive(&self) -> Option<NaiveDate> {
        month_start(self.base_year, self.end + 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.start_date(), self.end_exclusive()) {
            (Some(start), Some(end)) => start <= date && date < end,
            _ => false,
        }
    }
}

/// What the user currently has selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSelection {
    pub categories: BTreeSet<String>,
    pub sources: BTreeSet<Source>,
    pub window: MonthWindow,
}

impl FilterSelection {
    /// Everything selected, window spanning the whole working set.
    pub fn select_everything(universe: &[String], bounds: &DateBounds) -> Self {
        Self {
            categories: universe.iter().cloned().collect(),
            sources: Source::ALL.into_iter().collect(),
            window: bounds.full_window(),
        }
    }

    pub fn toggle_category(&mut self, category: &str) {
        if !self.categories.remove(category) {
            self.categories.insert(category.to_string());
        }
    }

    pub fn toggle_source(&mut self, source: Source) {
        if !self.sources.remove(&source) {
            self.sources.insert(source);
        }
    }

    pub fn select_category(&mut self, category: &str) {
        self.categories.insert(category.to_string());
    }

    pub fn select_source(&mut self, source: Source) {
        self.sources.insert(source);
    }

    /// Keep only the named categories and sources. An empty list leaves that
    /// dimension untouched, and repeated names select once.
    pub fn restrict(&mut self, categories: &[String], sources: &[Source]) {
        if !categories.is_empty() {
            self.clear_categories();
            for category in categories {
                self.select_category(category);
            }
        }
        if !sources.is_empty() {
            self.clear_sources();
            for source in sources {
                self.select_source(*source);
            }
        }
    }

    pub fn select_all_categories(&mut self, universe: &[String]) {
        self.categories.extend(universe.iter().cloned());
    }

    pub fn clear_categories(&mut self) {
        self.categories.clear();
    }

    pub fn select_all_sources(&mut self) {
        self.sources.extend(Source::ALL);
    }

    pub fn clear_sources(&mut self) {
        self.sources.clear();
    }

    /// Select months `start..=end`, both clamped to the bounds.
    ///
    /// A start past the end is pulled back to the end.
    pub fn set_window(&mut self, bounds: &DateBounds, start: i32, end: i32) {
        let (lo, hi) = bounds.index_range();
        let end = end.clamp(lo, hi);
        let start = start.clamp(lo, hi).min(end);
        self.window = MonthWindow {
            base_year: bounds.base_year(),
            start,
            end,
        };
    }

    /// Select the months containing `from` and `to`; a missing side stays open.
    pub fn set_date_range(&mut self, bounds: &DateBounds, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        let base = bounds.base_year();
        let (lo, hi) = bounds.index_range();
        let start = from.map_or(lo, |d| month_index(d, base));
        let end = to.map_or(hi, |d| month_index(d, base));
        self.set_window(bounds, start, end);
    }

    pub fn reset_window(&mut self, bounds: &DateBounds) {
        self.window = bounds.full_window();
    }

    pub fn matches(&self, paper: &Paper) -> bool {
        let category_ok = self.categories.is_empty() || paper.in_any_category(&self.categories);
        let source_ok = self.sources.is_empty() || self.sources.contains(&paper.source);
        let date_ok = paper.date.is_some_and(|d| self.window.contains(d));
        category_ok && source_ok && date_ok
    }
}

/// Distinct category labels in first-seen order.
pub fn category_universe(papers: &[Paper]) -> Vec<String> {
    let mut seen = HashSet::new();
    papers
        .iter()
        .flat_map(|p| p.categories.iter())
        .filter(|c| seen.insert(c.as_str()))
        .cloned()
        .collect()
}

/// Visible subset, in working-set order.
pub fn apply_filters<'a>(papers: &'a [Paper], selection: &FilterSelection) -> Vec<&'a Paper> {
    papers.iter().filter(|p| selection.matches(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{NO_ABSTRACT, NO_LINK};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn paper(title: &str, when: NaiveDate, source: Source, categories: &[&str]) -> Paper {
        Paper {
            title: title.to_string(),
            authors: vec![],
            date: Some(when),
            abstract_text: NO_ABSTRACT.to_string(),
            url: NO_LINK.to_string(),
            doi: None,
            source,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn working_set() -> Vec<Paper> {
        vec![
            paper("newest", date(2024, 6, 1), Source::Arxiv, &["Robotics & Automation"]),
            paper("middle", date(2024, 2, 15), Source::Crossref, &["Traceability & Supply Chain", "Other"]),
            paper("oldest", date(2023, 3, 10), Source::SemanticScholar, &["Other"]),
        ]
    }

    fn titles<'a>(papers: &[&'a Paper]) -> Vec<&'a str> {
        papers.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_month_index_round_trip() {
        assert_eq!(month_index(date(2023, 1, 31), 2023), 0);
        assert_eq!(month_index(date(2024, 6, 1), 2023), 17);
        assert_eq!(month_start(2023, 17), Some(date(2024, 6, 1)));
        assert_eq!(month_start(2023, 12), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_bounds_from_papers() {
        let bounds = DateBounds::from_papers(&working_set());
        assert_eq!(bounds.min_date, Some(date(2023, 3, 10)));
        assert_eq!(bounds.max_date, Some(date(2024, 6, 1)));
        assert_eq!(bounds.index_range(), (2, 17));

        let empty = DateBounds::from_papers(&[]);
        assert_eq!(empty.base_year(), DEFAULT_BASE_YEAR);
    }

    #[test]
    fn test_empty_selections_are_permissive() {
        let papers = working_set();
        let bounds = DateBounds::from_papers(&papers);
        let selection = FilterSelection {
            categories: BTreeSet::new(),
            sources: BTreeSet::new(),
            window: bounds.full_window(),
        };

        let visible = apply_filters(&papers, &selection);
        assert_eq!(titles(&visible), vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_dimensions_combine_with_and() {
        let papers = working_set();
        let bounds = DateBounds::from_papers(&papers);
        let mut selection = FilterSelection::select_everything(&category_universe(&papers), &bounds);

        selection.clear_categories();
        selection.toggle_category("Other");
        assert_eq!(titles(&apply_filters(&papers, &selection)), vec!["middle", "oldest"]);

        selection.toggle_source(Source::SemanticScholar);
        assert_eq!(titles(&apply_filters(&papers, &selection)), vec!["middle"]);

        selection.select_all_sources();
        selection.select_all_categories(&category_universe(&papers));
        assert_eq!(apply_filters(&papers, &selection).len(), 3);
    }

    #[test]
    fn test_restrict_with_repeated_source() {
        let papers = vec![
            paper("preprint", date(2024, 5, 1), Source::Arxiv, &["Other"]),
            paper("article", date(2024, 4, 1), Source::Crossref, &["Other"]),
        ];
        let bounds = DateBounds::from_papers(&papers);
        let mut selection = FilterSelection::select_everything(&category_universe(&papers), &bounds);

        selection.restrict(&[], &[Source::Arxiv, Source::Arxiv]);
        assert_eq!(titles(&apply_filters(&papers, &selection)), vec!["preprint"]);

        selection.restrict(&["Other".to_string(), "Other".to_string()], &[]);
        assert!(selection.categories.contains("Other"));
        assert_eq!(selection.sources.len(), 1);
    }

    #[test]
    fn test_window_end_is_exclusive() {
        let bounds = DateBounds {
            min_date: Some(date(2024, 1, 5)),
            max_date: Some(date(2024, 12, 1)),
        };
        let papers = vec![paper("march first", date(2024, 3, 1), Source::Crossref, &["Other"])];
        let mut selection = FilterSelection::select_everything(&[], &bounds);

        // Window January..=February ends at March 1st, exclusive.
        selection.set_window(&bounds, 0, 1);
        assert_eq!(selection.window.end_exclusive(), Some(date(2024, 3, 1)));
        assert!(apply_filters(&papers, &selection).is_empty());

        selection.set_window(&bounds, 0, 2);
        assert_eq!(apply_filters(&papers, &selection).len(), 1);
    }

    #[test]
    fn test_window_clamping_and_reset() {
        let papers = working_set();
        let bounds = DateBounds::from_papers(&papers);
        let mut selection = FilterSelection::select_everything(&[], &bounds);

        selection.set_window(&bounds, 15, 4);
        assert_eq!((selection.window.start, selection.window.end), (4, 4));

        selection.set_window(&bounds, -10, 99);
        assert_eq!((selection.window.start, selection.window.end), (2, 17));

        selection.set_date_range(&bounds, Some(date(2024, 1, 1)), None);
        assert_eq!(titles(&apply_filters(&papers, &selection)), vec!["newest", "middle"]);

        selection.reset_window(&bounds);
        assert_eq!(selection.window, bounds.full_window());
    }

    #[test]
    fn test_category_universe_first_seen_order() {
        assert_eq!(
            category_universe(&working_set()),
            vec![
                "Robotics & Automation".to_string(),
                "Traceability & Supply Chain".to_string(),
                "Other".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_year_month() {
        assert_eq!(parse_year_month("2024-03").expect("valid"), date(2024, 3, 1));
        assert!(matches!(parse_year_month("March"), Err(ObservatoryError::Config(_))));
    }
}
