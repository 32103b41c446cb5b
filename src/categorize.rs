//! Keyword taxonomy categorization.
//!
//! Every keyword is compiled once into a case-insensitive, word-boundary
//! matcher. A category is assigned when any of its keywords matches the
//! combined title and abstract; papers matching nothing fall back to
//! [`FALLBACK_CATEGORY`].

use crate::error::{ObservatoryError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Label given to papers no taxonomy keyword matched.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Built-in food safety & security taxonomy.
pub const FOOD_SAFETY_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "Traceability & Supply Chain",
        &["traceability", "supply chain", "blockchain", "provenance", "food logistics"],
    ),
    (
        "Contaminant & Adulteration Detection",
        &[
            "contaminant",
            "adulteration",
            "food fraud",
            "detection",
            "spectroscopy",
            "hyperspectral imaging",
            "mycotoxin",
            "pathogen",
        ],
    ),
    (
        "Quality Inspection & Grading",
        &[
            "quality inspection",
            "food quality",
            "grading",
            "computer vision",
            "image analysis",
            "defect detection",
            "freshness",
        ],
    ),
    (
        "Predictive Analytics & Risk Assessment",
        &[
            "risk assessment",
            "predictive modeling",
            "foodborne illness",
            "spoilage prediction",
            "shelf life",
            "HACCP",
        ],
    ),
    (
        "Food Security & Forecasting",
        &[
            "food security",
            "yield forecasting",
            "climate impact",
            "market analysis",
            "food access",
            "food availability",
        ],
    ),
    (
        "Process Optimization & Control",
        &[
            "process control",
            "optimization",
            "food manufacturing",
            "food processing",
            "fermentation",
            "drying",
        ],
    ),
    (
        "AI for Audits & Compliance",
        &["compliance", "audit", "regulatory", "language model", "NLP", "document analysis"],
    ),
    (
        "Robotics & Automation",
        &["robot", "automation", "sorting", "packaging", "handling"],
    ),
];

/// Process-wide compiled copy of [`FOOD_SAFETY_TAXONOMY`].
pub static TAXONOMY: Lazy<Taxonomy> = Lazy::new(|| {
    Taxonomy::new(FOOD_SAFETY_TAXONOMY).expect("built-in taxonomy keywords are valid patterns")
});

struct Category {
    label: String,
    matchers: Vec<Regex>,
}

/// Ordered category table with precompiled keyword matchers.
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    /// Compile a taxonomy from `(label, keywords)` pairs.
    pub fn new(entries: &[(&str, &[&str])]) -> Result<Self> {
        let categories = entries
            .iter()
            .map(|(label, keywords)| {
                let matchers = keywords
                    .iter()
                    .map(|kw| keyword_matcher(kw))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Category {
                    label: (*label).to_string(),
                    matchers,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { categories })
    }

    /// Category labels in taxonomy order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.label.as_str())
    }

    /// Categories for a paper's title and abstract. Never empty.
    pub fn categorize(&self, title: &str, abstract_text: &str) -> Vec<String> {
        let text = format!("{} {}", title, abstract_text).to_lowercase();

        let found: Vec<String> = self
            .categories
            .iter()
            .filter(|c| c.matchers.iter().any(|m| m.is_match(&text)))
            .map(|c| c.label.clone())
            .collect();

        if found.is_empty() {
            vec![FALLBACK_CATEGORY.to_string()]
        } else {
            found
        }
    }
}

/// Categorize with the built-in taxonomy.
pub fn categorize(title: &str, abstract_text: &str) -> Vec<String> {
    TAXONOMY.categorize(title, abstract_text)
}

fn keyword_matcher(keyword: &str) -> Result<Regex> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword.trim()));
    Regex::new(&pattern)
        .map_err(|e| ObservatoryError::Config(format!("Invalid keyword '{}': {}", keyword, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_taxonomy_compiles() {
        assert_eq!(TAXONOMY.labels().count(), FOOD_SAFETY_TAXONOMY.len());
        assert!(!TAXONOMY.labels().any(|l| l == FALLBACK_CATEGORY));
    }

    #[test]
    fn test_word_boundaries() {
        let taxonomy = Taxonomy::new(&[("AI", &["ai"])]).expect("taxonomy");
        assert_eq!(
            taxonomy.categorize("How to train your model", "Models need training data."),
            vec![FALLBACK_CATEGORY.to_string()]
        );
        assert_eq!(
            taxonomy.categorize("AI for inspection", ""),
            vec!["AI".to_string()]
        );
    }

    #[test]
    fn test_multiple_categories_in_taxonomy_order() {
        let categories = categorize(
            "Blockchain traceability for grain",
            "We use hyperspectral imaging and a robot arm.",
        );
        assert_eq!(
            categories,
            vec![
                "Traceability & Supply Chain".to_string(),
                "Contaminant & Adulteration Detection".to_string(),
                "Robotics & Automation".to_string(),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_acronym() {
        let categories = categorize("A haccp plan generator", "");
        assert_eq!(categories, vec!["Predictive Analytics & Risk Assessment".to_string()]);
    }

    #[test]
    fn test_no_match_is_other_only() {
        let categories = categorize("Protein folding", "Molecular dynamics study.");
        assert_eq!(categories, vec![FALLBACK_CATEGORY.to_string()]);
    }

    #[test]
    fn test_deterministic() {
        let a = categorize("Food security forecasting", "Climate impact on yields.");
        let b = categorize("Food security forecasting", "Climate impact on yields.");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_keyword_is_literal() {
        // Regex metacharacters inside keywords must not be interpreted.
        let taxonomy = Taxonomy::new(&[("C++", &["c++"])]).expect("taxonomy");
        assert_eq!(taxonomy.categorize("cc", ""), vec![FALLBACK_CATEGORY.to_string()]);
    }
}
