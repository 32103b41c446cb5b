//! # observatory
//!
//! Food Safety & Security AI Observatory: aggregates recent papers on AI for
//! food safety and food security from three public search services.
//!
//! ## Modules
//!
//! - [`semanticscholar`], [`crossref`], [`arxiv`] - Source adapters
//! - [`normalize`] - Raw service items to canonical [`paper::Paper`] records
//! - [`categorize`] - Keyword taxonomy categorization
//! - [`aggregate`] - Merge, title dedup, date cutoff and sort
//! - [`filter`] - Category/source/month-window filtering
//! - [`cache`] - Snapshot persistence
//! - [`pipeline`] - Concurrent refresh and the cache state machine
//! - [`export`] - JSON, CSV and Markdown exports
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use observatory::config::Config;
//! use observatory::pipeline::run_pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let papers = run_pipeline(config.build_sources()?, config.cutoff).await?;
//!     println!("Found {} papers", papers.len());
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod arxiv;
pub mod cache;
pub mod categorize;
pub mod config;
pub mod crossref;
pub mod error;
pub mod export;
pub mod filter;
pub mod normalize;
pub mod paper;
pub mod pipeline;
pub mod semanticscholar;
pub mod sources;

pub use error::{ObservatoryError, Result};
pub use paper::{Paper, Source};
