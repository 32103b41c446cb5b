//! Refresh pipeline and cache state machine.
//!
//! A pipeline run queries every source concurrently, waits for all of them
//! and merges the results. The [`Orchestrator`] decides at startup whether
//! the cached snapshot can be shown as is, shown while a background run
//! replaces it, or whether a blocking run is needed first.

use crate::aggregate::aggregate;
use crate::cache::{CacheStore, Snapshot};
use crate::error::{ObservatoryError, Result};
use crate::filter::{apply_filters, category_universe, DateBounds, FilterSelection};
use crate::paper::Paper;
use crate::sources::PaperSource;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    CachedFresh,
    CachedStale,
    Refreshing,
}

/// Transient outcome message of a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success { count: usize },
    Failure { message: String },
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::Success { count } => write!(f, "Updated: {} papers loaded", count),
            Notification::Failure { message } => {
                write!(f, "Refresh failed, showing cached data ({})", message)
            }
        }
    }
}

/// Working set plus everything derived from it.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub papers: Vec<Paper>,
    pub categories: Vec<String>,
    pub bounds: DateBounds,
    pub selection: FilterSelection,
}

impl PipelineContext {
    /// Fresh context with every category and source selected.
    pub fn from_papers(papers: Vec<Paper>) -> Self {
        let categories = category_universe(&papers);
        let bounds = DateBounds::from_papers(&papers);
        let selection = FilterSelection::select_everything(&categories, &bounds);
        Self {
            papers,
            categories,
            bounds,
            selection,
        }
    }

    /// Restore a context, keeping the saved category and source selection.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut context = Self::from_papers(snapshot.papers);
        if !snapshot.categories.is_empty() {
            context.categories = snapshot.categories;
        }
        context.selection.categories = snapshot.selected_categories.into_iter().collect();
        context.selection.sources = snapshot.selected_sources.into_iter().collect();
        context
    }

    pub fn to_snapshot(&self, timestamp: DateTime<Utc>) -> Snapshot {
        Snapshot {
            timestamp,
            papers: self.papers.clone(),
            categories: self.categories.clone(),
            date_range: self.bounds,
            selected_categories: self.selection.categories.iter().cloned().collect(),
            selected_sources: self.selection.sources.iter().copied().collect(),
        }
    }

    pub fn visible(&self) -> Vec<&Paper> {
        apply_filters(&self.papers, &self.selection)
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::from_papers(Vec::new())
    }
}

/// Query every source concurrently and merge the results.
///
/// A failing or panicking source contributes nothing. Fails with
/// [`ObservatoryError::PipelineEmpty`] only when all sources came back empty.
pub async fn run_pipeline(sources: Vec<Arc<dyn PaperSource>>, cutoff: NaiveDate) -> Result<Vec<Paper>> {
    info!(sources = sources.len(), "Starting pipeline run");

    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            tokio::spawn(async move { source.fetch().await })
        })
        .collect();

    let batches: Vec<Vec<Paper>> = join_all(handles)
        .await
        .into_iter()
        .zip(&sources)
        .map(|(joined, source)| {
            joined.unwrap_or_else(|e| {
                let err = ObservatoryError::Task(e.to_string());
                error!(source = %source.source(), error = %err, "Source task failed");
                Vec::new()
            })
        })
        .collect();

    let total: usize = batches.iter().map(Vec::len).sum();
    if total == 0 {
        warn!("Every source returned nothing");
        return Err(ObservatoryError::PipelineEmpty);
    }

    let papers = aggregate(batches, cutoff);
    info!(fetched = total, kept = papers.len(), "Pipeline run complete");
    Ok(papers)
}

/// Startup decision.
#[derive(Debug)]
pub enum Startup {
    /// No snapshot. A foreground refresh is needed before anything can be shown.
    Empty,
    /// Fresh snapshot in use, no network activity.
    Fresh,
    /// Stale snapshot in use while a background run replaces it.
    Refreshing(RefreshHandle),
}

/// Background pipeline run started at startup.
#[derive(Debug)]
pub struct RefreshHandle(JoinHandle<Result<Vec<Paper>>>);

pub struct Orchestrator {
    sources: Vec<Arc<dyn PaperSource>>,
    store: CacheStore,
    cutoff: NaiveDate,
    freshness: Duration,
    state: CacheState,
    context: PipelineContext,
    fetched_at: Option<DateTime<Utc>>,
}

impl Orchestrator {
    pub fn new(
        sources: Vec<Arc<dyn PaperSource>>,
        store: CacheStore,
        cutoff: NaiveDate,
        freshness: Duration,
    ) -> Self {
        Self {
            sources,
            store,
            cutoff,
            freshness,
            state: CacheState::Empty,
            context: PipelineContext::default(),
            fetched_at: None,
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.context
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn startup(&mut self) -> Result<Startup> {
        self.startup_at(Utc::now())
    }

    /// Read the snapshot and pick a state as of `now`.
    pub fn startup_at(&mut self, now: DateTime<Utc>) -> Result<Startup> {
        let Some(snapshot) = self.store.load()? else {
            self.state = CacheState::Empty;
            return Ok(Startup::Empty);
        };

        let stale = snapshot.is_stale(now, self.freshness);
        info!(age_minutes = snapshot.age(now).num_minutes(), stale = stale, "Using cached snapshot");
        self.fetched_at = Some(snapshot.timestamp);
        self.context = PipelineContext::from_snapshot(snapshot);

        if !stale {
            self.state = CacheState::CachedFresh;
            return Ok(Startup::Fresh);
        }

        self.state = CacheState::Refreshing;
        let sources = self.sources.clone();
        let cutoff = self.cutoff;
        let handle = tokio::spawn(run_pipeline(sources, cutoff));
        Ok(Startup::Refreshing(RefreshHandle(handle)))
    }

    /// Wait for a background run and apply its outcome.
    ///
    /// On failure, including a failed snapshot write, the cached data stays in
    /// place.
    pub async fn complete_refresh(&mut self, handle: RefreshHandle) -> Notification {
        let outcome = match handle.0.await {
            Ok(result) => result,
            Err(e) => Err(ObservatoryError::Task(e.to_string())),
        };

        match outcome.and_then(|papers| self.replace_working_set(papers)) {
            Ok(count) => Notification::Success { count },
            Err(e) => {
                warn!(error = %e, "Background refresh failed");
                self.state = CacheState::CachedStale;
                Notification::Failure {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Blocking run. The previous state is kept on failure.
    pub async fn refresh_foreground(&mut self) -> Result<usize> {
        let previous = self.state;
        self.state = CacheState::Refreshing;

        let outcome = run_pipeline(self.sources.clone(), self.cutoff).await;
        match outcome.and_then(|papers| self.replace_working_set(papers)) {
            Ok(count) => Ok(count),
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    /// Persist the current context without touching the network.
    ///
    /// The snapshot keeps the time its papers were fetched, so saving a
    /// selection does not make stale data look fresh.
    pub fn save_state(&self) -> Result<()> {
        let fetched_at = self.fetched_at.unwrap_or_else(Utc::now);
        self.store.save(&self.context.to_snapshot(fetched_at))
    }

    /// Replace the context from the snapshot. Returns false when there is none.
    pub fn load_state(&mut self) -> Result<bool> {
        match self.store.load()? {
            Some(snapshot) => {
                self.state = if snapshot.is_stale(Utc::now(), self.freshness) {
                    CacheState::CachedStale
                } else {
                    CacheState::CachedFresh
                };
                self.fetched_at = Some(snapshot.timestamp);
                self.context = PipelineContext::from_snapshot(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persist a new working set, then swap it in. Nothing changes if the
    /// snapshot cannot be written.
    fn replace_working_set(&mut self, papers: Vec<Paper>) -> Result<usize> {
        let count = papers.len();
        let fetched_at = Utc::now();
        let context = PipelineContext::from_papers(papers);

        if let Err(e) = self.store.save(&context.to_snapshot(fetched_at)) {
            error!(error = %e, path = ?self.store.path(), "Failed to persist snapshot");
            return Err(e);
        }

        self.context = context;
        self.fetched_at = Some(fetched_at);
        self.state = CacheState::CachedFresh;
        Ok(count)
    }
}
