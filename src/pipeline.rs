// src/pipeline.rs
//! load → aggregate → estimate → rank, plus an explicit memo of results.

use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    path::Path,
    sync::Arc,
    time::Instant,
};
use tracing::{debug, info, instrument};

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::load::load_years;
use crate::rank::{rank, RankedTable};
use crate::table::DetailedTable;
use crate::trend::estimate_trends;

/// Identity of an input set and of every setting that shapes the result.
///
/// This is the validated config itself with `data_dir` canonicalized (when it
/// exists), so `./base_dados` and `base_dados` share an entry while a strict
/// and a lenient run over the same files do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    config: PipelineConfig,
}

impl CacheKey {
    pub fn for_config(config: &PipelineConfig) -> Self {
        let mut config = config.clone();
        if let Ok(dir) = config.data_dir.canonicalize() {
            config.data_dir = dir;
        }
        Self { config }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }
}

/// Everything one load cycle produces. Read-only once built.
#[derive(Debug)]
pub struct PipelineOutput {
    pub key: CacheKey,
    pub ranked: RankedTable,
    pub detailed: DetailedTable,
    /// Years actually loaded (fewer than requested only in lenient mode).
    pub years_loaded: Vec<i32>,
    pub loaded_at: DateTime<Utc>,
}

/// Run the whole pipeline once. Any fatal error aborts before ranking.
#[instrument(level = "info", skip(config), fields(dir = %config.data_dir.display()))]
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let start = Instant::now();
    let years = load_years(config)?;
    let years_loaded = years.iter().map(|t| t.year).collect();

    let detailed = aggregate(&years, &config.detailed_label)?;
    drop(years);

    let trends = estimate_trends(&detailed);
    let ranked = rank(trends, &detailed);

    info!(
        occupations = detailed.codes().len(),
        ranked = ranked.len(),
        detailed_rows = detailed.len(),
        elapsed = ?start.elapsed(),
        "pipeline complete"
    );
    Ok(PipelineOutput {
        key: CacheKey::for_config(config),
        ranked,
        detailed,
        years_loaded,
        loaded_at: Utc::now(),
    })
}

/// Memoized pipeline results keyed by input identity.
///
/// An entry lives until [`invalidate`](Self::invalidate) or
/// [`clear`](Self::clear) is called. Failed runs are never stored.
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: HashMap<CacheKey, Arc<PipelineOutput>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached output for `config`'s input set, running the pipeline on a miss.
    pub fn get_or_run(&mut self, config: &PipelineConfig) -> Result<Arc<PipelineOutput>> {
        let key = CacheKey::for_config(config);
        if let Some(hit) = self.entries.get(&key) {
            debug!(
                dir = %key.data_dir().display(),
                loaded_at = %hit.loaded_at,
                "pipeline cache hit"
            );
            return Ok(Arc::clone(hit));
        }
        let output = Arc::new(run(config)?);
        self.entries.insert(key, Arc::clone(&output));
        Ok(output)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<PipelineOutput>> {
        self.entries.get(key).cloned()
    }

    /// Drop one entry; the next request for it reloads from disk.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(old) => {
                info!(loaded_at = %old.loaded_at, "dropped cached pipeline output");
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
