// src/lib.rs
//! Occupational employment trends: load the yearly national survey files,
//! keep the detailed occupations, fit a linear trend per occupation and rank
//! them by average yearly change.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod load;
pub mod pipeline;
pub mod query;
pub mod rank;
pub mod render;
pub mod table;
pub mod trend;

pub use config::{load_config, ColumnRename, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{run, CacheKey, PipelineCache, PipelineOutput};
pub use rank::{RankedTable, TrendResult};
pub use table::{DetailedTable, HistoryPoint, YearlyRecord};
