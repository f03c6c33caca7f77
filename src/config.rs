//! Engine configuration.
//!
//! There is no shared-library-lifetime host process for this engine to
//! register dynamic settings with, so every recognised knob is
//! collected into one plain, explicitly-constructed struct instead —
//! see `SPEC_FULL.md` §1.4.

use std::path::PathBuf;

/// Heatmap/time-series granularity. Drives both C7's heatmap bucketing
/// and the histogram drill-down query's time-bucket columns (§4.5.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    Hour,
    #[default]
    Minute,
    TenSecond,
}

impl Granularity {
    /// The next granularity in the cycle a peek UI would step through.
    pub fn cycle(self) -> Granularity {
        match self {
            Granularity::Hour => Granularity::Minute,
            Granularity::Minute => Granularity::TenSecond,
            Granularity::TenSecond => Granularity::Hour,
        }
    }

    /// Time-bucket columns this granularity groups/orders by, in order,
    /// per §4.5.6.
    pub(crate) fn bucket_columns(self) -> &'static [&'static str] {
        match self {
            Granularity::Hour => &["hh"],
            Granularity::Minute => &["hh", "mi"],
            Granularity::TenSecond => &["hh", "mi", "s10"],
        }
    }
}

/// Explicit configuration struct, replacing the dynamic-kwargs/optional-
/// everywhere style the original sampler's tooling used (SPEC_FULL.md §1.4).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the hourly `xcapture_*` files and `partitions`.
    pub datadir: PathBuf,
    /// Whether composed queries hint their `base_samples` CTE
    /// `AS MATERIALIZED`, so DuckDB evaluates it once into a temp table
    /// instead of re-running the full enriched/joined CTE chain for each
    /// downstream reference — once per histogram side's bucket CTEs
    /// within a single query, and across a peek's repeated follow-up
    /// queries (e.g. cycling heatmap granularities against an unchanged
    /// WHERE/time range, §4.10). Plumbed through `--materialize` (§6.2).
    pub use_materialized: bool,
    /// `PRAGMA threads` for the DuckDB connection; `None` leaves DuckDB's
    /// own default (core count) in place.
    pub duckdb_threads: Option<u32>,
    /// Default `LIMIT` applied to top-level queries when the caller
    /// doesn't specify one.
    pub default_limit: u32,
    /// Maximum depth of the navigation frame history before the oldest
    /// frame is evicted FIFO (§3.5).
    pub max_history: usize,
    /// Default granularity for time-series heatmap peeks.
    pub default_granularity: Granularity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            datadir: PathBuf::from("."),
            use_materialized: false,
            duckdb_threads: None,
            default_limit: 50,
            max_history: 100,
            default_granularity: Granularity::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(datadir: impl Into<PathBuf>) -> Self {
        EngineConfig {
            datadir: datadir.into(),
            ..Default::default()
        }
    }
}
