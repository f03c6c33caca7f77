//! CLI argument struct + dispatch (§6.2).
//!
//! A thin, non-interactive testing façade over [`crate::engine::QueryEngine`]:
//! it owns no SQL itself (`spec.md` §9's "Peek coupling" design note — the UI
//! layer, CLI included, only calls into the engine and formats what comes
//! back). The interactive TUI this façade stands in for is out of scope
//! (`spec.md` §1).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use comfy_table::presets::{ASCII_FULL, NOTHING, UTF8_FULL};
use comfy_table::Table;

use crate::config::{EngineConfig, Granularity};
use crate::engine::QueryEngine;
use crate::error::{Result, XtopError};
use crate::histogram::{parse_histogram, sparkline};
use crate::query::builder::{parse_latency_metric, LatencyMetric, QueryParams, Side};
use crate::time_spec::{SystemClock, TimeSpec};
use crate::value::{ResultSet, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Grid,
    Simple,
    Plain,
}

/// Recognised CLI options (`spec.md` §6.2).
#[derive(Debug, Parser)]
#[command(name = "xtop", about = "Query xcapture thread-state samples")]
pub struct CliArgs {
    /// Data directory holding the hourly `xcapture_*` files and `partitions`.
    #[arg(short = 'd', long = "datadir", env = "XCAPTURE_DATADIR")]
    pub datadir: PathBuf,

    /// Group-by columns, comma-separated, case-insensitive.
    #[arg(short = 'g', long = "group", value_delimiter = ',')]
    pub group_cols: Vec<String>,

    /// Latency/histogram columns, comma-separated.
    #[arg(short = 'l', long = "latency", value_delimiter = ',')]
    pub latency_cols: Vec<String>,

    /// Raw WHERE predicate, appended verbatim (wrapped in parentheses).
    #[arg(short = 'w', long = "where")]
    pub where_clause: Option<String>,

    /// Start of the time range: RFC3339 instant or `-Nh`/`-Nmin`/`-Ns`.
    #[arg(long = "from")]
    pub from: Option<String>,

    /// End of the time range: RFC3339 instant, `now`, or a relative spec.
    #[arg(long = "to")]
    pub to: Option<String>,

    #[arg(long = "limit")]
    pub limit: Option<u32>,

    /// Peek the first histogram column of the first returned row.
    #[arg(long = "peek")]
    pub peek: bool,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Grid)]
    pub format: OutputFormat,

    /// Hint the `base_samples` CTE `AS MATERIALIZED` so it's evaluated
    /// once rather than re-run per downstream reference or follow-up
    /// query (§4.5.1, §4.10).
    #[arg(long = "materialize")]
    pub materialize: bool,

    #[arg(long = "duckdb-threads")]
    pub duckdb_threads: Option<u32>,

    #[arg(long = "debug")]
    pub debug: bool,

    #[arg(long = "debuglog")]
    pub debuglog: Option<PathBuf>,
}

impl CliArgs {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            datadir: self.datadir.clone(),
            use_materialized: self.materialize,
            duckdb_threads: self.duckdb_threads,
            default_limit: self.limit.unwrap_or_else(|| EngineConfig::default().default_limit),
            max_history: EngineConfig::default().max_history,
            default_granularity: Granularity::default(),
        }
    }

    fn resolve_time(&self, raw: &str) -> Result<DateTime<Utc>> {
        let spec = TimeSpec::parse(raw)?;
        Ok(spec.resolve(&SystemClock))
    }

    fn query_params(&self) -> Result<QueryParams> {
        let time_low = self.from.as_deref().map(|s| self.resolve_time(s)).transpose()?;
        let time_high = self.to.as_deref().map(|s| self.resolve_time(s)).transpose()?;
        Ok(QueryParams {
            group_cols: self.group_cols.clone(),
            where_clause: self.where_clause.clone(),
            time_low,
            time_high,
            latency_cols: self.latency_cols.clone(),
            limit: Some(self.limit.unwrap_or_else(|| EngineConfig::default().default_limit)),
        })
    }
}

/// Install the process-wide `tracing` subscriber. Called once from `main`;
/// the engine itself never touches a global subscriber (`SPEC_FULL.md` §1.2).
pub fn init_logging(args: &CliArgs) {
    use tracing_subscriber::EnvFilter;

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &args.debuglog {
        Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => builder.with_writer(std::sync::Mutex::new(file)).try_init(),
            Err(_) => builder.try_init(),
        },
        None => builder.try_init(),
    };
    let _ = installed;
}

/// Run one query and print it, per §6.2's exit-code contract: `Ok(0)` on
/// success, an error that the caller prints to stderr and exits `1` for.
pub fn run(args: &CliArgs) -> Result<()> {
    let config = args.engine_config();
    let mut engine = QueryEngine::new(config)?;
    let params = args.query_params()?;

    let result = engine.execute(&params)?;
    print_table(&result, args.format);

    if args.peek {
        if let Some(metric) = params.latency_cols.iter().find_map(|c| parse_latency_metric(c)) {
            peek_first_row(&mut engine, &result, &metric);
        }
    }

    Ok(())
}

fn peek_first_row(engine: &mut QueryEngine, result: &ResultSet, metric: &LatencyMetric) {
    let Some(row) = result.rows.first() else {
        return;
    };
    let side = match metric {
        LatencyMetric::ScHistogram { .. } => Side::Sc,
        LatencyMetric::IoHistogram { .. } => Side::Io,
        _ => return,
    };
    let col = match side {
        Side::Sc => "sclat_histogram",
        Side::Io => "iolat_histogram",
    };
    let Some(Value::Text(raw)) = row.get(col) else {
        return;
    };
    let table = parse_histogram(raw);
    println!("\npeek: {col} sparkline {}", sparkline(&table));
}

fn format_to_preset(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Grid => UTF8_FULL,
        OutputFormat::Simple => ASCII_FULL,
        OutputFormat::Plain => NOTHING,
    }
}

fn print_table(result: &ResultSet, format: OutputFormat) {
    let mut table = Table::new();
    table.load_preset(format_to_preset(format));
    table.set_header(result.columns.clone());
    for row in &result.rows {
        let cells: Vec<String> = result
            .columns
            .iter()
            .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        table.add_row(cells);
    }
    println!("{table}");
    println!("({} rows, {:.3}s)", result.rows.len(), result.elapsed_s);
}

/// Translate an [`XtopError`] into the process exit code `spec.md` §6.2
/// requires: `0` success, `1` argument error or runtime failure.
pub fn exit_code(result: &std::result::Result<(), XtopError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
