//! Query Builder (C5) — the heart of the engine.
//!
//! Composes a layered CTE query from `(group_cols, where_clause,
//! time_range, latency_cols, limit)` using the Time-Filter (C1), Schema
//! Registry (C2), Fragment Loader (C3) and Column Router (C4). See
//! `spec.md` §4.5 for the full contract this module implements.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::Granularity;
use crate::error::Result;
use crate::fragments::{FragmentLoader, BASE_PARTITIONS, COMPUTED_COLUMNS, HISTOGRAM_BUCKETS};
use crate::query::computed_columns;
use crate::query::cte::{Cte, CteQuery};
use crate::query::expr::quote_ident;
use crate::router::ColumnRouter;
use crate::schema::{canonicalize, SchemaRegistry};
use crate::time_filter::{self, Stream};

/// A single requested latency/histogram metric, e.g. `sc.p95_us` or
/// `sclat_histogram`.
#[derive(Debug, Clone, PartialEq)]
pub enum LatencyMetric {
    /// `sc.p<NN>_us` / `io.p<NN>_us` — `PERCENTILE_CONT`.
    Percentile { side: Side, pct: u8, requested: String },
    Avg { side: Side, requested: String },
    Min { side: Side, requested: String },
    Max { side: Side, requested: String },
    ScHistogram { requested: String },
    IoHistogram { requested: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sc,
    Io,
}

impl Side {
    fn stream(self) -> Stream {
        match self {
            Side::Sc => Stream::Syscend,
            Side::Io => Stream::Iorqend,
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Side::Sc => "sc",
            Side::Io => "io",
        }
    }
}

/// Parse a requested latency column into a [`LatencyMetric`], or `None`
/// if it isn't one (e.g. a plain group-by column).
pub fn parse_latency_metric(col: &str) -> Option<LatencyMetric> {
    let lower = canonicalize(col);
    if lower == "sclat_histogram" {
        return Some(LatencyMetric::ScHistogram { requested: col.to_string() });
    }
    if lower == "iolat_histogram" {
        return Some(LatencyMetric::IoHistogram { requested: col.to_string() });
    }
    let (side, rest) = if let Some(r) = lower.strip_prefix("sc.") {
        (Side::Sc, r)
    } else if let Some(r) = lower.strip_prefix("io.") {
        (Side::Io, r)
    } else {
        return None;
    };
    if let Some(digits) = rest.strip_prefix('p').and_then(|s| s.strip_suffix("_us")) {
        let pct: u8 = digits.parse().ok()?;
        return Some(LatencyMetric::Percentile { side, pct, requested: col.to_string() });
    }
    match rest {
        "avg_us" => Some(LatencyMetric::Avg { side, requested: col.to_string() }),
        "min_us" => Some(LatencyMetric::Min { side, requested: col.to_string() }),
        "max_us" => Some(LatencyMetric::Max { side, requested: col.to_string() }),
        _ => None,
    }
}

/// Inputs to [`QueryBuilder::build`] (§4.5).
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub group_cols: Vec<String>,
    pub where_clause: Option<String>,
    pub time_low: Option<DateTime<Utc>>,
    pub time_high: Option<DateTime<Utc>>,
    pub latency_cols: Vec<String>,
    pub limit: Option<u32>,
}

pub struct QueryBuilder<'a> {
    schema: &'a SchemaRegistry,
    fragments: &'a mut FragmentLoader,
    datadir: &'a std::path::Path,
    materialize_base: bool,
}

/// Required join-key columns for each non-base stream (§3.1, §4.5.5).
fn required_join_keys(stream: Stream) -> &'static [&'static str] {
    match stream {
        Stream::Samples => &[],
        Stream::Syscend => &["tid", "sysc_seq_num"],
        Stream::Iorqend => &["insert_tid", "iorq_seq_num"],
        Stream::Kstacks => &["kstack_hash"],
        Stream::Ustacks => &["ustack_hash"],
        Stream::Partitions => &["dev_maj", "dev_min"],
    }
}

impl<'a> QueryBuilder<'a> {
    pub fn new(
        schema: &'a SchemaRegistry,
        fragments: &'a mut FragmentLoader,
        datadir: &'a std::path::Path,
    ) -> Self {
        QueryBuilder { schema, fragments, datadir, materialize_base: false }
    }

    /// Mark `base_samples` `AS MATERIALIZED` (`EngineConfig::use_materialized`,
    /// SPEC_FULL.md §1.4): when a histogram is requested, `base_samples` is
    /// referenced once per side's bucket CTE plus once by `sample_counts`
    /// (§4.5.1); a peek's repeated granularity-cycling follow-up queries
    /// re-issue the same CTE chain again from scratch each time. Hinting it
    /// materialized makes DuckDB compute it once into a temp table instead
    /// of re-evaluating the full join chain per reference/call.
    pub fn with_materialized_base(mut self, materialize: bool) -> Self {
        self.materialize_base = materialize;
        self
    }

    /// Which non-base streams actually get a join, after dropping any
    /// whose required keys the Schema Registry says are missing
    /// (§4.5.5). `samples` is never in the result (it's the base CTE).
    fn joinable_sources(&self, requested: &BTreeSet<Stream>) -> BTreeSet<Stream> {
        requested
            .iter()
            .copied()
            .filter(|&s| s != Stream::Samples)
            .filter(|&s| {
                let keys = required_join_keys(s);
                let ok = self.schema.has_all(s, keys);
                if !ok {
                    warn!(
                        "skipping join to {} — missing one of required keys {:?}",
                        s.file_stem(),
                        keys
                    );
                }
                ok
            })
            .collect()
    }

    /// Build the `enriched_samples` CTE: base sample columns, computed
    /// columns, time-clipped (§4.5.1, §4.5.4).
    fn enriched_samples_cte(&mut self, params: &QueryParams) -> Result<Cte> {
        let source_expr = time_filter::files_for(
            self.datadir,
            Stream::Samples,
            params.time_low,
            params.time_high,
        );
        let computed = self.fragments.load(COMPUTED_COLUMNS)?.to_string();

        let mut clip = Vec::new();
        if let Some(lo) = params.time_low {
            clip.push(format!("\"timestamp\" >= TIMESTAMP '{}'", lo.format("%Y-%m-%d %H:%M:%S")));
        }
        if let Some(hi) = params.time_high {
            clip.push(format!("\"timestamp\" < TIMESTAMP '{}'", hi.format("%Y-%m-%d %H:%M:%S")));
        }
        let where_sql = if clip.is_empty() {
            String::new()
        } else {
            format!("\nWHERE {}", clip.join(" AND "))
        };

        let body = format!(
            "SELECT s.*,\n{computed}\nFROM {source_expr} AS s{where_sql}",
        );
        Ok(Cte::new("enriched_samples", body))
    }

    /// Build the `base_samples` CTE: `enriched_samples` LEFT JOINed with
    /// every joinable source, projecting only needed columns, plus a
    /// per-row `sc_bucket_us`/`io_bucket_us` when a histogram is
    /// requested (§4.5.1).
    fn base_samples_cte(
        &mut self,
        joinable: &BTreeSet<Stream>,
        latency_metrics: &[LatencyMetric],
    ) -> Result<Cte> {
        let mut joins = Vec::new();
        let mut select_extra = Vec::new();

        if joinable.contains(&Stream::Syscend) {
            joins.push(
                "LEFT JOIN syscend_src AS sc ON sc.tid = es.tid AND sc.sysc_seq_num = es.sysc_seq_num".to_string()
            );
        }
        if joinable.contains(&Stream::Iorqend) {
            joins.push(
                "LEFT JOIN iorqend_src AS io ON io.insert_tid = es.tid AND io.iorq_seq_num = es.iorq_seq_num".to_string()
            );
        }
        if joinable.contains(&Stream::Kstacks) {
            joins.push("LEFT JOIN kstacks_src AS ks ON ks.kstack_hash = es.kstack_hash".to_string());
            select_extra.push(computed_columns::current_func_expr("ks.kstack_syms", "kstack_current_func"));
        } else {
            select_extra.push("'-' AS kstack_current_func".to_string());
        }
        if joinable.contains(&Stream::Ustacks) {
            joins.push("LEFT JOIN ustacks_src AS us ON us.ustack_hash = es.ustack_hash".to_string());
            select_extra.push(computed_columns::current_func_expr("us.ustack_syms", "ustack_current_func"));
        } else {
            select_extra.push("'-' AS ustack_current_func".to_string());
        }
        if joinable.contains(&Stream::Partitions) {
            joins.push(
                "LEFT JOIN partitions_src AS pt ON pt.dev_maj = io.dev_maj AND pt.dev_min = io.dev_min".to_string()
            );
            select_extra.push("pt.devname AS devname".to_string());
        } else {
            select_extra.push("NULL AS devname".to_string());
        }

        if latency_metrics.iter().any(|m| matches!(m, LatencyMetric::ScHistogram { .. }))
            || latency_metrics.iter().any(|m| side_is(m, Side::Sc))
        {
            let bucket = self
                .fragments
                .load_with(HISTOGRAM_BUCKETS, &[("DURATION_COLUMN", "sc.duration_ns")])?;
            select_extra.push(format!("({bucket}) AS sc_bucket_us"));
        }
        if latency_metrics.iter().any(|m| matches!(m, LatencyMetric::IoHistogram { .. }))
            || latency_metrics.iter().any(|m| side_is(m, Side::Io))
        {
            let bucket = self
                .fragments
                .load_with(HISTOGRAM_BUCKETS, &[("DURATION_COLUMN", "io.duration_ns")])?;
            select_extra.push(format!("({bucket}) AS io_bucket_us"));
        }

        let extra_sql = if select_extra.is_empty() {
            String::new()
        } else {
            format!(",\n{}", select_extra.join(",\n"))
        };
        let joins_sql = if joins.is_empty() {
            String::new()
        } else {
            format!("\n{}", joins.join("\n"))
        };

        let body = format!(
            "SELECT es.*{extra_sql}\nFROM enriched_samples AS es{joins_sql}",
        );
        let cte = Cte::new("base_samples", body);
        Ok(if self.materialize_base { cte.materialized() } else { cte })
    }

    /// One `<stream>_src AS (SELECT * FROM <glob>)` CTE per joinable
    /// non-base stream, so `base_samples`'s joins can reference them by
    /// name. Completion streams aren't themselves time-clipped here —
    /// they're narrowed transitively by the join onto `enriched_samples`.
    fn source_ctes(&mut self, joinable: &BTreeSet<Stream>) -> Result<Vec<Cte>> {
        let mut ctes = Vec::with_capacity(joinable.len());
        for s in joinable {
            let body = if *s == Stream::Partitions {
                let datadir_str = self.datadir.to_string_lossy().into_owned();
                self.fragments
                    .load_with(BASE_PARTITIONS, &[("XTOP_DATADIR", datadir_str.as_str())])?
            } else {
                let source_expr = time_filter::files_for(self.datadir, *s, None, None);
                format!("SELECT * FROM {source_expr}")
            };
            ctes.push(Cte::new(format!("{}_src", s.file_stem()), body));
        }
        Ok(ctes)
    }

    /// Compose the bucket CTEs (`sc_bucket_counts`, `sc_bucket_with_max`,
    /// `io_bucket_counts`, `io_bucket_with_max`) and `sample_counts`, per
    /// §4.5.1/§4.5.2: duration filters belong here, never in
    /// `base_samples`, so the base count isn't restricted to rows with a
    /// completed event.
    fn histogram_ctes(&self, group_cols: &[String], side: Side) -> Vec<Cte> {
        let bucket_col = match side {
            Side::Sc => "sc_bucket_us",
            Side::Io => "io_bucket_us",
        };
        let prefix = side.alias();
        let group_sql = if group_cols.is_empty() {
            String::new()
        } else {
            format!(", {}", group_cols.join(", "))
        };

        let counts = Cte::new(
            format!("{prefix}_bucket_counts"),
            format!(
                "SELECT {bucket_col} AS bucket_us{group_sql},\n\
                 \x20      COUNT(*) AS count,\n\
                 \x20      COUNT(*) * {bucket_col} / 1e6 AS est_time_s\n\
                 FROM base_samples\n\
                 WHERE {bucket_col} IS NOT NULL\n\
                 GROUP BY {bucket_col}{group_sql}"
            ),
        );
        let with_max = Cte::new(
            format!("{prefix}_bucket_with_max"),
            format!(
                "SELECT bucket_us, count, est_time_s{group_sql},\n\
                 \x20      MAX(est_time_s) OVER ({partition}) AS group_max\n\
                 FROM {prefix}_bucket_counts",
                partition = if group_cols.is_empty() {
                    String::new()
                } else {
                    format!("PARTITION BY {}", group_cols.join(", "))
                }
            ),
        );
        vec![counts, with_max]
    }

    /// Public contract: `build(group_cols, where_clause, time_range,
    /// latency_cols, limit) -> sql_text` (§4.5).
    pub fn build(&mut self, params: &QueryParams) -> Result<String> {
        let group_cols: Vec<String> = params
            .group_cols
            .iter()
            .map(|c| canonicalize(c))
            .filter(|c| !is_aggregate_pseudo_column(c))
            .collect();

        let latency_metrics: Vec<LatencyMetric> = params
            .latency_cols
            .iter()
            .filter_map(|c| parse_latency_metric(c))
            .collect();

        let mut requested: Vec<&str> = group_cols.iter().map(|s| s.as_str()).collect();
        requested.extend(params.latency_cols.iter().map(|s| s.as_str()));
        let needed_sources = ColumnRouter::sources_for(requested);
        let joinable = self.joinable_sources(&needed_sources);

        let has_sc_hist = latency_metrics.iter().any(|m| matches!(m, LatencyMetric::ScHistogram { .. }));
        let has_io_hist = latency_metrics.iter().any(|m| matches!(m, LatencyMetric::IoHistogram { .. }));
        let has_any_hist = has_sc_hist || has_io_hist;

        let mut q = CteQuery::new();
        q.push(self.enriched_samples_cte(params)?);
        for cte in self.source_ctes(&joinable)? {
            q.push(cte);
        }
        q.push(self.base_samples_cte(&joinable, &latency_metrics)?);

        if has_sc_hist && joinable.contains(&Stream::Syscend) {
            for cte in self.histogram_ctes(&group_cols, Side::Sc) {
                q.push(cte);
            }
        }
        if has_io_hist && joinable.contains(&Stream::Iorqend) {
            for cte in self.histogram_ctes(&group_cols, Side::Io) {
                q.push(cte);
            }
        }
        if has_any_hist {
            let group_sql = if group_cols.is_empty() {
                String::new()
            } else {
                format!(", {}", group_cols.join(", "))
            };
            q.push(Cte::new(
                "sample_counts",
                format!(
                    "SELECT COUNT(*) AS samples{group_sql}\nFROM base_samples\nGROUP BY {gb}",
                    gb = if group_cols.is_empty() { "()".to_string() } else { group_cols.join(", ") }
                ),
            ));
        }

        let elapsed_seconds = match (params.time_low, params.time_high) {
            (Some(lo), Some(hi)) => Some((hi - lo).num_milliseconds() as f64 / 1000.0),
            // Open Question 1 (SPEC_FULL.md §4): fall back to raw COUNT(*)
            // when the time range is absent.
            _ => None,
        };

        let select_sql = self.render_outer_select(
            &group_cols,
            &latency_metrics,
            &joinable,
            has_any_hist,
            elapsed_seconds,
            params,
        );
        q.set_final_select(select_sql);

        Ok(q.render())
    }

    #[allow(clippy::too_many_arguments)]
    fn render_outer_select(
        &self,
        group_cols: &[String],
        latency_metrics: &[LatencyMetric],
        joinable: &BTreeSet<Stream>,
        has_any_hist: bool,
        elapsed_seconds: Option<f64>,
        params: &QueryParams,
    ) -> String {
        let from_table = if has_any_hist { "sample_counts" } else { "base_samples" };
        // When histograms are requested, `sc_bucket_with_max`/
        // `io_bucket_with_max` are LEFT JOINed back onto `sample_counts`
        // and both sides carry identically-named group columns post-join
        // (§4.5.2) — qualify every group-column reference with
        // `sample_counts.` (the side that already carries one row per
        // group, per `join_on_group_cols`'s own qualification) to avoid
        // an ambiguous column reference. With no histogram, `base_samples`
        // is the sole source table, so unqualified names stay unambiguous
        // and unchanged.
        let qualify = |c: &str| -> String {
            if has_any_hist {
                format!("{from_table}.{c}")
            } else {
                c.to_string()
            }
        };
        let mut select_cols: Vec<String> = group_cols.iter().map(|c| qualify(c)).collect();

        let samples_expr = if has_any_hist {
            "sample_counts.samples".to_string()
        } else {
            "COUNT(*)".to_string()
        };
        select_cols.push(format!("{samples_expr} AS samples"));

        let avg_threads_expr = match elapsed_seconds {
            Some(secs) if secs > 0.0 => format!("{samples_expr} / {secs}"),
            _ => samples_expr.clone(),
        };
        select_cols.push(format!("{avg_threads_expr} AS avg_threads"));

        for metric in latency_metrics {
            select_cols.push(self.render_metric(metric, joinable));
        }

        let mut joins = Vec::new();
        if has_any_hist {
            if latency_metrics.iter().any(|m| matches!(m, LatencyMetric::ScHistogram { .. })) {
                let on = join_on_group_cols(group_cols, "sc_bucket_with_max", "sample_counts");
                joins.push(format!(
                    "LEFT JOIN sc_bucket_with_max ON {on}"
                ));
            }
            if latency_metrics.iter().any(|m| matches!(m, LatencyMetric::IoHistogram { .. })) {
                let on = join_on_group_cols(group_cols, "io_bucket_with_max", "sample_counts");
                joins.push(format!(
                    "LEFT JOIN io_bucket_with_max ON {on}"
                ));
            }
        }

        let where_sql = params
            .where_clause
            .as_ref()
            .filter(|w| !w.trim().is_empty())
            .map(|w| format!("\nWHERE ({w})"))
            .unwrap_or_default();

        let group_by_sql = if group_cols.is_empty() {
            String::new()
        } else {
            format!(
                "\nGROUP BY {}",
                group_cols.iter().map(|c| qualify(c)).collect::<Vec<_>>().join(", ")
            )
        };

        let limit_sql = params
            .limit
            .map(|n| format!("\nLIMIT {n}"))
            .unwrap_or_default();

        format!(
            "SELECT {cols}\nFROM {from_table}{joins}{where_sql}{group_by}\nORDER BY samples DESC{limit}",
            cols = select_cols.join(",\n       "),
            joins = if joins.is_empty() { String::new() } else { format!("\n{}", joins.join("\n")) },
            group_by = group_by_sql,
            limit = limit_sql,
        )
    }

    fn render_metric(&self, metric: &LatencyMetric, joinable: &BTreeSet<Stream>) -> String {
        match metric {
            LatencyMetric::Percentile { side, pct, requested } => {
                if !joinable.contains(&side.stream()) {
                    return format!("NULL AS {}", quote_ident(requested));
                }
                format!(
                    "ROUND(PERCENTILE_CONT({p}) WITHIN GROUP (ORDER BY {a}.duration_ns) / 1000.0, 1) AS {alias}",
                    p = *pct as f64 / 100.0,
                    a = side.alias(),
                    alias = quote_ident(requested),
                )
            }
            LatencyMetric::Avg { side, requested } => {
                if !joinable.contains(&side.stream()) {
                    return format!("NULL AS {}", quote_ident(requested));
                }
                format!(
                    "ROUND(AVG({a}.duration_ns) / 1000.0, 1) AS {alias}",
                    a = side.alias(),
                    alias = quote_ident(requested),
                )
            }
            LatencyMetric::Min { side, requested } => {
                if !joinable.contains(&side.stream()) {
                    return format!("NULL AS {}", quote_ident(requested));
                }
                format!(
                    "ROUND(MIN({a}.duration_ns) / 1000.0, 1) AS {alias}",
                    a = side.alias(),
                    alias = quote_ident(requested),
                )
            }
            LatencyMetric::Max { side, requested } => {
                if !joinable.contains(&side.stream()) {
                    return format!("NULL AS {}", quote_ident(requested));
                }
                format!(
                    "ROUND(MAX({a}.duration_ns) / 1000.0, 1) AS {alias}",
                    a = side.alias(),
                    alias = quote_ident(requested),
                )
            }
            LatencyMetric::ScHistogram { requested } => {
                if !joinable.contains(&Stream::Syscend) {
                    return format!("NULL AS {}", quote_ident(requested));
                }
                format!(
                    "STRING_AGG(DISTINCT sc_bucket_with_max.bucket_us || ':' || \
                     sc_bucket_with_max.count || ':' || sc_bucket_with_max.est_time_s || ':' || \
                     sc_bucket_with_max.group_max, ',' ORDER BY sc_bucket_with_max.bucket_us) AS {}",
                    quote_ident(requested),
                )
            }
            LatencyMetric::IoHistogram { requested } => {
                if !joinable.contains(&Stream::Iorqend) {
                    return format!("NULL AS {}", quote_ident(requested));
                }
                format!(
                    "STRING_AGG(DISTINCT io_bucket_with_max.bucket_us || ':' || \
                     io_bucket_with_max.count || ':' || io_bucket_with_max.est_time_s || ':' || \
                     io_bucket_with_max.group_max, ',' ORDER BY io_bucket_with_max.bucket_us) AS {}",
                    quote_ident(requested),
                )
            }
        }
    }

    /// `build_histogram_drill_down` (§4.5.6): reuse the enriched/base CTE
    /// construction but emit per-bucket rows instead of a wire string,
    /// optionally prefixed by time-bucket columns for a given
    /// granularity.
    pub fn build_histogram_drill_down(
        &mut self,
        kind: Side,
        where_clause: Option<&str>,
        time_low: Option<DateTime<Utc>>,
        time_high: Option<DateTime<Utc>>,
        granularity: Option<Granularity>,
    ) -> Result<String> {
        let params = QueryParams {
            group_cols: Vec::new(),
            where_clause: where_clause.map(|s| s.to_string()),
            time_low,
            time_high,
            latency_cols: match kind {
                Side::Sc => vec!["sc.avg_us".to_string()],
                Side::Io => vec!["io.avg_us".to_string()],
            },
            limit: None,
        };

        let requested_stream = kind.stream();
        let mut joinable = BTreeSet::new();
        if self.schema.has_all(requested_stream, required_join_keys(requested_stream)) {
            joinable.insert(requested_stream);
        } else {
            warn!("histogram drill-down requested for {:?} but required join keys are missing", kind);
        }

        let mut q = CteQuery::new();
        q.push(self.enriched_samples_cte(&params)?);
        for cte in self.source_ctes(&joinable)? {
            q.push(cte);
        }
        q.push(self.base_samples_cte(&joinable, &[matches!(kind, Side::Sc)
            .then(|| LatencyMetric::ScHistogram { requested: String::new() })
            .unwrap_or(LatencyMetric::IoHistogram { requested: String::new() })])?);

        let bucket_col = match kind {
            Side::Sc => "sc_bucket_us",
            Side::Io => "io_bucket_us",
        };

        let time_cols: Vec<&str> = granularity.map(|g| g.bucket_columns().to_vec()).unwrap_or_default();
        let mut select_cols: Vec<String> = time_cols.iter().map(|c| c.to_string()).collect();
        select_cols.push(format!("{bucket_col} AS bucket_us"));
        select_cols.push("COUNT(*) AS count".to_string());
        select_cols.push(format!("COUNT(*) * {bucket_col} / 1e6 AS est_time_s"));

        let mut group_order: Vec<String> = time_cols.iter().map(|c| c.to_string()).collect();
        group_order.push(bucket_col.to_string());

        let where_sql = {
            let mut clauses = vec![format!("{bucket_col} IS NOT NULL")];
            if let Some(w) = where_clause.filter(|s| !s.trim().is_empty()) {
                clauses.push(format!("({w})"));
            }
            format!("WHERE {}", clauses.join(" AND "))
        };

        let select_sql = format!(
            "SELECT {cols}\nFROM base_samples\n{where_sql}\nGROUP BY {gb}\nORDER BY {gb}",
            cols = select_cols.join(",\n       "),
            gb = group_order.join(", "),
        );
        q.set_final_select(select_sql);
        Ok(q.render())
    }
}

fn side_is(metric: &LatencyMetric, side: Side) -> bool {
    match metric {
        LatencyMetric::Percentile { side: s, .. }
        | LatencyMetric::Avg { side: s, .. }
        | LatencyMetric::Min { side: s, .. }
        | LatencyMetric::Max { side: s, .. } => *s == side,
        _ => false,
    }
}

fn join_on_group_cols(group_cols: &[String], left_alias: &str, right_alias: &str) -> String {
    if group_cols.is_empty() {
        "1 = 1".to_string()
    } else {
        group_cols
            .iter()
            .map(|c| format!("{left_alias}.{c} IS NOT DISTINCT FROM {right_alias}.{c}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Aggregate pseudo-columns (`samples`, `avg_threads`, `sclat_histogram`,
/// `iolat_histogram`) are silently removed from the effective group list
/// (§4.5.3).
fn is_aggregate_pseudo_column(col: &str) -> bool {
    matches!(col, "samples" | "avg_threads" | "sclat_histogram" | "iolat_histogram")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnInfo;

    fn schema_with_everything() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Stream::Syscend,
            vec!["tid", "sysc_seq_num", "duration_ns", "type"]
                .into_iter()
                .map(|c| ColumnInfo { name: c.to_string(), declared_type: "BIGINT".into() })
                .collect(),
        );
        reg.register(
            Stream::Iorqend,
            vec!["insert_tid", "iorq_seq_num", "duration_ns", "dev_maj", "dev_min"]
                .into_iter()
                .map(|c| ColumnInfo { name: c.to_string(), declared_type: "BIGINT".into() })
                .collect(),
        );
        reg.register(
            Stream::Kstacks,
            vec!["kstack_hash", "kstack_syms"]
                .into_iter()
                .map(|c| ColumnInfo { name: c.to_string(), declared_type: "VARCHAR".into() })
                .collect(),
        );
        reg.register(
            Stream::Ustacks,
            vec!["ustack_hash", "ustack_syms"]
                .into_iter()
                .map(|c| ColumnInfo { name: c.to_string(), declared_type: "VARCHAR".into() })
                .collect(),
        );
        reg.register(
            Stream::Partitions,
            vec!["dev_maj", "dev_min", "devname"]
                .into_iter()
                .map(|c| ColumnInfo { name: c.to_string(), declared_type: "VARCHAR".into() })
                .collect(),
        );
        reg
    }

    fn builder<'a>(schema: &'a SchemaRegistry, fragments: &'a mut FragmentLoader, dir: &'a std::path::Path) -> QueryBuilder<'a> {
        QueryBuilder::new(schema, fragments, dir)
    }

    #[test]
    fn parses_percentile_metric() {
        match parse_latency_metric("sc.p95_us").unwrap() {
            LatencyMetric::Percentile { side, pct, .. } => {
                assert_eq!(side, Side::Sc);
                assert_eq!(pct, 95);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn simplest_query_groups_by_state() {
        let schema = schema_with_everything();
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let mut b = builder(&schema, &mut fragments, dir.path());
        let params = QueryParams {
            group_cols: vec!["state".to_string()],
            where_clause: None,
            time_low: None,
            time_high: None,
            latency_cols: vec![],
            limit: Some(50),
        };
        let sql = b.build(&params).unwrap();
        assert!(sql.contains("GROUP BY state"));
        assert!(sql.contains("ORDER BY samples DESC"));
        assert!(sql.contains("LIMIT 50"));
    }

    #[test]
    fn aggregate_pseudo_columns_are_not_grouped_on() {
        let schema = schema_with_everything();
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let mut b = builder(&schema, &mut fragments, dir.path());
        let params = QueryParams {
            group_cols: vec!["state".to_string(), "samples".to_string()],
            where_clause: None,
            time_low: None,
            time_high: None,
            latency_cols: vec![],
            limit: None,
        };
        let sql = b.build(&params).unwrap();
        assert!(sql.contains("GROUP BY state"));
        assert!(!sql.contains("GROUP BY state, samples"));
    }

    #[test]
    fn missing_join_keys_fall_back_to_null_projection() {
        let schema = SchemaRegistry::new(); // nothing registered
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let mut b = builder(&schema, &mut fragments, dir.path());
        let params = QueryParams {
            group_cols: vec!["state".to_string()],
            where_clause: None,
            time_low: None,
            time_high: None,
            latency_cols: vec!["sc.p95_us".to_string()],
            limit: None,
        };
        let sql = b.build(&params).unwrap();
        assert!(sql.contains("NULL AS \"sc.p95_us\""));
    }

    #[test]
    fn histogram_request_pulls_in_sample_counts_cte() {
        let schema = schema_with_everything();
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let mut b = builder(&schema, &mut fragments, dir.path());
        let params = QueryParams {
            group_cols: vec!["state".to_string(), "syscall".to_string()],
            where_clause: None,
            time_low: None,
            time_high: None,
            latency_cols: vec!["sclat_histogram".to_string()],
            limit: None,
        };
        let sql = b.build(&params).unwrap();
        assert!(sql.contains("sample_counts"));
        assert!(sql.contains("sc_bucket_with_max"));
        assert!(sql.contains("STRING_AGG"));
        // Group columns are qualified with `sample_counts.` in the outer
        // SELECT/GROUP BY once a histogram join is present, since
        // `sc_bucket_with_max` carries identically-named group columns
        // post-join and an unqualified reference would be ambiguous.
        assert!(sql.contains("sample_counts.state"));
        assert!(sql.contains("sample_counts.syscall"));
        assert!(sql.contains("GROUP BY sample_counts.state, sample_counts.syscall"));
    }

    #[test]
    fn with_materialized_base_hints_base_samples_cte() {
        let schema = schema_with_everything();
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let params = QueryParams {
            group_cols: vec!["state".to_string()],
            where_clause: None,
            time_low: None,
            time_high: None,
            latency_cols: vec![],
            limit: None,
        };

        let sql = builder(&schema, &mut fragments, dir.path()).build(&params).unwrap();
        assert!(sql.contains("base_samples AS (\n"), "not materialized by default");
        assert!(!sql.contains("MATERIALIZED"));

        let sql = builder(&schema, &mut fragments, dir.path())
            .with_materialized_base(true)
            .build(&params)
            .unwrap();
        assert!(sql.contains("base_samples AS MATERIALIZED (\n"));
    }

    #[test]
    fn histogram_drill_down_groups_by_granularity_columns() {
        let schema = schema_with_everything();
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let mut b = builder(&schema, &mut fragments, dir.path());
        let sql = b
            .build_histogram_drill_down(Side::Sc, None, None, None, Some(Granularity::Minute))
            .unwrap();
        assert!(sql.contains("hh"));
        assert!(sql.contains("mi"));
        assert!(sql.contains("bucket_us IS NOT NULL"));
    }

    #[test]
    fn where_clause_is_wrapped_in_parens() {
        let schema = schema_with_everything();
        let mut fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let dir = tempfile::tempdir().unwrap();
        let mut b = builder(&schema, &mut fragments, dir.path());
        let params = QueryParams {
            group_cols: vec!["state".to_string()],
            where_clause: Some("state = 'RUN'".to_string()),
            time_low: None,
            time_high: None,
            latency_cols: vec![],
            limit: None,
        };
        let sql = b.build(&params).unwrap();
        assert!(sql.contains("WHERE (state = 'RUN')"));
    }
}
