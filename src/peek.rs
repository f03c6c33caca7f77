//! Peek Providers (C10).
//!
//! Given a focused `(row, column)`, derive a specialised sub-query or
//! transformation: a per-row histogram table, a per-row time-series
//! heatmap, a stack-trace lookup, or a pretty-printed JSON view (§4.10).
//! Peek providers never mutate navigation state — each function here
//! takes an immutable `&NavigationFrame`/row snapshot and returns data.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::Granularity;
use crate::engine::QueryEngine;
use crate::error::Result;
use crate::histogram::{build_heatmap, parse_histogram, HeatmapData, HeatmapObservation, HistogramTableData};
use crate::navigation::NavigationFrame;
use crate::query::builder::Side;
use crate::query::expr::quote_literal;
use crate::value::Value;

/// Build the WHERE clause scoping a peek to one row: the current
/// frame's filters plus an equality predicate per group-column value of
/// the focused row (§4.10).
fn row_scope_where(frame: &NavigationFrame, row: &crate::value::Row) -> String {
    let mut clauses = vec![frame.render_where()];
    for col in &frame.group_cols {
        let predicate = match row.get(col) {
            Some(Value::Text(s)) => format!("{col} = {}", quote_literal(s)),
            Some(Value::Integer(i)) => format!("{col} = {i}"),
            Some(Value::Float(f)) => format!("{col} = {f}"),
            Some(Value::Null) | None => format!("{col} IS NULL"),
        };
        clauses.push(predicate);
    }
    clauses.join(" AND ")
}

/// Histogram peek (§4.10): build a drill-down query scoped to the
/// focused row, parse its bucket rows into a [`HistogramTableData`].
pub fn histogram_peek(
    engine: &mut QueryEngine,
    frame: &NavigationFrame,
    row: &crate::value::Row,
    side: Side,
) -> Result<HistogramTableData> {
    let where_clause = row_scope_where(frame, row);
    let result = engine.execute_histogram_drill_down(side, Some(&where_clause), None, None, None)?;
    let raw = serialize_bucket_rows(&result);
    Ok(parse_histogram(&raw))
}

/// Time-series heatmap peek (§4.10): same builder, with a granularity
/// argument the caller can cycle through to re-run the query.
pub fn heatmap_peek(
    engine: &mut QueryEngine,
    frame: &NavigationFrame,
    row: &crate::value::Row,
    side: Side,
    granularity: Granularity,
) -> Result<HeatmapData> {
    let where_clause = row_scope_where(frame, row);
    let result =
        engine.execute_histogram_drill_down(side, Some(&where_clause), None, None, Some(granularity))?;

    let time_cols = granularity.bucket_columns();
    let mut observations = Vec::with_capacity(result.rows.len());
    for r in &result.rows {
        let ordinal = time_cols
            .iter()
            .filter_map(|c| r.get(*c).and_then(Value::as_f64))
            .fold(0i64, |acc, v| acc * 100 + v as i64);
        let bucket_us = r.get("bucket_us").and_then(Value::as_f64).unwrap_or(0.0) as u64;
        let count = r.get("count").and_then(Value::as_f64).unwrap_or(0.0) as u64;
        observations.push(HeatmapObservation { time_ordinal: ordinal, latency_bucket_us: bucket_us, count });
    }
    Ok(build_heatmap(&observations, granularity, |ordinal| format!("{ordinal:06}")))
}

/// Stack trace peek (§4.10): `engine.lookup_stack`, split on `;` into
/// ordered frames.
pub fn stack_trace_peek(engine: &QueryEngine, hash: i64, is_kernel: bool) -> Result<Vec<String>> {
    Ok(engine
        .lookup_stack(hash, is_kernel)?
        .map(|syms| syms.split(';').map(|s| s.to_string()).collect())
        .unwrap_or_default())
}

/// JSON peek (§4.10): parse the cell's string as JSON, pretty-print with
/// 2-space indent; on parse error, return the raw text plus the error.
pub fn json_peek(raw: &str) -> String {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
        Err(e) => {
            debug!(error = %e, "json peek: invalid JSON, showing raw text");
            format!("{raw}\n\n(invalid JSON at {e})")
        }
    }
}

/// Re-flatten a drill-down `ResultSet` (one row per bucket) into the
/// compact `"b:c:t:m,..."` wire form so it can be handed to
/// [`parse_histogram`] the same way a `sclat_histogram`/`iolat_histogram`
/// column would be.
fn serialize_bucket_rows(result: &crate::value::ResultSet) -> String {
    let max_time = result
        .rows
        .iter()
        .filter_map(|r| r.get("est_time_s").and_then(Value::as_f64))
        .fold(0.0_f64, f64::max);
    result
        .rows
        .iter()
        .filter_map(|r| {
            let bucket_us = r.get("bucket_us").and_then(Value::as_f64)? as u64;
            let count = r.get("count").and_then(Value::as_f64)? as u64;
            let est_time_s = r.get("est_time_s").and_then(Value::as_f64).unwrap_or(0.0);
            Some(format!("{bucket_us}:{count}:{est_time_s}:{max_time}"))
        })
        .collect::<Vec<_>>()
        .join(",")
}
