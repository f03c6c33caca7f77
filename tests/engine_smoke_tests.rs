//! Black-box engine tests against a real embedded DuckDB connection and a
//! synthetic on-disk datadir — the one place the colocated `#[cfg(test)]`
//! modules don't reach, since those stick to schema/SQL-text assertions.
//! These smoke-test the full stack end to end instead of one component
//! in isolation.

mod common;

use chrono::{TimeZone, Utc};

use xtop_engine::config::EngineConfig;
use xtop_engine::engine::QueryEngine;
use xtop_engine::query::builder::QueryParams;
use xtop_engine::value::Value;

use common::{write_samples_csv, write_syscend_csv, SampleRow, SyscendRow};

/// §8.2 scenario 1: group by `state` over one hour, counts sum to the
/// total row count, `avg_threads ≈ samples / elapsed_seconds`.
#[test]
fn simplest_query_counts_and_avg_threads() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = Vec::new();
    for i in 0..60 {
        rows.push(SampleRow {
            timestamp: "2026-01-15 03:00:30",
            tid: 1000 + i,
            pid: 1000 + i,
            state: if i % 2 == 0 { "RUN" } else { "DISK" },
            username: "postgres",
            syscall: "read",
            sysc_seq_num: i,
        });
    }
    write_samples_csv(dir.path(), "2026-01-15", 3, &rows);

    let config = EngineConfig::new(dir.path());
    let mut engine = QueryEngine::new(config).unwrap();

    let params = QueryParams {
        group_cols: vec!["state".to_string()],
        where_clause: None,
        time_low: Some(Utc.with_ymd_and_hms(2026, 1, 15, 3, 0, 0).unwrap()),
        time_high: Some(Utc.with_ymd_and_hms(2026, 1, 15, 4, 0, 0).unwrap()),
        latency_cols: vec![],
        limit: Some(50),
    };
    let result = engine.execute(&params).unwrap();

    assert_eq!(result.rows.len(), 2, "one row per distinct state");
    let total: i64 = result
        .rows
        .iter()
        .map(|r| match r.get("samples") {
            Some(Value::Integer(n)) => *n,
            other => panic!("unexpected samples value {other:?}"),
        })
        .sum();
    assert_eq!(total, 60);

    for row in &result.rows {
        let samples = match row.get("samples").unwrap() {
            Value::Integer(n) => *n as f64,
            other => panic!("unexpected {other:?}"),
        };
        let avg_threads = match row.get("avg_threads").unwrap() {
            Value::Float(f) => *f,
            Value::Integer(n) => *n as f64,
            other => panic!("unexpected {other:?}"),
        };
        let expected = samples / 3600.0;
        assert!((avg_threads - expected).abs() < 1e-9, "{avg_threads} vs {expected}");
    }
}

/// §8.2 scenario 3: `syscend` lacking its optional `type` column still
/// lets a query referencing `sc.p95_us` execute and return a value.
#[test]
fn missing_optional_column_degrades_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<SampleRow> = (0..10)
        .map(|i| SampleRow {
            timestamp: "2026-01-15 03:00:30",
            tid: 2000 + i,
            pid: 2000 + i,
            state: "RUN",
            username: "postgres",
            syscall: "read",
            sysc_seq_num: i,
        })
        .collect();
    write_samples_csv(dir.path(), "2026-01-15", 3, &rows);

    let sc_rows: Vec<SyscendRow> = (0..10)
        .map(|i| SyscendRow { tid: 2000 + i, sysc_seq_num: i, duration_ns: 5_000 + i * 100 })
        .collect();
    write_syscend_csv(dir.path(), "2026-01-15", 3, &sc_rows, /* with_type */ false);

    let config = EngineConfig::new(dir.path());
    let mut engine = QueryEngine::new(config).unwrap();
    assert!(!engine.schema().has(xtop_engine::time_filter::Stream::Syscend, "type"));

    let params = QueryParams {
        group_cols: vec!["state".to_string()],
        where_clause: None,
        time_low: None,
        time_high: None,
        latency_cols: vec!["sc.p95_us".to_string()],
        limit: Some(10),
    };
    let result = engine.execute(&params).unwrap();
    assert_eq!(result.rows.len(), 1);
    assert!(result.columns.iter().any(|c| c == "sc.p95_us"));
    match result.rows[0].get("sc.p95_us") {
        Some(Value::Float(_)) | Some(Value::Integer(_)) => {}
        other => panic!("expected a numeric p95, got {other:?}"),
    }
}

/// `EngineConfig::use_materialized` hints `base_samples` `AS MATERIALIZED`
/// rather than changing the result shape — a grouped histogram query
/// (the case with the most `base_samples` references) must return
/// identical rows whether or not the flag is set.
#[test]
fn materialized_base_samples_does_not_change_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = Vec::new();
    let mut sc_rows = Vec::new();
    let durations = [900_i64, 900, 20_000, 20_000, 20_000];
    for (i, d) in durations.iter().enumerate() {
        let i = i as i64;
        rows.push(SampleRow {
            timestamp: "2026-01-15 03:00:30",
            tid: 400 + i,
            pid: 400 + i,
            state: "DISK",
            username: "postgres",
            syscall: "read",
            sysc_seq_num: i,
        });
        sc_rows.push(SyscendRow { tid: 400 + i, sysc_seq_num: i, duration_ns: *d });
    }
    write_samples_csv(dir.path(), "2026-01-15", 3, &rows);
    write_syscend_csv(dir.path(), "2026-01-15", 3, &sc_rows, true);

    let params = xtop_engine::query::builder::QueryParams {
        group_cols: vec!["state".to_string()],
        where_clause: None,
        time_low: None,
        time_high: None,
        latency_cols: vec!["sclat_histogram".to_string()],
        limit: None,
    };

    let mut plain_config = EngineConfig::new(dir.path());
    plain_config.use_materialized = false;
    let mut plain_engine = QueryEngine::new(plain_config).unwrap();
    let plain_result = plain_engine.execute(&params).unwrap();

    let mut materialized_config = EngineConfig::new(dir.path());
    materialized_config.use_materialized = true;
    let mut materialized_engine = QueryEngine::new(materialized_config).unwrap();
    let materialized_result = materialized_engine.execute(&params).unwrap();

    assert_eq!(plain_result.rows.len(), materialized_result.rows.len());
    assert_eq!(
        plain_result.rows[0].get("sclat_histogram"),
        materialized_result.rows[0].get("sclat_histogram"),
    );
}

/// `lookup_stack` against a stream that was never discovered (no
/// `kstacks`/`ustacks` files on disk) returns `None` rather than erroring.
#[test]
fn lookup_stack_absent_stream_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(dir.path());
    let engine = QueryEngine::new(config).unwrap();
    assert_eq!(engine.lookup_stack(42, true).unwrap(), None);
    assert_eq!(engine.lookup_stack(42, false).unwrap(), None);
}
