//! Black-box Time-Filter tests: real files on disk, not just string
//! assertions against a hand-built path (those live in the colocated
//! `#[cfg(test)]` module). Exercises the parquet/CSV exclusion rule
//! (spec.md §4.1) against files that actually exist.

mod common;

use std::fs;

use xtop_engine::time_filter::{files_for, Stream};

#[test]
fn csv_only_datadir_has_no_exclusion_clause() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("xcapture_samples_2026-01-15.03.csv"), "timestamp\n").unwrap();

    let expr = files_for(dir.path(), Stream::Samples, None, None);
    assert!(expr.contains("read_csv_auto"));
    assert!(!expr.contains("UNION ALL"));
}

#[test]
fn parquet_shard_excludes_its_own_hour_from_the_csv_side() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("xcapture_samples_2026-01-15.03.parquet"), b"").unwrap();
    fs::write(dir.path().join("xcapture_samples_2026-01-15.04.csv"), "timestamp\n").unwrap();

    let expr = files_for(dir.path(), Stream::Samples, None, None);
    assert!(expr.contains("UNION ALL"));
    assert!(expr.contains("read_parquet"));
    assert!(expr.contains("NOT IN ('2026-01-15.03')"));
}

#[test]
fn empty_datadir_still_produces_a_readable_glob_expression() {
    let dir = tempfile::tempdir().unwrap();
    let expr = files_for(dir.path(), Stream::Syscend, None, None);
    assert!(expr.contains("xcapture_syscend_"));
}
