//! Time-Filter (C1).
//!
//! Translates a `(low, high)` instant pair into a glob/union expression
//! naming the minimum set of hourly source files a stream could need,
//! per `spec.md` §4.1. This component never fails on absent files — it
//! only returns a SQL-readable `FROM`-clause expression; DuckDB treats a
//! glob with zero matches as an empty relation.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// One logical source stream (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stream {
    Samples,
    Syscend,
    Iorqend,
    Kstacks,
    Ustacks,
    Partitions,
}

impl Stream {
    pub fn file_stem(self) -> &'static str {
        match self {
            Stream::Samples => "samples",
            Stream::Syscend => "syscend",
            Stream::Iorqend => "iorqend",
            Stream::Kstacks => "kstacks",
            Stream::Ustacks => "ustacks",
            Stream::Partitions => "partitions",
        }
    }
}

/// Build the glob/union `FROM`-clause expression for `stream` over
/// `[low, high)`, rooted at `datadir`.
///
/// Rules (§4.1):
/// - both bounds absent → unconstrained glob.
/// - same calendar day → hour character-class glob, falling back to
///   `.??.` when the range straddles a tens boundary.
/// - otherwise → unconstrained glob (the caller's `timestamp` predicate
///   narrows it down; no multi-day brace expansion is attempted).
///
/// Per-hour parquet is preferred over CSV; when both a parquet and a CSV
/// glob could match, the expression `UNION ALL`s them, with the CSV side
/// restricted to hours that have no parquet counterpart on disk, so no
/// sample is double counted.
pub fn files_for(
    datadir: &std::path::Path,
    stream: Stream,
    low: Option<DateTime<Utc>>,
    high: Option<DateTime<Utc>>,
) -> String {
    let stem = stream.file_stem();
    let base = datadir.display();

    let hour_glob = match (low, high) {
        (Some(lo), Some(hi)) if same_calendar_day(lo, hi) => {
            hour_class_glob(lo.hour(), hi.hour())
        }
        _ => None,
    };

    let date_glob = match (low, high) {
        (Some(lo), Some(_)) if hour_glob.is_some() => lo.format("%Y-%m-%d").to_string(),
        _ => "*".to_string(),
    };

    let hour_part = hour_glob.unwrap_or_else(|| "*".to_string());

    render_source_expr(&base.to_string(), stem, &date_glob, &hour_part)
}

fn same_calendar_day(lo: DateTime<Utc>, hi: DateTime<Utc>) -> bool {
    lo.year() == hi.year() && lo.ordinal() == hi.ordinal()
}

/// Build a DuckDB-readable character-class hour glob, e.g. `.0[3-5].` for
/// hours 3–5, falling back to `.??.` when `lo`/`hi` don't share a tens
/// digit (straddling e.g. 8–12).
fn hour_class_glob(lo: u32, hi: u32) -> Option<String> {
    if lo > hi {
        return None;
    }
    let lo_tens = lo / 10;
    let hi_tens = hi / 10;
    if lo_tens != hi_tens {
        return Some(".??.".to_string());
    }
    let lo_ones = lo % 10;
    let hi_ones = hi % 10;
    if lo_ones == hi_ones {
        Some(format!(".{lo_tens}{lo_ones}."))
    } else {
        Some(format!(".{lo_tens}[{lo_ones}-{hi_ones}]."))
    }
}

/// Render the parquet/CSV union expression for one stream, given a
/// (possibly wildcard) date and hour fragment.
///
/// When no parquet files exist under `datadir` for this stream at all,
/// the CSV-only glob is returned directly (the common case for a
/// sampler that hasn't been configured to emit parquet). Otherwise both
/// globs are unioned, with the CSV side's `filename` pseudo-column
/// excluding exactly the `(date, hour)` pairs a parquet file already
/// covers, so no row is read twice.
fn render_source_expr(datadir: &str, stem: &str, date_glob: &str, hour_glob: &str) -> String {
    let hour_mid = if hour_glob == "*" {
        "*".to_string()
    } else {
        // hour_glob already carries its own leading/trailing dots.
        hour_glob.trim_matches('.').to_string()
    };
    let parquet_glob = format!("{datadir}/xcapture_{stem}_{date_glob}.{hour_mid}.parquet");
    let csv_glob = format!("{datadir}/xcapture_{stem}_{date_glob}.{hour_mid}.csv");

    let covered = parquet_covered_hours(std::path::Path::new(datadir), stem);
    if covered.is_empty() {
        return format!("read_csv_auto('{csv_glob}', union_by_name=true)");
    }

    let exclude_list = covered
        .iter()
        .map(|key| format!("'{key}'"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "(SELECT * FROM read_parquet('{parquet_glob}', union_by_name=true)\n\
         UNION ALL\n\
         SELECT * FROM read_csv_auto('{csv_glob}', union_by_name=true, filename=true)\n\
         WHERE regexp_extract(filename, 'xcapture_{stem}_(.*)\\.csv$', 1) NOT IN ({exclude_list}))",
    )
}

/// `{date}.{hour}` keys that already have a parquet shard on disk for
/// this stream, used to exclude the matching CSV shard from the union.
fn parquet_covered_hours(datadir: &std::path::Path, stem: &str) -> Vec<String> {
    let prefix = format!("xcapture_{stem}_");
    let Ok(entries) = std::fs::read_dir(datadir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter_map(|name| {
            let rest = name.strip_prefix(&prefix)?;
            let key = rest.strip_suffix(".parquet")?;
            Some(key.to_string())
        })
        .collect()
}
