//! Column Router (C4).
//!
//! For each requested column, decides which source stream(s) must be
//! joined. This is the single source of truth for "does this query need
//! stream X?" (`spec.md` §4.4) — the Query Builder never adds a join it
//! cannot justify through this module.

use std::collections::BTreeSet;

use crate::schema::canonicalize;
use crate::time_filter::Stream;

/// Computed columns resolve to `samples` alone — no extra join required
/// (§3.2, §4.4 rule 3).
const COMPUTED_COLUMNS: &[&str] = &[
    "filenamesum",
    "fext",
    "comm2",
    "connection",
    "kstack_current_func",
    "ustack_current_func",
    "yyyy",
    "mm",
    "dd",
    "hh",
    "mi",
    "ss",
    "s10",
];

/// Columns whose source is fixed regardless of prefix (§4.4 rule 2).
fn fixed_column_source(col: &str) -> Option<Stream> {
    match col {
        "kstack_hash" | "kstack_syms" | "kstack_current_func" => Some(Stream::Kstacks),
        "ustack_hash" | "ustack_syms" | "ustack_current_func" => Some(Stream::Ustacks),
        "devname" | "dev_maj" | "dev_min" => Some(Stream::Partitions),
        _ => None,
    }
}

/// Decide which stream a single requested column requires, applying the
/// `sc.`/`io.`/`ks.`/`us.` prefix rules (§4.4 rule 2) before falling back
/// to the fixed-source table and the computed-column catalogue.
pub fn source_for_column(col: &str) -> BTreeSet<Stream> {
    let col = canonicalize(col);
    let mut sources = BTreeSet::new();
    sources.insert(Stream::Samples);

    if let Some(rest) = col.strip_prefix("sc.") {
        sources.insert(Stream::Syscend);
        let _ = rest;
        return sources;
    }
    if let Some(rest) = col.strip_prefix("io.") {
        sources.insert(Stream::Iorqend);
        let _ = rest;
        return sources;
    }
    if let Some(rest) = col.strip_prefix("ks.") {
        sources.insert(Stream::Kstacks);
        let _ = rest;
        return sources;
    }
    if let Some(rest) = col.strip_prefix("us.") {
        sources.insert(Stream::Ustacks);
        let _ = rest;
        return sources;
    }

    if col == "sclat_histogram" {
        sources.insert(Stream::Syscend);
        return sources;
    }
    if col == "iolat_histogram" {
        sources.insert(Stream::Iorqend);
        return sources;
    }

    if let Some(stream) = fixed_column_source(&col) {
        sources.insert(stream);
        // devname transitively depends on iorqend (§4.4 rule 4): the
        // partitions map is only useful joined against a block I/O event
        // that carries dev_maj/dev_min.
        if stream == Stream::Partitions {
            sources.insert(Stream::Iorqend);
        }
        return sources;
    }

    if COMPUTED_COLUMNS.contains(&col.as_str()) {
        return sources;
    }

    // Unknown column: assume it lives on `samples` directly (the base
    // stream's own columns — `state`, `username`, `exe`, ... — aren't
    // individually enumerated here; they all resolve to `samples`).
    sources
}

/// Union the sources required across a whole requested column set,
/// always including `samples` (§4.4 rule 1).
pub struct ColumnRouter;

impl ColumnRouter {
    pub fn sources_for<'a>(requested_cols: impl IntoIterator<Item = &'a str>) -> BTreeSet<Stream> {
        let mut sources = BTreeSet::new();
        sources.insert(Stream::Samples);
        for col in requested_cols {
            sources.extend(source_for_column(col));
        }
        sources
    }
}
