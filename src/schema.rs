//! Schema Registry (C2).
//!
//! At startup, runs a zero-row `DESCRIBE` against each stream's glob and
//! records the columns actually present, with case-insensitive lookup.
//! Sources evolve independently of the engine — the registry is the
//! single place that knows what's actually there, so the rest of the
//! engine can degrade gracefully (`NULL AS <col>` projections, skipped
//! joins) instead of every caller re-deriving that knowledge.

use std::collections::HashMap;

use crate::error::{Result, XtopError};
use crate::time_filter::Stream;

/// One column as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

/// Canonicalise a column/stream identifier: lower-case, matching the
/// "Column canonicalisation" universal invariant (spec.md §8.1) — every
/// public API accepting column names behaves identically regardless of
/// case.
pub fn canonicalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[derive(Debug, Default)]
struct StreamSchema {
    /// Declaration order, original casing as seen from `DESCRIBE`.
    columns: Vec<ColumnInfo>,
    /// lower-case name -> index into `columns`.
    index: HashMap<String, usize>,
}

/// Discovers and caches per-stream column lists.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    streams: HashMap<Stream, StreamSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    /// Record the columns discovered for `stream`. Called once per
    /// stream during `QueryEngine` startup discovery (§4.8), or directly
    /// by tests that want to avoid running `DESCRIBE` against a real
    /// DuckDB connection.
    pub fn register(&mut self, stream: Stream, columns: Vec<ColumnInfo>) {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            index.insert(canonicalize(&c.name), i);
        }
        self.streams.insert(stream, StreamSchema { columns, index });
    }

    /// Whether `stream` was discovered at all (vs. e.g. an unreadable
    /// `partitions` file).
    pub fn has_stream(&self, stream: Stream) -> bool {
        self.streams.contains_key(&stream)
    }

    /// Case-insensitive column presence check.
    pub fn has(&self, stream: Stream, col: &str) -> bool {
        self.streams
            .get(&stream)
            .map(|s| s.index.contains_key(&canonicalize(col)))
            .unwrap_or(false)
    }

    /// The stream's own spelling of `col`, if present — used when
    /// composing SQL so generated identifiers match the source exactly
    /// regardless of how the caller cased the request.
    pub fn actual<'a>(&'a self, stream: Stream, col: &str) -> Option<&'a str> {
        let schema = self.streams.get(&stream)?;
        let idx = *schema.index.get(&canonicalize(col))?;
        Some(&schema.columns[idx].name)
    }

    /// Ordered column list for `stream`, or an empty slice if the stream
    /// was never discovered.
    pub fn columns(&self, stream: Stream) -> &[ColumnInfo] {
        self.streams
            .get(&stream)
            .map(|s| s.columns.as_slice())
            .unwrap_or(&[])
    }

    /// Strict check used by call sites that want a hard failure instead
    /// of the engine's usual graceful degradation (§7 `SchemaMismatch`).
    pub fn require(&self, stream: Stream, col: &str) -> Result<&str> {
        self.actual(stream, col).ok_or_else(|| {
            XtopError::SchemaMismatch(format!(
                "{} missing required column {col}",
                stream.file_stem()
            ))
        })
    }

    /// Whether every column in `cols` is present on `stream` — used by
    /// the Column Router to decide whether a join can be emitted at all
    /// (§4.2, §4.5.5).
    pub fn has_all(&self, stream: Stream, cols: &[&str]) -> bool {
        cols.iter().all(|c| self.has(stream, c))
    }
}
