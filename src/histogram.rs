//! Histogram & Heatmap Aggregator (C7).
//!
//! Consumes the compact `"b:c:t:m,b:c:t:m,..."` string form emitted by
//! the Query Builder (§3, §4.5.2) and produces a flat histogram table
//! model, a time-bucketed heatmap model, and a sparkline string.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::Granularity;
use crate::error::{Result, XtopError};

/// One row of the flat histogram breakdown (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRow {
    pub bucket_us: u64,
    pub count: u64,
    pub est_time_s: f64,
    pub est_events_per_s: f64,
    pub time_pct: f64,
    pub relative: f64,
    pub group_max: f64,
}

/// The parsed, ordered histogram table (§4.7 "table model").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramTableData {
    pub rows: Vec<HistogramRow>,
}

/// Eight-level Unicode block ramp used for sparkline rendering, carried
/// over from `original_source/xtop/core/heatmap_visualizer.py`'s own
/// palette (SPEC_FULL.md §2).
const SPARK_BLOCKS: &[char] = &['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Buckets beyond this are collapsed into one overflow bucket before
/// sparkline rendering only (SPEC_FULL.md §4, Open Question 2).
const SPARKLINE_OVERFLOW_THRESHOLD_US: u64 = 1 << 24;

/// Parse one `"bucket_us:count:est_time_s:group_max"` entry.
fn parse_entry(entry: &str) -> Result<(u64, u64, f64)> {
    let mut parts = entry.splitn(4, ':');
    let bucket_us: u64 = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| XtopError::Parse(format!("bad bucket_us in {entry:?}")))?;
    let count: u64 = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| XtopError::Parse(format!("bad count in {entry:?}")))?;
    let est_time_s: f64 = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| XtopError::Parse(format!("bad est_time_s in {entry:?}")))?;
    // group_max (4th field) is carried in the wire string so a renderer
    // doesn't need a second query, but the table model recomputes it
    // locally from the full row set, so it isn't parsed here.
    Ok((bucket_us, count, est_time_s))
}

/// Parse a compact histogram string into a [`HistogramTableData`].
/// Malformed entries are dropped with a debug-level warning rather than
/// failing the whole parse (§7 `ParseError` recovery policy) — unless
/// the string is empty, which parses to an empty table, not an error.
pub fn parse_histogram(raw: &str) -> HistogramTableData {
    if raw.trim().is_empty() {
        return HistogramTableData::default();
    }

    let mut parsed = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match parse_entry(entry) {
            Ok(triple) => parsed.push(triple),
            Err(e) => debug!("dropping malformed histogram entry {entry:?}: {e}"),
        }
    }
    parsed.sort_by_key(|(bucket_us, ..)| *bucket_us);

    let total_time: f64 = parsed.iter().map(|(_, _, t)| t).sum();
    let max_time = parsed.iter().map(|(_, _, t)| *t).fold(0.0_f64, f64::max);

    let rows = parsed
        .into_iter()
        .map(|(bucket_us, count, est_time_s)| HistogramRow {
            bucket_us,
            count,
            est_time_s,
            est_events_per_s: if est_time_s > 0.0 {
                count as f64 / est_time_s
            } else {
                0.0
            },
            time_pct: if total_time > 0.0 {
                est_time_s / total_time
            } else {
                0.0
            },
            relative: if max_time > 0.0 {
                est_time_s / max_time
            } else {
                0.0
            },
            group_max: max_time,
        })
        .collect();

    HistogramTableData { rows }
}

/// Re-serialise a table back into the compact wire form, in stable
/// (ascending bucket) order. Round-trips modulo entry order and
/// whitespace, per the "Histogram round trip" universal invariant
/// (§8.1): `parse_histogram(&serialize_histogram(parse_histogram(s)))`
/// has the same set of `(bucket_us, count, est_time_s)` triples as `s`.
pub fn serialize_histogram(data: &HistogramTableData) -> String {
    data.rows
        .iter()
        .map(|r| format!("{}:{}:{}:{}", r.bucket_us, r.count, r.est_time_s, r.group_max))
        .collect::<Vec<_>>()
        .join(",")
}

/// One heatmap cell key: a time bucket paired with a latency bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HeatmapKey {
    /// Formatted per the active [`Granularity`] (e.g. `"14"`, `"14:32"`,
    /// `"14:32:10"`).
    pub time_bucket: String,
    pub latency_bucket_us: u64,
}

/// Gap-filled `{(time_bucket, latency_bucket) -> count}` model (§4.7).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeatmapData {
    pub cells: BTreeMap<HeatmapKey, u64>,
    pub granularity: Option<Granularity>,
}

/// One raw observation feeding the heatmap: a time-bucket ordinal
/// (derived from the query's grouping columns), a latency bucket, and a
/// count.
#[derive(Debug, Clone, Copy)]
pub struct HeatmapObservation {
    pub time_ordinal: i64,
    pub latency_bucket_us: u64,
    pub count: u64,
}

/// Build a heatmap from raw observations, gap-filling every time-bucket
/// ordinal between the observed min and max with a zero row for every
/// latency bucket seen anywhere in the window (§4.7, §8.2 scenario 6).
pub fn build_heatmap(
    observations: &[HeatmapObservation],
    granularity: Granularity,
    format_ordinal: impl Fn(i64) -> String,
) -> HeatmapData {
    if observations.is_empty() {
        return HeatmapData {
            cells: BTreeMap::new(),
            granularity: Some(granularity),
        };
    }

    let min_t = observations.iter().map(|o| o.time_ordinal).min().unwrap();
    let max_t = observations.iter().map(|o| o.time_ordinal).max().unwrap();

    let latency_buckets: std::collections::BTreeSet<u64> = observations
        .iter()
        .map(|o| o.latency_bucket_us)
        .collect();

    let mut cells: BTreeMap<HeatmapKey, u64> = BTreeMap::new();
    for t in min_t..=max_t {
        let label = format_ordinal(t);
        for &lb in &latency_buckets {
            cells.insert(
                HeatmapKey {
                    time_bucket: label.clone(),
                    latency_bucket_us: lb,
                },
                0,
            );
        }
    }
    for obs in observations {
        let key = HeatmapKey {
            time_bucket: format_ordinal(obs.time_ordinal),
            latency_bucket_us: obs.latency_bucket_us,
        };
        *cells.entry(key).or_insert(0) += obs.count;
    }

    HeatmapData {
        cells,
        granularity: Some(granularity),
    }
}

impl HeatmapData {
    /// Normalised intensity (0.0–1.0) of one cell relative to the
    /// visible window's maximum cell value (§4.7).
    pub fn intensity(&self, key: &HeatmapKey) -> f64 {
        let max = self.cells.values().copied().max().unwrap_or(0);
        if max == 0 {
            return 0.0;
        }
        *self.cells.get(key).unwrap_or(&0) as f64 / max as f64
    }

    /// Map a normalised intensity to one of seven terminal palette steps
    /// (§4.7): 0 = coldest/empty, 6 = hottest.
    pub fn palette_step(intensity: f64) -> u8 {
        (intensity.clamp(0.0, 1.0) * 6.0).round() as u8
    }
}

/// Render a sparkline thumbnail from a histogram table, collapsing any
/// bucket beyond `2^24` microseconds into a single terminal bucket first
/// (SPEC_FULL.md §4, Open Question 2).
pub fn sparkline(data: &HistogramTableData) -> String {
    if data.rows.is_empty() {
        return String::new();
    }

    let mut collapsed: BTreeMap<u64, f64> = BTreeMap::new();
    for row in &data.rows {
        let key = row.bucket_us.min(SPARKLINE_OVERFLOW_THRESHOLD_US);
        *collapsed.entry(key).or_insert(0.0) += row.est_time_s;
    }

    let max = collapsed.values().copied().fold(0.0_f64, f64::max);
    collapsed
        .values()
        .map(|&v| {
            let level = if max > 0.0 {
                ((v / max) * (SPARK_BLOCKS.len() - 1) as f64).round() as usize
            } else {
                0
            };
            SPARK_BLOCKS[level.min(SPARK_BLOCKS.len() - 1)]
        })
        .collect()
}
