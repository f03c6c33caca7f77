//! Latency Bucketer (C6).
//!
//! Pure, shared rule mapping a duration in nanoseconds to a power-of-two
//! microsecond bucket (`spec.md` §3.3). Exposed both as the SQL fragment
//! `histogram_buckets.sql` (so the runtime can bucket inside a query)
//! and as this in-process function, used by renderers and by peek
//! providers that need to re-derive a bucket label without a query.

/// Map a duration in nanoseconds to its bucket's upper bound in
/// microseconds, or `None` for null/non-positive durations (§3.3).
///
/// `bucket_us = 2 ^ ceil(log2(ceil(d_ns / 1000)))`. Monotonic: for all
/// `0 < a < b`, `bucket_us(a) <= bucket_us(b)`, and every bucket is a
/// power of two `>= 1`.
pub fn bucket_us(d_ns: i64) -> Option<u64> {
    if d_ns <= 0 {
        return None;
    }
    let d_us = (d_ns as f64 / 1000.0).ceil();
    let bucket = 2f64.powf((d_us.max(1.0)).log2().ceil());
    Some(bucket as u64)
}

/// The human-readable `[lo, hi]` latency range for a bucket, per §3.3
/// ("closed upper bound").
pub fn bucket_label(bucket_us: u64) -> String {
    let lo = bucket_us / 2;
    format!("[{lo}, {bucket_us}]")
}

/// Estimated time spent in a bucket, per §3.4:
/// `count * bucket_us / 1_000_000`.
pub fn estimated_time_s(count: u64, bucket_us: u64) -> f64 {
    (count as f64) * (bucket_us as f64) / 1_000_000.0
}

/// One aggregated bucket row, as produced for histogram/heatmap
/// rendering (§2, C6 postcondition "count, estimated_time_s, group_max").
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRow {
    pub bucket_us: u64,
    pub count: u64,
    pub est_time_s: f64,
    /// `MAX(est_time_s)` across every bucket in the same group, computed
    /// so a downstream renderer can normalise bar heights without a
    /// second query (§4.5.2).
    pub group_max: f64,
}

/// Reduce raw `(bucket_us, count)` pairs into `BucketRow`s with
/// `est_time_s` and `group_max` filled in.
pub fn bucket_rows(counts: impl IntoIterator<Item = (u64, u64)>) -> Vec<BucketRow> {
    let mut rows: Vec<BucketRow> = counts
        .into_iter()
        .map(|(bucket_us, count)| BucketRow {
            bucket_us,
            count,
            est_time_s: estimated_time_s(count, bucket_us),
            group_max: 0.0,
        })
        .collect();
    rows.sort_by_key(|r| r.bucket_us);
    let group_max = rows.iter().map(|r| r.est_time_s).fold(0.0_f64, f64::max);
    for r in &mut rows {
        r.group_max = group_max;
    }
    rows
}
