//! Computed-column catalogue (§3.2).
//!
//! A fixed set of projections derivable from `samples` alone. The
//! `kstack_current_func`/`ustack_current_func` pair is listed here even
//! though it also depends on the stack streams, because its *projection*
//! lives in `enriched_samples`/`base_samples` next to the others — the
//! Column Router (C4) still routes it to `kstacks`/`ustacks` for join
//! purposes.

/// Names of every column the computed-column catalogue can produce,
/// used by the Query Builder to recognise a requested column as
/// "already available, no extra work needed beyond the fixed SELECT
/// list" rather than a raw `samples` column.
pub const CATALOGUE: &[&str] = &[
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

pub fn is_computed(col: &str) -> bool {
    CATALOGUE.contains(&col.to_ascii_lowercase().as_str())
}

/// The `CASE ... END AS <col>` expression for `kstack_current_func` /
/// `ustack_current_func`: the top-of-stack frame name with any
/// `+offset` suffix stripped, `-` when the stack join produced nothing
/// (§3.2).
pub fn current_func_expr(syms_col: &str, alias: &str) -> String {
    format!(
        "CASE\n\
         \x20   WHEN {syms_col} IS NULL THEN '-'\n\
         \x20   ELSE regexp_replace(split_part({syms_col}, ';', 1), '\\+.*$', '')\n\
         END AS {alias}"
    )
}
