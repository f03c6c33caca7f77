//! Query composition (C5): builds the SQL text the engine hands to
//! DuckDB. See `builder` for the entry points; `cte`, `expr` and
//! `computed_columns` are its small supporting pieces.

pub mod builder;
pub mod computed_columns;
pub mod cte;
pub mod expr;

pub use builder::{parse_latency_metric, LatencyMetric, QueryBuilder, QueryParams, Side};
pub use cte::{Cte, CteQuery};
