//! xtop-engine — interactive performance-analysis engine for sampled
//! Linux thread-state snapshots.
//!
//! Ingests hourly CSV/Parquet shards produced by an external sampler
//! (base samples, syscall/I/O completions, stack symbolisation,
//! partition map), and turns a user-selected set of dimensions,
//! metrics, filters and a time range into a single composed query over
//! those sparsely-joined streams. The query engine (`query`, `router`,
//! `schema`, `time_filter`, `fragments`) is the hard part; `navigation`
//! and `peek` are the stateful/derived layers built on top of it.
//!
//! The terminal UI, raw CSV production, and the columnar runtime itself
//! are external collaborators — this crate only composes SQL and runs
//! it against an embedded DuckDB connection (`engine::QueryEngine`).

pub mod bucket;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fragments;
pub mod histogram;
pub mod navigation;
pub mod peek;
pub mod query;
pub mod router;
pub mod schema;
pub mod time_filter;
pub mod time_spec;
pub mod value;

pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use error::{Result, XtopError};
