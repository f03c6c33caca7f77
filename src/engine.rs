//! Query Engine Facade (C8).
//!
//! Owns exactly one `duckdb::Connection`, runs startup Schema Registry
//! discovery, and exposes the three blocking operations the rest of the
//! crate (and the CLI) actually call: `execute`, `available_columns`,
//! `lookup_stack`. This is the one place in the whole crate that
//! touches the runtime connection directly — every other module only
//! ever produces SQL text or consumes already-materialised rows.

use chrono::{DateTime, Utc};
use duckdb::Connection;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{Result, XtopError};
use crate::fragments::FragmentLoader;
use crate::query::builder::{QueryBuilder, QueryParams, Side};
use crate::schema::{ColumnInfo, SchemaRegistry};
use crate::time_filter::{self, Stream};
use crate::value::{ResultSet, Row, Value};

/// All known streams, in discovery order.
const ALL_STREAMS: &[Stream] = &[
    Stream::Samples,
    Stream::Syscend,
    Stream::Iorqend,
    Stream::Kstacks,
    Stream::Ustacks,
    Stream::Partitions,
];

/// Owns the runtime connection plus the caches built around it (§4.8).
pub struct QueryEngine {
    conn: Connection,
    config: EngineConfig,
    schema: SchemaRegistry,
    fragments: FragmentLoader,
}

impl QueryEngine {
    /// Open an in-memory DuckDB connection, apply `config`, and run
    /// Schema Registry discovery against every known stream.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| XtopError::Configuration(format!("failed to open duckdb: {e}")))?;
        if let Some(threads) = config.duckdb_threads {
            conn.execute(&format!("PRAGMA threads={threads}"), [])
                .map_err(|e| XtopError::Configuration(format!("failed to set duckdb threads: {e}")))?;
        }
        let fragments = FragmentLoader::new(crate::fragments::default_catalogue_dir());
        let mut engine = QueryEngine { conn, config, schema: SchemaRegistry::new(), fragments };
        engine.discover_schemas()?;
        Ok(engine)
    }

    /// Re-run Schema Registry discovery, e.g. after the sampler has
    /// started writing a stream that previously had no files.
    #[instrument(skip(self))]
    pub fn reset_schema_cache(&mut self) -> Result<()> {
        self.schema = SchemaRegistry::new();
        self.discover_schemas()
    }

    fn discover_schemas(&mut self) -> Result<()> {
        for &stream in ALL_STREAMS {
            let source = if stream == Stream::Partitions {
                let datadir_str = self.config.datadir.to_string_lossy().into_owned();
                self.fragments
                    .load_with(crate::fragments::BASE_PARTITIONS, &[("XTOP_DATADIR", datadir_str.as_str())])?
            } else {
                time_filter::files_for(&self.config.datadir, stream, None, None)
            };
            match self.describe(&format!("SELECT * FROM {source} LIMIT 0")) {
                Ok(columns) => {
                    debug!(stream = stream.file_stem(), n = columns.len(), "discovered stream schema");
                    self.schema.register(stream, columns);
                }
                Err(e) => {
                    warn!(stream = stream.file_stem(), error = %e, "stream unavailable at startup, skipping");
                }
            }
        }
        Ok(())
    }

    /// Run `DESCRIBE <sql>` and return the column list without
    /// materialising any rows.
    fn describe(&self, sql: &str) -> Result<Vec<ColumnInfo>> {
        let describe_sql = format!("DESCRIBE {sql}");
        let mut stmt = self
            .conn
            .prepare(&describe_sql)
            .map_err(|e| XtopError::RuntimeExecution { sql: describe_sql.clone(), source: e })?;
        let mut rows = stmt
            .query([])
            .map_err(|e| XtopError::RuntimeExecution { sql: describe_sql.clone(), source: e })?;
        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| XtopError::RuntimeExecution { sql: describe_sql.clone(), source: e })?
        {
            let name: String = row
                .get(0)
                .map_err(|e| XtopError::RuntimeExecution { sql: describe_sql.clone(), source: e })?;
            let declared_type: String = row
                .get(1)
                .map_err(|e| XtopError::RuntimeExecution { sql: describe_sql.clone(), source: e })?;
            columns.push(ColumnInfo { name, declared_type });
        }
        Ok(columns)
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `execute(params, latency_cols?) -> Result { columns, rows, elapsed }`
    /// (§4.8): delegates composition to the Query Builder, execution to
    /// the runtime.
    #[instrument(skip(self, params))]
    pub fn execute(&mut self, params: &QueryParams) -> Result<ResultSet> {
        let sql = {
            let mut builder = QueryBuilder::new(&self.schema, &mut self.fragments, &self.config.datadir)
                .with_materialized_base(self.config.use_materialized);
            builder.build(params)?
        };
        self.run(&sql)
    }

    /// `available_columns(params) -> list<col>` (§4.8): `DESCRIBE` over
    /// the composed query, no rows materialised. Honors
    /// `EngineConfig::use_materialized` the same way `execute` does, so a
    /// follow-up `available_columns` probe against an unchanged frame
    /// doesn't re-evaluate `base_samples`'s join chain from scratch.
    pub fn available_columns(&mut self, params: &QueryParams) -> Result<Vec<String>> {
        let sql = {
            let mut builder = QueryBuilder::new(&self.schema, &mut self.fragments, &self.config.datadir)
                .with_materialized_base(self.config.use_materialized);
            builder.build(params)?
        };
        Ok(self.describe(&sql)?.into_iter().map(|c| c.name).collect())
    }

    /// `lookup_stack(hash, is_kernel) -> text | none` (§4.8, §4.10):
    /// single-row query against the appropriate stack stream.
    pub fn lookup_stack(&self, hash: i64, is_kernel: bool) -> Result<Option<String>> {
        let (stream, hash_col, syms_col) = if is_kernel {
            (Stream::Kstacks, "kstack_hash", "kstack_syms")
        } else {
            (Stream::Ustacks, "ustack_hash", "ustack_syms")
        };
        if !self.schema.has(stream, hash_col) {
            return Ok(None);
        }
        let source = time_filter::files_for(&self.config.datadir, stream, None, None);
        let sql = format!(
            "SELECT {syms_col} FROM {source} WHERE {hash_col} = {hash} LIMIT 1",
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| XtopError::RuntimeExecution { sql: sql.clone(), source: e })?;
        let mut rows = stmt
            .query([])
            .map_err(|e| XtopError::RuntimeExecution { sql: sql.clone(), source: e })?;
        match rows.next().map_err(|e| XtopError::RuntimeExecution { sql: sql.clone(), source: e })? {
            Some(row) => {
                let syms: Option<String> = row
                    .get(0)
                    .map_err(|e| XtopError::RuntimeExecution { sql: sql.clone(), source: e })?;
                Ok(syms)
            }
            None => Ok(None),
        }
    }

    /// Build and run a histogram drill-down query (§4.5.6), for C10's
    /// histogram/time-series peek. A peek's granularity-cycling cycles
    /// through this same call repeatedly with only `granularity` varying
    /// (§4.10); honoring `use_materialized` here is the direct motivating
    /// case for the knob.
    pub fn execute_histogram_drill_down(
        &mut self,
        side: Side,
        where_clause: Option<&str>,
        time_low: Option<DateTime<Utc>>,
        time_high: Option<DateTime<Utc>>,
        granularity: Option<crate::config::Granularity>,
    ) -> Result<ResultSet> {
        let sql = {
            let mut builder = QueryBuilder::new(&self.schema, &mut self.fragments, &self.config.datadir)
                .with_materialized_base(self.config.use_materialized);
            builder.build_histogram_drill_down(side, where_clause, time_low, time_high, granularity)?
        };
        self.run(&sql)
    }

    fn run(&self, sql: &str) -> Result<ResultSet> {
        let start = std::time::Instant::now();
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| XtopError::RuntimeExecution { sql: sql.to_string(), source: e })?;
        let column_names: Vec<String> = stmt.column_names().into_iter().map(|s| s.to_string()).collect();
        let mut rows_cursor = stmt
            .query([])
            .map_err(|e| XtopError::RuntimeExecution { sql: sql.to_string(), source: e })?;

        let mut rows = Vec::new();
        while let Some(row) = rows_cursor
            .next()
            .map_err(|e| XtopError::RuntimeExecution { sql: sql.to_string(), source: e })?
        {
            let mut out: Row = Row::new();
            for (i, name) in column_names.iter().enumerate() {
                out.insert(name.clone(), read_value(row, i)?);
            }
            rows.push(out);
        }

        let elapsed_s = start.elapsed().as_secs_f64();
        info!(rows = rows.len(), elapsed_s, "query executed");
        Ok(ResultSet { columns: column_names, rows, elapsed_s })
    }
}

/// Read column `i` as the best-fitting [`Value`] variant. DuckDB's
/// `duckdb::types::Value` covers far more SQL types than the engine's
/// result model distinguishes; anything not an integer/float/text
/// collapses to its text representation rather than being dropped.
fn read_value(row: &duckdb::Row<'_>, i: usize) -> Result<Value> {
    use duckdb::types::ValueRef;
    let value_ref = row
        .get_ref(i)
        .map_err(|e| XtopError::RuntimeExecution { sql: String::new(), source: e })?;
    Ok(match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Integer(b as i64),
        ValueRef::TinyInt(n) => Value::Integer(n as i64),
        ValueRef::SmallInt(n) => Value::Integer(n as i64),
        ValueRef::Int(n) => Value::Integer(n as i64),
        ValueRef::BigInt(n) => Value::Integer(n),
        ValueRef::HugeInt(n) => Value::Integer(n as i64),
        ValueRef::UTinyInt(n) => Value::Integer(n as i64),
        ValueRef::USmallInt(n) => Value::Integer(n as i64),
        ValueRef::UInt(n) => Value::Integer(n as i64),
        ValueRef::UBigInt(n) => Value::Integer(n as i64),
        ValueRef::Float(f) => Value::Float(f as f64),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        other => Value::Text(format!("{other:?}")),
    })
}
