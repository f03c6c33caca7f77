//! Error types for the query engine.
//!
//! All errors are represented by [`XtopError`] and propagated via
//! `Result<T, XtopError>`. Recoverable conditions (schema mismatches,
//! malformed histogram/JSON strings) are handled locally — a `tracing`
//! warning is logged and the pipeline keeps producing output — rather
//! than being returned as `Err`; the enum still carries those variants
//! so the few call sites that want a strict check can surface them.

/// Primary error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum XtopError {
    /// Datadir missing, no matching files, unknown fragment name.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required join key was absent from a non-base source.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The columnar runtime rejected the composed SQL.
    #[error("query runtime error while executing:\n{sql}")]
    RuntimeExecution {
        sql: String,
        #[source]
        source: duckdb::Error,
    },

    /// Malformed histogram string, invalid `extra_info` JSON, unparsable S10.
    #[error("parse error: {0}")]
    Parse(String),

    /// Attempt to back out past the root, or remove a filter that doesn't exist.
    #[error("navigation error: {0}")]
    Navigation(String),

    /// A named SQL fragment is not in the catalogue.
    #[error("fragment not found: {0}")]
    FragmentNotFound(String),
}

/// Coarse classification used for logging/monitoring, independent of the
/// specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XtopErrorKind {
    Configuration,
    Schema,
    Runtime,
    Parse,
    Navigation,
}

impl XtopError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> XtopErrorKind {
        match self {
            XtopError::Configuration(_) | XtopError::FragmentNotFound(_) => {
                XtopErrorKind::Configuration
            }
            XtopError::SchemaMismatch(_) => XtopErrorKind::Schema,
            XtopError::RuntimeExecution { .. } => XtopErrorKind::Runtime,
            XtopError::Parse(_) => XtopErrorKind::Parse,
            XtopError::Navigation(_) => XtopErrorKind::Navigation,
        }
    }

    /// Whether this error is recovered locally (pipeline still produces
    /// output) rather than propagated to the caller. `SchemaMismatch` and
    /// `Parse` are recoverable in the places that choose to catch them;
    /// everything else is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), XtopErrorKind::Schema | XtopErrorKind::Parse)
    }
}

pub type Result<T> = std::result::Result<T, XtopError>;
