//! Fragment Loader (C3).
//!
//! Loads named SQL fragments from a fixed on-disk catalogue
//! (`sql/fragments/*.sql`), caching the text for the process lifetime.
//! Placeholders follow one convention, `#NAME#`, substituted textually;
//! the caller is responsible for escaping. This is the *only* string
//! templating mechanism in the engine — everything else in C5 is
//! assembled structurally (`spec.md` §4.3, §9).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, XtopError};

/// Fragments shipped with the engine; every name here must resolve to a
/// file under `<catalogue_dir>/<name>.sql`.
pub const COMPUTED_COLUMNS: &str = "computed_columns";
pub const HISTOGRAM_BUCKETS: &str = "histogram_buckets";
pub const BASE_PARTITIONS: &str = "base_partitions";

/// Loads and caches fragment text. Instance-owned (not a process-wide
/// singleton) so tests can point it at a scratch catalogue directory
/// (`spec.md` §9's "replace global caches with instance-owned caches").
pub struct FragmentLoader {
    catalogue_dir: PathBuf,
    cache: HashMap<String, String>,
}

impl FragmentLoader {
    pub fn new(catalogue_dir: impl Into<PathBuf>) -> Self {
        FragmentLoader {
            catalogue_dir: catalogue_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Load `name`'s fragment text, reading from disk on first use and
    /// serving from the cache thereafter.
    pub fn load(&mut self, name: &str) -> Result<&str> {
        if !self.cache.contains_key(name) {
            let path = self.fragment_path(name);
            let text = std::fs::read_to_string(&path)
                .map_err(|_| XtopError::FragmentNotFound(name.to_string()))?;
            self.cache.insert(name.to_string(), text);
        }
        Ok(self.cache.get(name).expect("just inserted"))
    }

    /// Load a fragment and substitute `#PLACEHOLDER#` tokens.
    pub fn load_with(&mut self, name: &str, substitutions: &[(&str, &str)]) -> Result<String> {
        let mut text = self.load(name)?.to_string();
        for (key, value) in substitutions {
            text = text.replace(&format!("#{key}#"), value);
        }
        Ok(text)
    }

    fn fragment_path(&self, name: &str) -> PathBuf {
        self.catalogue_dir.join(format!("{name}.sql"))
    }
}

/// Locate the fragment catalogue shipped alongside the crate, for
/// consumers (the CLI) that don't want to think about the path.
pub fn default_catalogue_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("sql/fragments")
}
