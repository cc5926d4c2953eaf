//! Build configuration.
//!
//! Defines the YAML document that tells a documentation build where to read
//! the schema from, where the entry-point definitions live, and where to
//! write the store and the schema snapshot.
//!
//! # Example YAML
//!
//! ```yaml
//! source:
//!   sqlite: app.db
//! requests: definitions/requests
//! procedures: definitions/procedures
//! store: out/documentation.db
//! snapshot_dir: out/schema
//! prefix: doc_
//! ```
//!
//! Every field is optional while parsing so that a partial file can be
//! completed from the command line. [`BuildConfig::validate`] reports every
//! missing parameter at once.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};

/// Table prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "doc_";

/// Where the live schema is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// SQLite database file to introspect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<PathBuf>,
    /// Previously emitted schema snapshot (`.json`, `.yml` or `.yaml`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

/// Resolved schema input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaInput {
    Sqlite(PathBuf),
    Snapshot(PathBuf),
}

/// Build configuration as read from YAML and command-line overrides.
///
/// # Examples
///
/// ```
/// use dal_doc_db::BuildConfig;
///
/// let config: BuildConfig = serde_yaml::from_str("requests: defs/requests").unwrap();
/// let missing = config.validate();
/// assert_eq!(missing.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub source: SourceConfig,
    /// Root directory of request definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<PathBuf>,
    /// Root directory of procedure definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedures: Option<PathBuf>,
    /// Documentation store file; removed and recreated on every build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
    /// Directory receiving `schema.json` and `schema.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    /// Table prefix inside the documentation store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// A complete configuration, ready for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub source: SchemaInput,
    pub requests: PathBuf,
    pub procedures: PathBuf,
    pub store: PathBuf,
    pub snapshot_dir: PathBuf,
    pub prefix: String,
}

impl BuildConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Relative paths in the file are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: BuildConfig = serde_yaml::from_reader(reader)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.rebased(base))
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns this configuration with every field set in `overrides`
    /// replacing the corresponding field here.
    ///
    /// Setting either schema source in `overrides` replaces both.
    pub fn merged(self, overrides: BuildConfig) -> Self {
        let source = if overrides.source.sqlite.is_some() || overrides.source.snapshot.is_some() {
            overrides.source
        } else {
            self.source
        };
        Self {
            source,
            requests: overrides.requests.or(self.requests),
            procedures: overrides.procedures.or(self.procedures),
            store: overrides.store.or(self.store),
            snapshot_dir: overrides.snapshot_dir.or(self.snapshot_dir),
            prefix: overrides.prefix.or(self.prefix),
        }
    }

    /// Lists every missing or invalid parameter.
    pub fn validate(&self) -> Vec<ConfigurationError> {
        let mut errors = Vec::new();

        match (&self.source.sqlite, &self.source.snapshot) {
            (None, None) => errors.push(ConfigurationError::MissingParameter("source")),
            (Some(_), Some(_)) => errors.push(ConfigurationError::Conflict(
                "source.sqlite",
                "source.snapshot",
            )),
            _ => {}
        }
        if let (Some(source), Some(store)) = (&self.source.sqlite, &self.store) {
            if same_location(source, store) {
                errors.push(ConfigurationError::Conflict("source.sqlite", "store"));
            }
        }
        if self.requests.is_none() {
            errors.push(ConfigurationError::MissingParameter("requests"));
        }
        if self.procedures.is_none() {
            errors.push(ConfigurationError::MissingParameter("procedures"));
        }
        if self.store.is_none() {
            errors.push(ConfigurationError::MissingParameter("store"));
        }
        if self.snapshot_dir.is_none() {
            errors.push(ConfigurationError::MissingParameter("snapshot_dir"));
        }
        if let Some(prefix) = &self.prefix {
            if !is_valid_prefix(prefix) {
                errors.push(ConfigurationError::InvalidPrefix(prefix.clone()));
            }
        }

        errors
    }

    /// Converts a complete configuration into a [`ResolvedConfig`].
    ///
    /// # Errors
    ///
    /// Returns the full list produced by [`validate`](Self::validate) when
    /// anything is missing.
    pub fn resolve(self) -> std::result::Result<ResolvedConfig, Vec<ConfigurationError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let source = match (self.source.sqlite, self.source.snapshot) {
            (Some(path), None) => SchemaInput::Sqlite(path),
            (None, Some(path)) => SchemaInput::Snapshot(path),
            _ => return Err(vec![ConfigurationError::MissingParameter("source")]),
        };
        let (Some(requests), Some(procedures), Some(store), Some(snapshot_dir)) =
            (self.requests, self.procedures, self.store, self.snapshot_dir)
        else {
            return Err(errors);
        };

        Ok(ResolvedConfig {
            source,
            requests,
            procedures,
            store,
            snapshot_dir,
            prefix: self.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        })
    }

    fn rebased(self, base: &Path) -> Self {
        let rebase = |p: Option<PathBuf>| p.map(|p| if p.is_relative() { base.join(p) } else { p });
        Self {
            source: SourceConfig {
                sqlite: rebase(self.source.sqlite),
                snapshot: rebase(self.source.snapshot),
            },
            requests: rebase(self.requests),
            procedures: rebase(self.procedures),
            store: rebase(self.store),
            snapshot_dir: rebase(self.snapshot_dir),
            prefix: self.prefix,
        }
    }
}

/// Returns `true` if both paths name the same file.
///
/// Paths that exist are compared after canonicalization, so `./app.db` and
/// an absolute path to it match.
pub fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Returns `true` if the prefix is non-empty and only contains alphanumerics
/// and underscores.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|c| c.is_alphanumeric() || c == '_')
}
