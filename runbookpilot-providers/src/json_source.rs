// runbookpilot-providers/src/json_source.rs
// ============================================================================
// Module: JSON Fixture Enrichment Source
// Description: Reads a JSON or YAML fixture file rooted under a configured
//              directory and returns it (or one field of it) as enrichment.
// Purpose: Let a deployment enrich alerts from local asset inventories or
//          static lookup tables without standing up an HTTP service.
// Dependencies: runbookpilot-core, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! This source never queries the alert itself — it is a read-only window
//! onto one file, re-read on every `enrich` call so an operator can update
//! the fixture without restarting the process. Path resolution is rooted:
//! `file` is always treated as relative to `root` and rejected if it would
//! canonicalize outside it, mirroring the path-escape guard a file-backed
//! evidence source needs regardless of domain. An optional `field_path`
//! narrows the returned value using the same dot/bracket-index syntax the
//! engine's own alert field lookups use, rather than a second expression
//! language.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use runbookpilot_core::EnrichmentError;
use runbookpilot_core::EnrichmentSource;
use runbookpilot_core::OpaqueValue;
use runbookpilot_core::core::resolve_field_path;

/// Configuration for one [`JsonFixtureSource`].
#[derive(Debug, Clone)]
pub struct JsonFixtureSourceConfig {
    /// Stable name this source registers under.
    pub name: String,
    /// Root directory every `file` is resolved relative to.
    pub root: PathBuf,
    /// Path to the fixture file, relative to `root`.
    pub file: PathBuf,
    /// Maximum file size accepted, in bytes.
    pub max_bytes: u64,
    /// Parse `.yaml`/`.yml` files as YAML instead of rejecting them.
    pub allow_yaml: bool,
    /// Dot/bracket-index path selecting a field of the parsed document;
    /// `None` returns the whole document.
    pub field_path: Option<String>,
    /// This source's timeout budget in milliseconds (file IO only; no
    /// network call is ever made, so this bounds are generous by default).
    pub timeout_ms: u64,
}

impl JsonFixtureSourceConfig {
    /// Builds a config reading the whole of `file` (relative to `root`).
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            file: file.into(),
            max_bytes: 1024 * 1024,
            allow_yaml: true,
            field_path: None,
            timeout_ms: 500,
        }
    }
}

/// Reads a JSON or YAML fixture file as enrichment data.
pub struct JsonFixtureSource {
    config: JsonFixtureSourceConfig,
}

impl JsonFixtureSource {
    /// Builds a source from `config`.
    ///
    /// # Errors
    /// Returns an error if `file` is absolute, or if `root` does not exist
    /// or is not a directory.
    pub fn new(config: JsonFixtureSourceConfig) -> Result<Self, String> {
        if config.file.is_absolute() {
            return Err(format!("fixture path {:?} must be relative to root", config.file));
        }
        if !config.root.is_dir() {
            return Err(format!("fixture root {:?} is not a directory", config.root));
        }
        Ok(Self { config })
    }

    fn resolve(&self) -> Result<PathBuf, EnrichmentError> {
        let root = self
            .config
            .root
            .canonicalize()
            .map_err(|err| EnrichmentError::Failed(format!("fixture root unreadable: {err}")))?;
        let joined = root.join(&self.config.file);
        let resolved = joined
            .canonicalize()
            .map_err(|_| EnrichmentError::Failed("fixture file not found".to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(EnrichmentError::Failed("fixture path escapes configured root".to_string()));
        }
        Ok(resolved)
    }
}

fn read_limited(path: &Path, max_bytes: u64) -> Result<Vec<u8>, EnrichmentError> {
    let metadata = std::fs::metadata(path).map_err(|err| EnrichmentError::Failed(err.to_string()))?;
    if metadata.len() > max_bytes {
        return Err(EnrichmentError::Failed(format!(
            "fixture file is {} bytes, exceeding the {max_bytes} byte limit",
            metadata.len()
        )));
    }
    std::fs::read(path).map_err(|err| EnrichmentError::Failed(err.to_string()))
}

fn parse_document(path: &Path, bytes: &[u8], allow_yaml: bool) -> Result<OpaqueValue, EnrichmentError> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default().to_ascii_lowercase();
    if extension == "yaml" || extension == "yml" {
        if !allow_yaml {
            return Err(EnrichmentError::Failed("yaml fixtures are disabled for this source".to_string()));
        }
        return serde_yaml::from_slice(bytes).map_err(|err| EnrichmentError::Failed(format!("invalid yaml fixture: {err}")));
    }
    serde_json::from_slice(bytes).map_err(|err| EnrichmentError::Failed(format!("invalid json fixture: {err}")))
}

#[async_trait]
impl EnrichmentSource for JsonFixtureSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    async fn enrich(&self, _alert: &OpaqueValue) -> Result<OpaqueValue, EnrichmentError> {
        let path = self.resolve()?;
        let bytes = read_limited(&path, self.config.max_bytes)?;
        let document = parse_document(&path, &bytes, self.config.allow_yaml)?;

        match &self.config.field_path {
            None => Ok(document),
            Some(path) => resolve_field_path(&document, path)
                .cloned()
                .ok_or_else(|| EnrichmentError::Failed(format!("fixture has no field at path {path:?}"))),
        }
    }
}
