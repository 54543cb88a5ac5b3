//! Run configuration.
//!
//! Handles loading, validating, and merging `outline-split.toml`. Stock
//! defaults are the base layer; a config file overrides them; command-line
//! flags override both (applied in `main`).
//!
//! ## Config File Location
//!
//! By default `outline-split.toml` is read from the working directory if it
//! exists. `--config <file>` names a file explicitly, which must then exist.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [outline]
//! path = "bookmarks.xml"    # Bookmark export (.xml or .json)
//!
//! [source]
//! path = "core.pdf"         # The PDF to split
//!
//! [output]
//! dir = "kb"                # Root of the artifact tree
//! artifact_name = "source.pdf"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! limit = 50                # Max tasks per run (omit for no limit)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "outline-split.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `outline-split.toml`.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartitionConfig {
    pub outline: OutlineConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub processing: ProcessingConfig,
}

impl PartitionConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output.dir must not be empty".into(),
            ));
        }
        let name = &self.output.artifact_name;
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "output.artifact_name must be a plain file name".into(),
            ));
        }
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ConfigError::Validation(
                "output.artifact_name must end in .pdf".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.processing.limit == Some(0) {
            return Err(ConfigError::Validation(
                "processing.limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where the bookmark tree comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlineConfig {
    /// Bookmark export file. `.xml` or `.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// The PDF to split.
    pub path: Option<PathBuf>,
}

/// Output tree layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Root of the artifact tree.
    pub dir: PathBuf,
    /// File name of each artifact inside its leaf directory.
    pub artifact_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("kb"),
            artifact_name: "source.pdf".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel split workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Maximum number of tasks executed per run. The rest wait for the next.
    pub limit: Option<usize>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PartitionConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PartitionConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PartitionConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `outline-split.toml` from `dir`, falling back to stock defaults when
/// there is none.
pub fn load_config(dir: &Path) -> Result<PartitionConfig, ConfigError> {
    resolve_config(load_raw_config(&dir.join(CONFIG_FILENAME))?)
}

/// Load an explicitly named config file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<PartitionConfig, ConfigError> {
    match load_raw_config(path)? {
        Some(value) => resolve_config(Some(value)),
        None => Err(ConfigError::NotFound(path.to_path_buf())),
    }
}

/// Returns a fully-commented stock `outline-split.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# outline-split configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Outline
# ---------------------------------------------------------------------------
[outline]
# Bookmark export to partition by: an XML export (<ITEM NAME=".." PAGE="..">)
# or a JSON tree ({"name", "page", "children"}). Pages are 0-based.
# path = "bookmarks.xml"

# ---------------------------------------------------------------------------
# Source
# ---------------------------------------------------------------------------
[source]
# The PDF to split.
# path = "core.pdf"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Root of the artifact tree. Each leaf lands in <dir>/<group>/<leaf>/.
dir = "kb"

# File name of each artifact inside its leaf directory.
artifact_name = "source.pdf"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel split workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Maximum number of partitions split per run. The rest are picked up by the
# next run. Omit for no limit.
# limit = 50
"##
}
