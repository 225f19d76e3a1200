// contrato-config/src/config.rs
// ============================================================================
// Module: Contrato Configuration
// Description: Configuration loading and validation for the contrato CLI.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: contrato-core, contrato-universe, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file resolved from an explicit path,
//! then `CONTRATO_CONFIG`, then `./contrato.toml`. Reads are size-limited and
//! must be UTF-8. [`ContratoConfig::validate`] checks every bound and
//! compiles the query layout, so a config that loads is one the resolver can
//! run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use contrato_core::Blueprint;
use contrato_universe::DEFAULT_CONCURRENCY;
use contrato_universe::DEFAULT_MAX_FILE_BYTES;
use contrato_universe::LoadOptions;
use contrato_universe::MAX_CONCURRENCY;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "contrato.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CONTRATO_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `universe.max_file_bytes`.
const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level contrato configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContratoConfig {
    /// Universe loading.
    pub universe: UniverseConfig,
    /// Query inputs.
    #[serde(default)]
    pub query: QueryConfig,
    /// Optional rendering inputs.
    #[serde(default)]
    pub render: Option<RenderConfig>,
}

impl ContratoConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.universe.validate()?;
        self.query.validate()?;
        if let Some(render) = &self.render {
            render.validate()?;
        }
        Ok(())
    }

    /// Loader options for the configured universe.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        self.universe.load_options()
    }

    /// Compiled blueprint, when a layout is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the layout or skeleton is invalid.
    pub fn blueprint(&self) -> Result<Option<Blueprint>, ConfigError> {
        self.query.blueprint()
    }
}

/// Universe loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Root of the contract document tree.
    pub directory: PathBuf,
    /// Ignore aliases.
    #[serde(default)]
    pub canonical_only: bool,
    /// Documents read concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-document size limit in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl UniverseConfig {
    /// Validates universe settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("universe.directory", &self.directory)?;
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "universe.concurrency must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        if self.max_file_bytes == 0 || self.max_file_bytes > MAX_DOCUMENT_BYTES {
            return Err(ConfigError::Invalid(format!(
                "universe.max_file_bytes must be between 1 and {MAX_DOCUMENT_BYTES}"
            )));
        }
        Ok(())
    }

    /// Loader options for these settings.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            canonical_only: self.canonical_only,
            concurrency: self.concurrency,
            max_file_bytes: self.max_file_bytes,
            ..LoadOptions::default()
        }
    }
}

/// Query configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Blueprint layout, keyed by contract type.
    #[serde(default)]
    pub layout: Option<Value>,
    /// Context skeleton.
    #[serde(default)]
    pub skeleton: Option<Value>,
    /// Cap on yielded contexts.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryConfig {
    /// Validates query settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == Some(0) {
            return Err(ConfigError::Invalid("query.limit must be positive".to_string()));
        }
        if self.layout.is_none() && self.skeleton.is_some() {
            return Err(ConfigError::Invalid("query.skeleton requires query.layout".to_string()));
        }
        self.blueprint().map(|_| ())
    }

    /// Compiles the layout and skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the layout or skeleton is invalid.
    pub fn blueprint(&self) -> Result<Option<Blueprint>, ConfigError> {
        let Some(layout) = &self.layout else {
            return Ok(None);
        };
        Blueprint::new(layout.clone(), self.skeleton.clone())
            .map(Some)
            .map_err(|err| ConfigError::Invalid(format!("query.layout: {err}")))
    }
}

/// Rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Template file.
    pub template: PathBuf,
    /// Partials directory.
    pub partials: PathBuf,
}

impl RenderConfig {
    /// Validates render settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("render.template", &self.template)?;
        validate_path_field("render.partials", &self.partials)
    }
}

/// Default read concurrency.
const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Default per-document size limit.
const fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path field.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    validate_path(path).map_err(|_| ConfigError::Invalid(format!("{field} exceeds max length")))
}
