// contrato-config/src/lib.rs
// ============================================================================
// Module: Contrato Config Library
// Description: Public API surface for contrato.toml loading and validation.
// Purpose: Expose the canonical configuration model.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Canonical configuration for the `contrato` CLI. Loading is fail-closed:
//! oversized, non UTF-8, unparsable or inconsistent files are rejected, and
//! the configured layout is compiled into a blueprint before it is accepted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::ContratoConfig;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::MAX_CONFIG_FILE_SIZE;
pub use config::QueryConfig;
pub use config::RenderConfig;
pub use config::UniverseConfig;
