// contrato-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for contrato-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use contrato_config::ConfigError;
use contrato_config::ContratoConfig;

/// Result type for fallible tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `ContratoConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<ContratoConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ContratoConfig, toml::de::Error> {
    config_from_toml("[universe]\ndirectory = \"contracts\"\n")
}

/// Asserts `result` failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
