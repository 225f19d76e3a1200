// contrato-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for input resolution and bounded reads.
// Purpose: Ensure CLI inputs fail closed and resolve end to end.
// Dependencies: contrato-cli main helpers
// ============================================================================

//! ## Overview
//! Validates bounded reads, flag-only input resolution and a full
//! load-resolve-render pass over a temporary universe.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

use super::QueryCommand;
use super::ReadLimitError;
use super::load;
use super::read_bytes_with_limit;
use super::render_context;
use super::resolve_query_inputs;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes `value` as JSON, creating parent directories.
fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

/// Universe with two devices and one architecture, plus a layout file.
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_json(
        &root.join("contracts/intel-nuc.json"),
        &json!({"type": "hw.device-type", "slug": "intel-nuc", "name": "Intel NUC"}),
    );
    write_json(
        &root.join("contracts/raspberry-pi.json"),
        &json!({"type": "hw.device-type", "slug": "raspberry-pi", "name": "Raspberry Pi"}),
    );
    write_json(&root.join("contracts/armv7hf.json"), &json!({"type": "arch.sw", "slug": "armv7hf"}));
    write_json(&root.join("layout.json"), &json!({"hw.device-type": 1, "arch.sw": 1}));
    dir
}

fn flags(dir: &TempDir) -> QueryCommand {
    QueryCommand {
        universe: Some(dir.path().join("contracts")),
        layout: Some(dir.path().join("layout.json")),
        ..QueryCommand::default()
    }
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

#[test]
fn read_bytes_with_limit_allows_small_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.json");
    fs::write(&path, b"{}").unwrap();
    assert_eq!(read_bytes_with_limit(&path, 2).unwrap(), b"{}".to_vec());
}

#[test]
fn read_bytes_with_limit_rejects_large_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.json");
    fs::write(&path, b"[1,2,3]").unwrap();
    match read_bytes_with_limit(&path, 3) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 7);
            assert_eq!(limit, 3);
        }
        other => panic!("expected size error, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Input Resolution
// ============================================================================

#[test]
fn flags_alone_resolve_inputs() {
    let dir = workspace();
    let inputs = resolve_query_inputs(&flags(&dir)).unwrap();
    assert!(inputs.config.is_none());
    assert_eq!(inputs.blueprint.layout().types().len(), 2);
    assert!(inputs.limit.is_none());
    assert!(!inputs.options.canonical_only);
}

#[test]
fn zero_limit_rejected() {
    let dir = workspace();
    let command = QueryCommand {
        limit: Some(0),
        ..flags(&dir)
    };
    let err = resolve_query_inputs(&command).unwrap_err();
    assert!(err.to_string().contains("limit"));
}

#[test]
fn invalid_layout_rejected() {
    let dir = workspace();
    write_json(&dir.path().join("layout.json"), &json!({"hw.device-type": "abc"}));
    let err = resolve_query_inputs(&flags(&dir)).unwrap_err();
    assert!(err.to_string().contains("invalid blueprint"));
}

#[test]
fn explicit_config_supplies_missing_flags() {
    let dir = workspace();
    let config_path = dir.path().join("contrato.toml");
    let directory = dir.path().join("contracts");
    fs::write(
        &config_path,
        format!(
            "[universe]\ndirectory = {:?}\ncanonical_only = true\n[query]\nlimit = 1\n",
            directory.to_string_lossy()
        ),
    )
    .unwrap();
    let command = QueryCommand {
        config: Some(config_path),
        layout: Some(dir.path().join("layout.json")),
        ..QueryCommand::default()
    };
    let inputs = resolve_query_inputs(&command).unwrap();
    assert_eq!(inputs.directory, directory);
    assert!(inputs.options.canonical_only);
    assert_eq!(inputs.limit, Some(1));
}

// ============================================================================
// SECTION: End To End
// ============================================================================

#[tokio::test]
async fn query_resolves_every_context() {
    let dir = workspace();
    let inputs = resolve_query_inputs(&flags(&dir)).unwrap();
    let universe = load(&inputs).await.unwrap();
    let contexts: Vec<_> =
        inputs.blueprint.reproduce(&universe).collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(contexts.len(), 2);
    let rendered: Vec<String> = contexts
        .iter()
        .map(|context| {
            render_context("{{hw.device-type.name}} on {{arch.sw.slug}}", context, dir.path())
                .unwrap()
        })
        .collect();
    assert_eq!(rendered, vec!["Intel NUC on armv7hf", "Raspberry Pi on armv7hf"]);
}
