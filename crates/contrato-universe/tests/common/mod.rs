// contrato-universe/tests/common/mod.rs
// =============================================================================
// Module: Universe Test Helpers
// Description: Temporary contract trees for loader tests.
// Purpose: Share on-disk fixtures across loader suites.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(clippy::unwrap_used, reason = "Fixtures are static and known to be valid.")]

use std::fs;
use std::path::Path;

use contrato_core::Contract;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

/// Writes `document` to `relative` below `root`, creating parents.
pub fn write_document(root: &Path, relative: &str, document: &Value) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec_pretty(document).unwrap()).unwrap();
}

/// Device-type tree with one aliased contract and a stray non-json file.
pub fn device_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        dir.path(),
        "hw.device-type/raspberry-pi/contract.json",
        &json!({
            "type": "hw.device-type",
            "slug": "raspberry-pi",
            "name": "Raspberry Pi",
            "aliases": ["raspberrypi", "raspberrypi2"]
        }),
    );
    write_document(
        dir.path(),
        "hw.device-type/intel-nuc/contract.json",
        &json!({"type": "hw.device-type", "slug": "intel-nuc", "name": "Intel NUC"}),
    );
    write_document(
        dir.path(),
        "sw.os/debian/contract.json",
        &json!({"type": "sw.os", "slug": "debian", "version": "wheezy"}),
    );
    fs::write(dir.path().join("sw.os/debian/README.md"), "# Debian").unwrap();
    dir
}

/// Slugs of `contract_type` children matching `slug`.
pub fn count_slug(universe: &Contract, contract_type: &str, slug: &str) -> usize {
    universe
        .children_by_type(contract_type)
        .iter()
        .filter(|child| child.slug() == Some(slug))
        .count()
}
