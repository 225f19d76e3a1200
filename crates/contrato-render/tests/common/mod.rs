// contrato-render/tests/common/mod.rs
// =============================================================================
// Module: Render Test Helpers
// Description: Context and partial directory fixtures.
// Purpose: Share contexts and on-disk partials across render suites.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(clippy::unwrap_used, reason = "Fixtures are static and known to be valid.")]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use contrato_core::Contract;
use contrato_core::Rehash;
use serde_json::Value;
use serde_json::json;

/// Context holding the given children.
pub fn context(children: Vec<Value>) -> Contract {
    let mut context = Contract::new(json!({"type": "meta.context"})).unwrap();
    let children = children.into_iter().map(|raw| Arc::new(Contract::new(raw).unwrap()));
    context.add_children(children, Rehash::Now).unwrap();
    context
}

/// Debian wheezy with a nodejs 6 stack.
pub fn debian_node_context() -> Contract {
    context(vec![
        json!({"type": "sw.os", "slug": "debian", "version": "wheezy", "name": "Debian"}),
        json!({"type": "sw.stack", "slug": "nodejs", "version": 6}),
    ])
}

/// Writes a partial at `relative` below `root`.
pub fn write_partial(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Paths relative to `base`, with forward slashes.
pub fn relative(paths: &[std::path::PathBuf], base: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}
