// contrato-core/tests/common/mod.rs
// =============================================================================
// Module: Core Test Helpers
// Description: Shared fixtures for contract and blueprint tests.
// Purpose: Reduce duplication across integration tests for contrato-core.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(clippy::unwrap_used, reason = "Fixtures are static and known to be valid.")]

use std::sync::Arc;

use contrato_core::Contract;
use contrato_core::Rehash;
use serde_json::Value;

/// Builds a hashed contract handle.
pub fn contract(raw: Value) -> Arc<Contract> {
    Arc::new(Contract::new(raw).unwrap())
}

/// Builds a universe from source payloads, expanding aliases.
pub fn universe(sources: Vec<Value>) -> Contract {
    let mut universe = Contract::universe().unwrap();
    let contracts = sources
        .into_iter()
        .flat_map(|source| Contract::build(source).unwrap())
        .map(Arc::new);
    universe.add_children(contracts, Rehash::Now).unwrap();
    universe
}

/// Slugs of the children of `contract_type`, in insertion order.
pub fn slugs(context: &Contract, contract_type: &str) -> Vec<String> {
    context
        .children_by_type(contract_type)
        .iter()
        .filter_map(|child| child.slug().map(str::to_string))
        .collect()
}

/// Slugs of every child, sorted.
pub fn all_child_slugs(context: &Contract) -> Vec<String> {
    let mut slugs: Vec<String> =
        context.children().iter().filter_map(|child| child.slug().map(str::to_string)).collect();
    slugs.sort();
    slugs
}
