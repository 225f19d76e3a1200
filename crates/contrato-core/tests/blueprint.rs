// contrato-core/tests/blueprint.rs
// ============================================================================
// Module: Blueprint Tests
// Description: End-to-end tests for layout compilation and reproduction.
// ============================================================================
//! ## Overview
//! Exercises the reproduction search: bounded selector products, pruning by
//! requirements and conflicts, unbounded resolution through references,
//! hashing of generated contexts, and fail-fast layout validation.

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

mod common;

use contrato_core::Blueprint;
use contrato_core::BlueprintError;
use contrato_core::Contract;
use contrato_core::ContractError;
use contrato_core::DeclarationError;
use contrato_core::hashing::hash_canonical_json;
use contrato_core::query;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reproduces `layout` in `universe` and collects every context.
fn reproduce(universe: &Contract, layout: Value, skeleton: Option<Value>) -> Vec<Contract> {
    query(universe, layout, skeleton).unwrap().collect::<Result<Vec<_>, _>>().unwrap()
}

/// Content hashes of `contexts`, in order.
fn hashes(contexts: &[Contract]) -> Vec<String> {
    contexts.iter().map(|context| context.hash().unwrap().to_string()).collect()
}

/// Two device types and one architecture.
fn devices_and_arch() -> Contract {
    common::universe(vec![
        json!({"type": "hw.device-type", "name": "Intel Edison", "slug": "intel-edison"}),
        json!({"type": "hw.device-type", "name": "Intel NUC", "slug": "intel-nuc"}),
        json!({"type": "arch.sw", "name": "armv7hf", "slug": "armv7hf"}),
    ])
}

// ============================================================================
// SECTION: Bounded Selectors
// ============================================================================

/// Tests the one device type per architecture scenario.
#[test]
fn test_one_to_one() {
    let universe = devices_and_arch();
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    assert_eq!(contexts.len(), 2);
    assert_eq!(common::slugs(&contexts[0], "hw.device-type"), vec!["intel-edison"]);
    assert_eq!(common::slugs(&contexts[1], "hw.device-type"), vec!["intel-nuc"]);
    for context in &contexts {
        assert_eq!(context.contract_type(), "meta.context");
        assert_eq!(common::slugs(context, "arch.sw"), vec!["armv7hf"]);
        assert_eq!(context.hash().unwrap(), &hash_canonical_json(&context.identity_json()).unwrap());
        assert!(!context.is_dirty());
    }
    assert_ne!(contexts[0].hash(), contexts[1].hash());
}

/// Tests exactly-one selectors over disjoint types yield every pairing.
#[test]
fn test_cartesian_completeness() {
    let mut sources = Vec::new();
    for device in ["a", "b", "c"] {
        sources.push(json!({"type": "hw.device-type", "slug": device}));
    }
    for arch in ["x", "y"] {
        sources.push(json!({"type": "arch.sw", "slug": arch}));
    }
    let universe = common::universe(sources);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    let pairs: Vec<(String, String)> = contexts
        .iter()
        .map(|context| {
            (common::slugs(context, "hw.device-type")[0].clone(), common::slugs(context, "arch.sw")[0].clone())
        })
        .collect();
    let expected: Vec<(String, String)> = ["a", "b", "c"]
        .into_iter()
        .flat_map(|device| ["x", "y"].into_iter().map(move |arch| (device.to_string(), arch.to_string())))
        .collect();
    assert_eq!(pairs, expected);
}

/// Tests a missing bounded type yields no context.
#[test]
fn test_missing_type_yields_nothing() {
    let universe = common::universe(vec![json!({"type": "hw.device-type", "slug": "intel-nuc"})]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    assert!(contexts.is_empty());
}

/// Tests selecting several children of one type.
#[test]
fn test_one_to_two() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "intel-nuc"}),
        json!({"type": "sw.os", "slug": "debian"}),
        json!({"type": "sw.os", "slug": "fedora"}),
        json!({"type": "sw.os", "slug": "alpine"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "sw.os": 2}), None);
    let os_pairs: Vec<Vec<String>> = contexts.iter().map(|context| common::slugs(context, "sw.os")).collect();
    assert_eq!(os_pairs, vec![
        vec!["debian".to_string(), "fedora".to_string()],
        vec!["debian".to_string(), "alpine".to_string()],
        vec!["fedora".to_string(), "alpine".to_string()],
    ]);
}

/// Tests an optional selector includes the empty selection.
#[test]
fn test_optional_selector() {
    let universe = devices_and_arch();
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": "?"}), None);
    assert_eq!(contexts.len(), 4);
    assert!(contexts[0].children_by_type("arch.sw").is_empty());
    assert_eq!(common::slugs(&contexts[1], "arch.sw"), vec!["armv7hf"]);
}

/// Tests layout filters and versions narrow the selection.
#[test]
fn test_filter_and_version() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "intel-nuc"}),
        json!({"type": "sw.os", "slug": "debian", "version": "9"}),
        json!({"type": "sw.os", "slug": "debian", "version": "10"}),
        json!({"type": "sw.os", "slug": "fedora", "version": "30"}),
    ]);
    let by_version = reproduce(
        &universe,
        json!({"hw.device-type": 1, "sw.os": {"cardinality": 1, "version": "10"}}),
        None,
    );
    assert_eq!(by_version.len(), 1);
    assert_eq!(by_version[0].children_by_type("sw.os")[0].raw()["version"], json!("10"));

    let by_filter = reproduce(
        &universe,
        json!({
            "hw.device-type": 1,
            "sw.os": {"cardinality": 1, "filter": {"properties": {"slug": {"const": "debian"}}}}
        }),
        None,
    );
    assert_eq!(by_filter.len(), 2);
}

/// Tests two selectors on one type through the type override.
#[test]
fn test_selectors_sharing_a_type() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "nuc", "requires": [{"type": "sw.os", "slug": "fedora"}]}),
        json!({"type": "sw.os", "slug": "debian", "version": "9"}),
        json!({"type": "sw.os", "slug": "debian", "version": "10"}),
        json!({"type": "sw.os", "slug": "fedora", "version": "30"}),
    ]);
    let contexts = reproduce(
        &universe,
        json!({
            "hw.device-type": 1,
            "first-os": {"type": "sw.os", "cardinality": 1, "filter": {"properties": {"slug": {"const": "debian"}}}},
            "second-os": {"type": "sw.os", "cardinality": 1, "filter": {"properties": {"slug": {"const": "fedora"}}}}
        }),
        None,
    );
    assert_eq!(contexts.len(), 2);
    let versions: Vec<Value> =
        contexts.iter().map(|context| context.children_by_type("sw.os")[0].raw()["version"].clone()).collect();
    assert_eq!(versions, vec![json!("9"), json!("10")]);
    for context in &contexts {
        assert_eq!(common::slugs(context, "sw.os"), vec!["debian", "fedora"]);
    }

    let overlapping = reproduce(
        &universe,
        json!({
            "first-os": {"type": "sw.os", "cardinality": 1},
            "second-os": {"type": "sw.os", "cardinality": 1}
        }),
        None,
    );
    assert_eq!(overlapping.len(), 6);
    for context in &overlapping {
        assert_eq!(context.children_by_type("sw.os").len(), 2);
    }
}

// ============================================================================
// SECTION: Skeleton And Hashing
// ============================================================================

/// Tests skeleton templates resolve against the selected children.
#[test]
fn test_skeleton_template() {
    let universe = devices_and_arch();
    let contexts = reproduce(
        &universe,
        json!({"hw.device-type": 1, "arch.sw": 1}),
        Some(json!({
            "type": "hw.context",
            "slug": "{{children.arch.sw.slug}}-{{children.hw.device-type.slug}}"
        })),
    );
    let slugs: Vec<_> = contexts.iter().filter_map(Contract::slug).collect();
    assert_eq!(slugs, vec!["armv7hf-intel-edison", "armv7hf-intel-nuc"]);
    assert_eq!(contexts[0].contract_type(), "hw.context");
}

/// Tests the skeleton participates in context identity.
#[test]
fn test_skeleton_changes_hash() {
    let universe = devices_and_arch();
    let layout = json!({"hw.device-type": 1});
    let plain = reproduce(&universe, layout.clone(), None);
    let decorated = reproduce(
        &universe,
        layout.clone(),
        Some(json!({"type": "hw.context.device-type", "foo": "bar", "bar": {"baz": 1}})),
    );
    let again = reproduce(
        &universe,
        layout,
        Some(json!({"bar": {"baz": 1}, "foo": "bar", "type": "hw.context.device-type"})),
    );
    assert_eq!(plain.len(), 2);
    assert_ne!(hashes(&plain), hashes(&decorated));
    assert_eq!(hashes(&decorated), hashes(&again));
    for context in &decorated {
        assert_eq!(context.hash().unwrap(), &hash_canonical_json(&context.identity_json()).unwrap());
    }
}

/// Tests reproduction is deterministic across universes and runs.
#[test]
fn test_determinism() {
    let layout = json!({"hw.device-type": 1, "arch.sw": 1});
    let first = reproduce(&devices_and_arch(), layout.clone(), None);
    let second = reproduce(&devices_and_arch(), layout, None);
    assert_eq!(hashes(&first), hashes(&second));
}

// ============================================================================
// SECTION: Requirements
// ============================================================================

/// Tests requirements prune bounded combinations.
#[test]
fn test_requirements_prune() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "requires": [{"type": "arch.sw", "slug": "i386"}]}),
        json!({"type": "hw.device-type", "slug": "nuc", "requires": [{"type": "arch.sw", "slug": "amd64"}]}),
        json!({"type": "arch.sw", "slug": "i386"}),
        json!({"type": "arch.sw", "slug": "amd64"}),
        json!({"type": "arch.sw", "slug": "armv7hf"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    let pairs: Vec<(Vec<String>, Vec<String>)> = contexts
        .iter()
        .map(|context| (common::slugs(context, "hw.device-type"), common::slugs(context, "arch.sw")))
        .collect();
    assert_eq!(pairs, vec![
        (vec!["edison".to_string()], vec!["i386".to_string()]),
        (vec!["nuc".to_string()], vec!["amd64".to_string()]),
    ]);
}

/// Tests layout key order does not change which contexts satisfy requirements.
#[test]
fn test_requirements_independent_of_layout_order() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "rpi", "requires": [{"type": "arch.sw", "slug": "armv7hf"}]}),
        json!({"type": "hw.device-type", "slug": "nuc", "requires": [{"type": "arch.sw", "slug": "amd64"}]}),
        json!({"type": "arch.sw", "slug": "armv7hf"}),
        json!({"type": "arch.sw", "slug": "i386"}),
    ]);
    let device_first = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    let arch_first = reproduce(&universe, json!({"arch.sw": 1, "hw.device-type": 1}), None);
    assert_eq!(device_first.len(), 1);
    assert_eq!(arch_first.len(), 1);
    assert_eq!(hashes(&device_first), hashes(&arch_first));
    assert_eq!(common::slugs(&arch_first[0], "hw.device-type"), vec!["rpi"]);
}

/// Tests declarations without a type are rejected before any search.
#[test]
fn test_untyped_requirements_rejected() {
    let result = Contract::build(json!({
        "type": "hw.device-type",
        "slug": "rpi",
        "requires": [{"slug": "armv7hf"}]
    }));
    assert!(matches!(
        result,
        Err(ContractError::Declaration(DeclarationError::Untyped { field: "requires", .. }))
    ));
}

/// Tests disjunctive requirements.
#[test]
fn test_requirements_or() {
    let universe = common::universe(vec![
        json!({
            "type": "hw.device-type",
            "slug": "edison",
            "requires": [{"or": [
                {"type": "arch.sw", "slug": "i386"},
                {"type": "arch.sw", "slug": "amd64"}
            ]}]
        }),
        json!({"type": "arch.sw", "slug": "i386"}),
        json!({"type": "arch.sw", "slug": "amd64"}),
        json!({"type": "arch.sw", "slug": "armv7hf"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    let arches: Vec<Vec<String>> = contexts.iter().map(|context| common::slugs(context, "arch.sw")).collect();
    assert_eq!(arches, vec![vec!["i386".to_string()], vec!["amd64".to_string()]]);
}

/// Tests conflicts prune bounded combinations.
#[test]
fn test_conflicts_prune() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "conflicts": [{"type": "arch.sw", "slug": "armv7hf"}]}),
        json!({"type": "arch.sw", "slug": "i386"}),
        json!({"type": "arch.sw", "slug": "armv7hf"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    assert_eq!(contexts.len(), 1);
    assert_eq!(common::slugs(&contexts[0], "arch.sw"), vec!["i386"]);
}

/// Tests requirements naming an alias select the alias instance.
#[test]
fn test_requirements_through_aliases() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "requires": [{"type": "arch.sw", "slug": "armhf"}]}),
        json!({"type": "arch.sw", "slug": "armv7hf", "aliases": ["armhf"]}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "arch.sw": 1}), None);
    assert_eq!(contexts.len(), 1);
    let arch = &contexts[0].children_by_type("arch.sw")[0];
    assert_eq!(arch.slug(), Some("armhf"));
    assert_eq!(arch.canonical_slug(), Some("armv7hf"));
}

// ============================================================================
// SECTION: Unbounded Selectors
// ============================================================================

/// Tests unbounded types without references pull in every candidate.
#[test]
fn test_unbounded_takes_all_without_references() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison"}),
        json!({"type": "hw.device-type", "slug": "nuc"}),
        json!({"type": "sw.blob", "slug": "b1"}),
        json!({"type": "sw.blob", "slug": "b2"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "sw.blob": "*"}), None);
    assert_eq!(contexts.len(), 2);
    for context in &contexts {
        assert_eq!(common::slugs(context, "sw.blob"), vec!["b1", "b2"]);
    }
}

/// Tests explicit references restrict unbounded types.
#[test]
fn test_unbounded_follows_references() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "requires": [{"type": "sw.blob", "slug": "b1"}]}),
        json!({"type": "hw.device-type", "slug": "nuc"}),
        json!({"type": "sw.blob", "slug": "b1"}),
        json!({"type": "sw.blob", "slug": "b2"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "sw.blob": "*"}), None);
    assert_eq!(contexts.len(), 2);
    assert_eq!(common::slugs(&contexts[0], "sw.blob"), vec!["b1"]);
    assert_eq!(common::slugs(&contexts[1], "sw.blob"), vec!["b1", "b2"]);
}

/// Tests references are followed transitively.
#[test]
fn test_unbounded_nested_references() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "requires": [{"type": "sw.os", "slug": "debian"}]}),
        json!({"type": "sw.os", "slug": "debian", "requires": [{"type": "sw.libc", "slug": "glibc"}]}),
        json!({"type": "sw.os", "slug": "alpine", "requires": [{"type": "sw.libc", "slug": "musl"}]}),
        json!({"type": "sw.libc", "slug": "glibc"}),
        json!({"type": "sw.libc", "slug": "musl"}),
    ]);
    let contexts =
        reproduce(&universe, json!({"hw.device-type": 1, "sw.os": "*", "sw.libc": "*"}), None);
    assert_eq!(contexts.len(), 1);
    assert_eq!(common::all_child_slugs(&contexts[0]), vec!["debian", "edison", "glibc"]);
}

/// Tests conflicting references are dropped from the context.
#[test]
fn test_unbounded_drops_conflicting_references() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "conflicts": [{"type": "sw.blob", "slug": "b2"}]}),
        json!({"type": "sw.blob", "slug": "b1"}),
        json!({"type": "sw.blob", "slug": "b2"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "sw.blob": "*"}), None);
    assert_eq!(contexts.len(), 1);
    assert_eq!(common::slugs(&contexts[0], "sw.blob"), vec!["b1"]);
}

/// Tests references over a requirement bound are repaired, not fatal.
#[test]
fn test_unbounded_repairs_requirement_upper_bound() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "requires": [{"type": "sw.os", "cardinality": 1}]}),
        json!({"type": "sw.os", "slug": "debian"}),
        json!({"type": "sw.os", "slug": "fedora"}),
    ]);
    let contexts = reproduce(&universe, json!({"hw.device-type": 1, "sw.os": "*"}), None);
    assert_eq!(contexts.len(), 1);
    assert_eq!(common::slugs(&contexts[0], "sw.os"), vec!["fedora"]);
}

/// Tests unmet unbounded lower bounds reject the context.
#[test]
fn test_unbounded_lower_bound() {
    let universe = common::universe(vec![json!({"type": "hw.device-type", "slug": "edison"})]);
    assert!(reproduce(&universe, json!({"hw.device-type": 1, "sw.blob": "1+"}), None).is_empty());
    assert_eq!(reproduce(&universe, json!({"hw.device-type": 1, "sw.blob": "*"}), None).len(), 1);
}

/// Tests unmet unbounded requirements reject the context.
#[test]
fn test_unbounded_requirement_unmet() {
    let universe = common::universe(vec![
        json!({"type": "hw.device-type", "slug": "edison", "requires": [{"type": "sw.blob", "slug": "missing"}]}),
        json!({"type": "sw.blob", "slug": "b1"}),
    ]);
    assert!(reproduce(&universe, json!({"hw.device-type": 1, "sw.blob": "*"}), None).is_empty());
}

/// Tests a layout of only unbounded selectors yields one context.
#[test]
fn test_only_unbounded_selectors() {
    let universe = common::universe(vec![
        json!({"type": "sw.blob", "slug": "b1"}),
        json!({"type": "sw.blob", "slug": "b2"}),
    ]);
    let contexts = reproduce(&universe, json!({"sw.blob": "*"}), None);
    assert_eq!(contexts.len(), 1);
    assert_eq!(common::slugs(&contexts[0], "sw.blob"), vec!["b1", "b2"]);
}

// ============================================================================
// SECTION: Layout Validation
// ============================================================================

/// Tests malformed layouts fail at construction.
#[test]
fn test_invalid_layouts_fail_fast() {
    assert!(matches!(
        Blueprint::new(json!({"hw.device-type": "abc"}), None),
        Err(BlueprintError::Cardinality { .. })
    ));
    assert!(matches!(
        Blueprint::new(json!({"hw.device-type": [0, 0]}), None),
        Err(BlueprintError::Cardinality { .. })
    ));
    assert!(matches!(Blueprint::new(json!([1]), None), Err(BlueprintError::Layout(_))));
    assert!(matches!(
        Blueprint::new(json!({"hw.device-type": 1}), Some(json!("skeleton"))),
        Err(BlueprintError::Layout(_))
    ));
    assert!(matches!(
        Blueprint::new(
            json!({"arch.sw": {"cardinality": 1, "filter": {"properties": {"slug": {"pattern": "(unclosed"}}}}}),
            None
        ),
        Err(BlueprintError::Selector(_))
    ));
}

/// Tests layout compilation groups selectors.
#[test]
fn test_layout_groups() {
    let blueprint = Blueprint::new(
        json!({
            "hw.device-type": 1,
            "sw.blob": "*",
            "first-os": {"type": "sw.os", "cardinality": [1, 2]},
            "second-os": {"type": "sw.os", "cardinality": "1+"}
        }),
        None,
    )
    .unwrap();
    let layout = blueprint.layout();
    assert_eq!(layout.finite().selectors().len(), 2);
    assert_eq!(layout.infinite().selectors().len(), 2);
    assert_eq!(layout.types().len(), 3);
    assert!(layout.finite().types().contains("sw.os"));
    assert!(layout.infinite().types().contains("sw.os"));
    assert_eq!(blueprint.skeleton(), &json!({"type": "meta.context"}));
    assert_eq!(blueprint.to_json()["type"], json!("meta.blueprint"));
}

/// Tests reproduction is lazy.
#[test]
fn test_reproduction_is_lazy() {
    let sources: Vec<Value> =
        (0..40).map(|idx| json!({"type": "sw.os", "slug": format!("os-{idx}")})).collect();
    let universe = common::universe(sources);
    let blueprint = Blueprint::new(json!({"sw.os": 3}), None).unwrap();
    let first: Vec<_> = blueprint.reproduce(&universe).take(2).collect::<Result<_, _>>().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(common::slugs(&first[0], "sw.os"), vec!["os-0", "os-1", "os-2"]);
    assert_eq!(common::slugs(&first[1], "sw.os"), vec!["os-0", "os-1", "os-3"]);
}
