// contrato-render/src/partials.rs
// ============================================================================
// Module: Partial Lookup
// Description: Candidate paths for a partial given a context's children.
// Purpose: Resolve partials from a type-structured directory with fallbacks.
// Dependencies: contrato-core
// ============================================================================

//! ## Overview
//! A partials directory is laid out by contract type. For a structure such as
//! `sw.os+sw.stack`, a partial may live under `debian@wheezy+nodejs@6/`,
//! `debian+nodejs/`, `debian@wheezy/`, `debian/` or directly at the root.
//! [`find_partial`] lists every candidate from most to least specific.
//!
//! Each structure type contributes two spellings of the context's children
//! of that type: reference strings (`slug@version`) and bare slugs, each
//! joined by [`REFERENCE_DELIMITER`]. Alias children are spelled with their
//! canonical slug so that one directory serves every alias.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use contrato_core::CartesianProduct;
use contrato_core::Contract;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between references of one path segment.
pub const REFERENCE_DELIMITER: &str = "+";
/// Partial file extension.
pub const PARTIAL_EXTENSION: &str = "tpl";

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// Candidate paths for partial `name`, most specific first, deduplicated.
#[must_use]
pub fn find_partial<S: AsRef<str>>(
    name: &str,
    context: &Contract,
    base_directory: &Path,
    structure: &[S],
) -> Vec<PathBuf> {
    let spellings: Vec<Vec<String>> =
        structure.iter().map(|contract_type| spellings_for(context, contract_type.as_ref())).collect();

    let products: Vec<Vec<String>> = CartesianProduct::new(
        spellings.clone(),
        Vec::new(),
        |prefix: &Vec<String>, segment: &String| {
            let mut next = prefix.clone();
            next.push(segment.clone());
            Some(next)
        },
    )
    .collect();

    let mut candidates: Vec<Vec<String>> = products.clone();
    for length in (2..=structure.len()).rev() {
        candidates.extend(products.iter().map(|product| product[..length].to_vec()));
    }
    for length in (1..=spellings.len()).rev() {
        for variant in 0..2 {
            candidates.push(
                spellings[..length].iter().map(|pair| pair[variant].clone()).collect(),
            );
        }
    }

    let file_name = format!("{name}.{PARTIAL_EXTENSION}");
    let mut paths: Vec<PathBuf> = Vec::with_capacity(candidates.len() + 1);
    for segments in candidates {
        let path = base_directory.join(segments.join(REFERENCE_DELIMITER)).join(&file_name);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    let bare = base_directory.join(&file_name);
    if !paths.contains(&bare) {
        paths.push(bare);
    }
    paths
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reference and slug spellings of the children of one type.
fn spellings_for(context: &Contract, contract_type: &str) -> Vec<String> {
    let mut entries: Vec<(String, String)> = context
        .children_by_type(contract_type)
        .iter()
        .filter_map(|child| {
            let slug = child.canonical_slug()?.to_string();
            let reference = match child.raw().get("version") {
                Some(Value::String(version)) => format!("{slug}@{version}"),
                Some(Value::Number(version)) => format!("{slug}@{version}"),
                _ => slug.clone(),
            };
            Some((slug, reference))
        })
        .collect();
    entries.sort();
    let references: Vec<&str> = entries.iter().map(|(_, reference)| reference.as_str()).collect();
    let slugs: Vec<&str> = entries.iter().map(|(slug, _)| slug.as_str()).collect();
    vec![references.join(REFERENCE_DELIMITER), slugs.join(REFERENCE_DELIMITER)]
}
