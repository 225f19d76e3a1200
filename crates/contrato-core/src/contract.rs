// contrato-core/src/contract.rs
// ============================================================================
// Module: Contracts
// Description: Typed metadata nodes with children, aliases, and identity hashes.
// Purpose: Provide the object graph that blueprints search.
// Dependencies: serde_json, thiserror, tracing, crate::{hashing, matcher, ...}
// ============================================================================

//! ## Overview
//! A [`Contract`] wraps an authored JSON payload carrying a string `type`,
//! an optional `slug`, `aliases`, `version` and `requires`/`conflicts`
//! declarations. Children are shared [`Arc<Contract>`] handles kept in an
//! insertion-ordered [`ObjectSet`] and indexed by type.
//!
//! Identity is the content hash of [`Contract::identity_json`]: the payload
//! plus every child identity keyed by its full type string. The nested
//! children tree of [`Contract::to_json`] is a rendering view only, since
//! `sw` and `sw.os` children share a branch there. Mutations can defer
//! rehashing ([`Rehash::Defer`]); a
//! deferred contract is dirty until [`Contract::rehash`] or
//! [`Contract::interpolate`] runs, and has no identity meanwhile.
//!
//! Templates are resolved in two passes: `{{this.*}}` at construction,
//! `{{children.*}}` on [`Contract::interpolate`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::hashing::ContentHash;
use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::matcher::MATCHER;
use crate::matcher::Matcher;
use crate::matcher::MatcherError;
use crate::matcher::MatcherOperation;
use crate::object_set::ObjectSet;
use crate::object_set::SetMember;
use crate::reference::DeclarationError;
use crate::reference::Declarations;
use crate::reference::Reference;
use crate::requirement::TriState;
use crate::selector::Combination;
use crate::selector::Selector;
use crate::template::TemplateField;
use crate::template::apply_templates;
use crate::template::collect_templates;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved type of universe contracts.
pub const UNIVERSE: &str = "meta.universe";
/// Reserved type of generated contexts.
pub const CONTEXT: &str = "meta.context";
/// Reserved type of blueprints.
pub const BLUEPRINT: &str = "meta.blueprint";

/// Member holding the children tree in [`Contract::to_json`].
const CHILDREN_FIELD: &str = "children";

/// A set of contract types.
pub type TypeSet = BTreeSet<String>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when building or hashing contracts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The payload is not a JSON object.
    #[error("contract payload must be an object, found {0}")]
    NotAnObject(String),
    /// The payload has no string `type`.
    #[error("contract payload is missing a string type")]
    MissingType,
    /// `aliases` is present but not a list of strings.
    #[error("contract aliases must be a list of strings")]
    InvalidAliases,
    /// `requires` or `conflicts` is malformed.
    #[error(transparent)]
    Declaration(#[from] DeclarationError),
    /// A matcher payload is malformed.
    #[error(transparent)]
    Matcher(#[from] MatcherError),
    /// Canonical hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractOptions {
    /// Compute the content hash at construction.
    pub hash: bool,
    /// Slug of the canonical contract this one aliases.
    pub canonical_slug: Option<String>,
}

impl Default for ContractOptions {
    fn default() -> Self {
        Self {
            hash: true,
            canonical_slug: None,
        }
    }
}

/// When a mutation recomputes the content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rehash {
    /// Recompute before returning.
    #[default]
    Now,
    /// Mark the contract dirty and leave recomputation to the caller.
    Defer,
}

// ============================================================================
// SECTION: Contract
// ============================================================================

/// A typed metadata node.
///
/// # Invariants
/// - `raw` is an object whose `type` member equals `contract_type`.
/// - `children_by_type` holds exactly the members of `children`, grouped by
///   type in insertion order.
/// - When `dirty` is false, `hash` is the content hash of
///   [`Self::identity_json`].
#[derive(Debug, Clone)]
pub struct Contract {
    /// Payload after the latest interpolation pass.
    raw: Map<String, Value>,
    /// Templated strings of the authored payload.
    templates: Vec<TemplateField>,
    /// Type captured at construction.
    contract_type: String,
    /// Content hash, when computed.
    hash: Option<ContentHash>,
    /// True when `hash` is stale or missing.
    dirty: bool,
    /// Canonical slug for alias instances.
    canonical_slug: Option<String>,
    /// Compiled `requires` / `conflicts`.
    declarations: Declarations,
    /// Children in insertion order.
    children: ObjectSet<Arc<Self>>,
    /// Children grouped by type.
    children_by_type: BTreeMap<String, Vec<Arc<Self>>>,
}

impl Contract {
    /// Builds and hashes a contract.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the payload is malformed.
    pub fn new(raw: Value) -> Result<Self, ContractError> {
        Self::with_options(raw, ContractOptions::default())
    }

    /// Builds a contract with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the payload is malformed or hashing fails.
    pub fn with_options(raw: Value, options: ContractOptions) -> Result<Self, ContractError> {
        let Value::Object(authored) = raw else {
            return Err(ContractError::NotAnObject(raw.to_string()));
        };
        let templates = collect_templates(&Value::Object(authored.clone()));
        let mut payload = Value::Object(authored);
        if !templates.is_empty() {
            let scope = self_scope(&payload);
            apply_templates(&mut payload, &templates, &scope);
        }
        let Value::Object(raw) = payload else {
            return Err(ContractError::NotAnObject(payload.to_string()));
        };
        let contract_type =
            raw.get("type").and_then(Value::as_str).ok_or(ContractError::MissingType)?.to_string();
        let declarations = Declarations::from_payload(&raw)?;
        let mut contract = Self {
            raw,
            templates,
            contract_type,
            hash: None,
            dirty: true,
            canonical_slug: options.canonical_slug,
            declarations,
            children: ObjectSet::new(),
            children_by_type: BTreeMap::new(),
        };
        if options.hash {
            contract.rehash()?;
        }
        Ok(contract)
    }

    /// Expands a payload into its canonical contract followed by one
    /// contract per alias, each reporting the canonical slug.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when the payload or its aliases are malformed.
    pub fn build(source: Value) -> Result<Vec<Self>, ContractError> {
        let aliases = match source.get("aliases") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or(ContractError::InvalidAliases))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ContractError::InvalidAliases),
        };
        let canonical = Self::new(source.clone())?;
        let canonical_slug = canonical.slug().map(str::to_string);
        let mut contracts = Vec::with_capacity(aliases.len() + 1);
        contracts.push(canonical);
        for alias in aliases {
            let mut payload = source.clone();
            if let Value::Object(map) = &mut payload {
                map.insert("slug".to_string(), Value::String(alias));
            }
            contracts.push(Self::with_options(payload, ContractOptions {
                hash: true,
                canonical_slug: canonical_slug.clone(),
            })?);
        }
        Ok(contracts)
    }

    /// Empty universe contract.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Hash`] when hashing fails.
    pub fn universe() -> Result<Self, ContractError> {
        Self::new(serde_json::json!({ "type": UNIVERSE }))
    }

    /// Builds a matcher contract `{type, data, operation?}`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Matcher`] when the criteria do not compile.
    pub fn create_matcher(
        criteria: Value,
        operation: Option<MatcherOperation>,
    ) -> Result<Self, ContractError> {
        let mut payload = Map::new();
        payload.insert("type".to_string(), Value::String(MATCHER.to_string()));
        payload.insert("data".to_string(), criteria);
        if let Some(operation) = operation {
            payload.insert("operation".to_string(), Value::String(operation.to_string()));
        }
        Matcher::from_payload(&payload)?;
        Self::new(Value::Object(payload))
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    /// Payload after the latest interpolation pass.
    #[must_use]
    pub const fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Contract type.
    #[must_use]
    pub fn contract_type(&self) -> &str {
        &self.contract_type
    }

    /// Content hash; `None` until computed.
    #[must_use]
    pub const fn hash(&self) -> Option<&ContentHash> {
        self.hash.as_ref()
    }

    /// True when the content hash is stale or missing.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recomputes the content hash.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Hash`] when canonicalization fails.
    pub fn rehash(&mut self) -> Result<(), ContractError> {
        self.hash = Some(hash_canonical_json(&self.identity_json())?);
        self.dirty = false;
        Ok(())
    }

    /// Payload plus a `children` tree when children exist.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut json = self.raw.clone();
        if !self.children.is_empty() {
            json.insert(CHILDREN_FIELD.to_string(), self.children_tree());
        }
        Value::Object(json)
    }

    /// Hashed form: payload plus a `children` object mapping each full type
    /// string to the identities of its children, in insertion order.
    #[must_use]
    pub fn identity_json(&self) -> Value {
        let mut json = self.raw.clone();
        if !self.children.is_empty() {
            let children: Map<String, Value> = self
                .children_by_type
                .iter()
                .map(|(contract_type, group)| {
                    let identities = group.iter().map(|child| child.identity_json()).collect();
                    (contract_type.clone(), Value::Array(identities))
                })
                .collect();
            json.insert(CHILDREN_FIELD.to_string(), Value::Object(children));
        }
        Value::Object(json)
    }

    /// Slug, when declared.
    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.raw.get("slug").and_then(Value::as_str)
    }

    /// Slug of the canonical contract; the own slug for canonical contracts.
    #[must_use]
    pub fn canonical_slug(&self) -> Option<&str> {
        self.canonical_slug.as_deref().or_else(|| self.slug())
    }

    /// Slug, aliases and canonical slug.
    #[must_use]
    pub fn all_slugs(&self) -> BTreeSet<String> {
        let mut slugs = BTreeSet::new();
        slugs.extend(self.slug().map(str::to_string));
        slugs.extend(self.canonical_slug.iter().cloned());
        if let Some(Value::Array(aliases)) = self.raw.get("aliases") {
            slugs.extend(aliases.iter().filter_map(Value::as_str).map(str::to_string));
        }
        slugs
    }

    /// `slug@version`, or the bare slug when unversioned.
    #[must_use]
    pub fn reference_string(&self) -> Option<String> {
        let slug = self.slug()?;
        Some(match self.raw.get("version") {
            Some(Value::String(version)) => format!("{slug}@{version}"),
            Some(Value::Number(version)) => format!("{slug}@{version}"),
            _ => slug.to_string(),
        })
    }

    /// Compiled `requires` / `conflicts`.
    #[must_use]
    pub const fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    // ------------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------------

    /// Adds children, returning how many were new.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Hash`] when an immediate rehash fails.
    pub fn add_children<I>(&mut self, children: I, rehash: Rehash) -> Result<usize, ContractError>
    where
        I: IntoIterator<Item = Arc<Self>>,
    {
        let mut added = 0;
        for child in children {
            if self.children.add(Arc::clone(&child)) {
                self.children_by_type.entry(child.contract_type.clone()).or_default().push(child);
                added += 1;
            }
        }
        if added > 0 {
            self.dirty = true;
        }
        if rehash == Rehash::Now && self.dirty {
            self.rehash()?;
        }
        Ok(added)
    }

    /// Adds one child.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Hash`] when an immediate rehash fails.
    pub fn add_child(&mut self, child: Arc<Self>, rehash: Rehash) -> Result<bool, ContractError> {
        self.add_children(std::iter::once(child), rehash).map(|added| added > 0)
    }

    /// Removes a child, returning the stored handle when it was present.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Hash`] when an immediate rehash fails.
    pub fn remove_child(
        &mut self,
        child: &Arc<Self>,
        rehash: Rehash,
    ) -> Result<Option<Arc<Self>>, ContractError> {
        let Some(removed) = self.children.remove(child) else {
            return Ok(None);
        };
        if let Some(group) = self.children_by_type.get_mut(&removed.contract_type) {
            group.retain(|existing| !Arc::ptr_eq(existing, &removed));
            if group.is_empty() {
                self.children_by_type.remove(&removed.contract_type);
            }
        }
        self.dirty = true;
        if rehash == Rehash::Now {
            self.rehash()?;
        }
        Ok(Some(removed))
    }

    /// All children in insertion order.
    #[must_use]
    pub fn children(&self) -> &[Arc<Self>] {
        self.children.get_all()
    }

    /// Children whose type is in `types`, in insertion order.
    #[must_use]
    pub fn children_of_types(&self, types: &TypeSet) -> Vec<Arc<Self>> {
        self.children.iter().filter(|child| types.contains(&child.contract_type)).cloned().collect()
    }

    /// Children of one type, in insertion order.
    #[must_use]
    pub fn children_by_type(&self, contract_type: &str) -> &[Arc<Self>] {
        self.children_by_type.get(contract_type).map_or(&[], Vec::as_slice)
    }

    /// Types present among the children.
    #[must_use]
    pub fn children_types(&self) -> TypeSet {
        self.children_by_type.keys().cloned().collect()
    }

    /// Child with the given content hash.
    #[must_use]
    pub fn child_by_hash(&self, hash: &ContentHash) -> Option<&Arc<Self>> {
        self.children.get(hash)
    }

    /// Children and their descendants, depth first, deduplicated.
    #[must_use]
    pub fn descendants(&self) -> ObjectSet<Arc<Self>> {
        let mut found = ObjectSet::new();
        collect_descendants(self, &mut found);
        found
    }

    /// Descendants whose payload satisfies `matcher`.
    #[must_use]
    pub fn find_children(&self, matcher: &Matcher) -> Vec<Arc<Self>> {
        self.descendants().iter().filter(|child| matcher.matches(&child.raw)).cloned().collect()
    }

    /// Every subset of accepted children of the selector type whose size
    /// lies within the selector cardinality, by ascending size and then
    /// lexicographically by insertion position.
    #[must_use]
    pub fn children_combinations(&self, selector: &Selector) -> Vec<Combination> {
        let pool: Vec<Arc<Self>> = self
            .children_by_type(selector.selector_type())
            .iter()
            .filter(|child| selector.accepts(child))
            .cloned()
            .collect();
        let cardinality = selector.cardinality();
        let single = cardinality.is_single();
        let mut combinations = Vec::new();
        for size in cardinality.from()..=cardinality.upper_bound(pool.len()) {
            for_each_index_subset(pool.len(), size, |indices| {
                let members: Vec<Arc<Self>> =
                    indices.iter().filter_map(|idx| pool.get(*idx)).cloned().collect();
                combinations.push(match members.as_slice() {
                    [only] if single => Combination::Single(Arc::clone(only)),
                    _ => Combination::Many(members),
                });
            });
        }
        combinations
    }

    // ------------------------------------------------------------------------
    // Cross-references
    // ------------------------------------------------------------------------

    /// Resolves the references declared by this contract and its children
    /// against `from`'s children of `types`, following the references of
    /// resolved contracts transitively. With no reference to `types`
    /// declared anywhere, every child of `from` with those types is returned.
    #[must_use]
    pub fn children_cross_referenced_contracts(&self, from: &Self, types: &TypeSet) -> Vec<Arc<Self>> {
        let candidates = from.children_of_types(types);
        let mut resolved = ObjectSet::new();
        let mut queue: VecDeque<Arc<Self>> = VecDeque::new();
        let mut declared = resolve_references(
            &self.declarations,
            &candidates,
            types,
            &mut resolved,
            &mut queue,
        );
        queue.extend(self.children.iter().cloned());
        while let Some(contract) = queue.pop_front() {
            declared |= resolve_references(
                &contract.declarations,
                &candidates,
                types,
                &mut resolved,
                &mut queue,
            );
        }
        if declared {
            resolved.get_all().to_vec()
        } else {
            debug!(candidates = candidates.len(), "no references declared, using every candidate");
            candidates
        }
    }

    /// True when adding `candidate` violates no declaration for `types`:
    /// the candidate's own requires and conflicts hold against the children,
    /// and no declaration of this contract or of another child that holds
    /// without the candidate fails with it (a conflict naming it, or a
    /// requirement whose upper bound it exceeds).
    #[must_use]
    pub fn satisfies_child_contract(&self, candidate: &Arc<Self>, types: &TypeSet) -> bool {
        let mut pool = self.descendants();
        pool.add(Arc::clone(candidate));
        let with = pool.get_all();
        if evaluate(&candidate.declarations, with, types, Some(candidate)).is_false() {
            return false;
        }
        let without: Vec<Arc<Self>> =
            with.iter().filter(|member| !same_contract(member, candidate)).cloned().collect();
        let broken_by_candidate = |declarations: &Declarations, exclude: Option<&Arc<Self>>| {
            evaluate(declarations, with, types, exclude).is_false()
                && !evaluate(declarations, &without, types, exclude).is_false()
        };
        if broken_by_candidate(&self.declarations, None) {
            return false;
        }
        self.children
            .iter()
            .filter(|child| !same_contract(child, candidate))
            .all(|child| !broken_by_candidate(&child.declarations, Some(child)))
    }

    /// True when no declaration of this contract or of its children is
    /// violated for `types`.
    #[must_use]
    pub fn are_children_satisfied(&self, types: &TypeSet) -> bool {
        let pool = self.descendants();
        let pool = pool.get_all();
        if evaluate(&self.declarations, pool, types, None).is_false() {
            return false;
        }
        self.children
            .iter()
            .all(|child| !evaluate(&child.declarations, pool, types, Some(child)).is_false())
    }

    // ------------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------------

    /// Resolves `{{children.*}}` placeholders against the attached children
    /// and recomputes the content hash.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Hash`] when hashing fails.
    pub fn interpolate(&mut self) -> Result<(), ContractError> {
        if !self.templates.is_empty() {
            let mut scope = Map::new();
            scope.insert("this".to_string(), Value::Object(self.raw.clone()));
            scope.insert(CHILDREN_FIELD.to_string(), self.children_tree());
            let mut payload = Value::Object(std::mem::take(&mut self.raw));
            apply_templates(&mut payload, &self.templates, &Value::Object(scope));
            if let Value::Object(raw) = payload {
                self.raw = raw;
            }
        }
        self.rehash()
    }

    /// Children nested by type path; several children of a type form a list.
    fn children_tree(&self) -> Value {
        let mut tree = Map::new();
        for (contract_type, group) in &self.children_by_type {
            let value = match group.as_slice() {
                [only] => only.to_json(),
                many => Value::Array(many.iter().map(|child| child.to_json()).collect()),
            };
            insert_at_type_path(&mut tree, contract_type, value);
        }
        Value::Object(tree)
    }
}

impl SetMember for Contract {
    fn identity(&self) -> Option<ContentHash> {
        if self.dirty { None } else { self.hash.clone() }
    }

    fn is_same(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Template scope for the construction pass.
fn self_scope(payload: &Value) -> Value {
    let mut scope = Map::new();
    scope.insert("this".to_string(), payload.clone());
    Value::Object(scope)
}

/// True when both handles denote the same set member.
fn same_contract(left: &Arc<Contract>, right: &Arc<Contract>) -> bool {
    Arc::ptr_eq(left, right)
        || left.identity().is_some_and(|identity| right.identity().as_ref() == Some(&identity))
}

/// Depth-first descendant walk.
fn collect_descendants(contract: &Contract, found: &mut ObjectSet<Arc<Contract>>) {
    for child in contract.children.iter() {
        if found.add(Arc::clone(child)) {
            collect_descendants(child, found);
        }
    }
}

/// Inserts `value` at the dotted type path inside `tree`.
fn insert_at_type_path(tree: &mut Map<String, Value>, contract_type: &str, value: Value) {
    let mut segments = contract_type.split('.').peekable();
    let mut node = tree;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            node.insert(segment.to_string(), value);
            return;
        }
        let slot = node.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(next) = slot else {
            return;
        };
        node = next;
    }
}

/// Calls `emit` with every `size`-subset of `0..count` in lexicographic order.
fn for_each_index_subset<F>(count: usize, size: usize, mut emit: F)
where
    F: FnMut(&[usize]),
{
    if size > count {
        return;
    }
    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        emit(&indices);
        let Some(pivot) = (0..size).rev().find(|&position| indices[position] < count - size + position)
        else {
            return;
        };
        indices[pivot] += 1;
        for position in pivot + 1..size {
            indices[position] = indices[position - 1] + 1;
        }
    }
}

/// Number of contracts in `pool` matching `reference`, skipping `exclude`.
fn count_matching(pool: &[Arc<Contract>], reference: &Reference, exclude: Option<&Arc<Contract>>) -> usize {
    pool.iter()
        .filter(|member| exclude.is_none_or(|excluded| !Arc::ptr_eq(member, excluded)))
        .filter(|member| reference.criteria().matches(&member.raw))
        .count()
}

/// Evaluates requires and conflicts against `pool`.
fn evaluate(
    declarations: &Declarations,
    pool: &[Arc<Contract>],
    types: &TypeSet,
    exclude: Option<&Arc<Contract>>,
) -> TriState {
    if declarations.is_empty() {
        return TriState::True;
    }
    declarations.evaluate(&mut |reference: &Reference| {
        reference.evaluate(types, count_matching(pool, reference, exclude))
    })
}

/// Adds candidates matching the positive references of `declarations` to
/// `resolved`, queueing new ones. Returns true when any reference targets
/// `types`.
fn resolve_references(
    declarations: &Declarations,
    candidates: &[Arc<Contract>],
    types: &TypeSet,
    resolved: &mut ObjectSet<Arc<Contract>>,
    queue: &mut VecDeque<Arc<Contract>>,
) -> bool {
    let mut declared = false;
    for reference in declarations.positive_references() {
        if !reference.target_type().is_some_and(|target| types.contains(target)) {
            continue;
        }
        declared = true;
        for candidate in candidates {
            if reference.criteria().matches(&candidate.raw) && resolved.add(Arc::clone(candidate)) {
                queue.push_back(Arc::clone(candidate));
            }
        }
    }
    declared
}
