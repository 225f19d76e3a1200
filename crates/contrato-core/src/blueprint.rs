// contrato-core/src/blueprint.rs
// ============================================================================
// Module: Blueprints
// Description: Layout compilation and lazy context reproduction.
// Purpose: Enumerate every context of a universe that satisfies a layout.
// Dependencies: serde_json, thiserror, tracing, crate::{contract, product, ...}
// ============================================================================

//! ## Overview
//! A blueprint layout maps contract types to selectors:
//!
//! ```json
//! {
//!   "hw.device-type": 1,
//!   "arch.sw": { "cardinality": 1, "filter": { "type": "object" } },
//!   "sw.blob": "*"
//! }
//! ```
//!
//! Selectors with a bounded cardinality are enumerated exhaustively through
//! a prunable cartesian product of their combinations; every partial context
//! is checked against the declarations of its children so invalid branches
//! are discarded before they expand. Unbounded selectors are resolved per
//! candidate by following cross-references into the universe.
//!
//! [`Blueprint::reproduce`] is lazy: contexts are assembled, checked,
//! interpolated and hashed one at a time as the caller pulls them.
//!
//! Security posture: layouts and skeletons are caller input; they are
//! validated in [`Blueprint::new`] before any search begins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::trace;

use crate::cardinality::Cardinality;
use crate::cardinality::CardinalityError;
use crate::contract::BLUEPRINT;
use crate::contract::CONTEXT;
use crate::contract::Contract;
use crate::contract::ContractError;
use crate::contract::ContractOptions;
use crate::contract::Rehash;
use crate::contract::TypeSet;
use crate::product::CartesianProduct;
use crate::product::ProductReducer;
use crate::selector::Combination;
use crate::selector::Selector;
use crate::selector::SelectorError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by blueprint compilation and reproduction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    /// The layout or skeleton has the wrong shape.
    #[error("invalid layout: {0}")]
    Layout(String),
    /// A selector cardinality is malformed.
    #[error("invalid cardinality for {selector_type}: {source}")]
    Cardinality {
        /// Layout key.
        selector_type: String,
        /// Parse error.
        source: CardinalityError,
    },
    /// A selector filter does not compile.
    #[error(transparent)]
    Selector(#[from] SelectorError),
    /// The skeleton or a generated context is malformed.
    #[error(transparent)]
    Contract(#[from] ContractError),
}

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Selectors sharing a cardinality class.
#[derive(Debug, Clone, Default)]
pub struct SelectorGroup {
    /// Selectors in declaration order.
    selectors: Vec<Selector>,
    /// Types targeted by the selectors.
    types: TypeSet,
}

impl SelectorGroup {
    /// Selectors in declaration order.
    #[must_use]
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Types targeted by the selectors.
    #[must_use]
    pub const fn types(&self) -> &TypeSet {
        &self.types
    }

    /// True when the group holds no selector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// True when some selector of the contract's type accepts it.
    #[must_use]
    pub fn accepts(&self, contract: &Contract) -> bool {
        self.selectors.iter().any(|selector| selector.accepts(contract))
    }

    /// True when every selector finds at least its lower bound in `context`.
    #[must_use]
    pub fn lower_bounds_hold(&self, context: &Contract) -> bool {
        self.selectors.iter().all(|selector| {
            let found = context
                .children_by_type(selector.selector_type())
                .iter()
                .filter(|child| selector.accepts(child))
                .count();
            found >= selector.cardinality().from()
        })
    }

    /// Appends a selector.
    fn push(&mut self, selector: Selector) {
        self.types.insert(selector.selector_type().to_string());
        self.selectors.push(selector);
    }
}

/// A compiled layout.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Every type named by the layout.
    types: TypeSet,
    /// Bounded selectors.
    finite: SelectorGroup,
    /// Unbounded selectors.
    infinite: SelectorGroup,
}

impl Layout {
    /// Compiles a layout object.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] when an entry is malformed.
    pub fn parse(layout: &Value) -> Result<Self, BlueprintError> {
        let Value::Object(entries) = layout else {
            return Err(BlueprintError::Layout(format!("layout must be an object, found {layout}")));
        };
        let mut compiled = Self::default();
        for (key, entry) in entries {
            let selector = parse_selector(key, entry)?;
            compiled.types.insert(selector.selector_type().to_string());
            if selector.cardinality().is_finite() {
                compiled.finite.push(selector);
            } else {
                compiled.infinite.push(selector);
            }
        }
        Ok(compiled)
    }

    /// Every type named by the layout.
    #[must_use]
    pub const fn types(&self) -> &TypeSet {
        &self.types
    }

    /// Bounded selectors.
    #[must_use]
    pub const fn finite(&self) -> &SelectorGroup {
        &self.finite
    }

    /// Unbounded selectors.
    #[must_use]
    pub const fn infinite(&self) -> &SelectorGroup {
        &self.infinite
    }
}

/// Compiles one layout entry.
fn parse_selector(key: &str, entry: &Value) -> Result<Selector, BlueprintError> {
    let cardinality_error = |selector_type: &str, source| BlueprintError::Cardinality {
        selector_type: selector_type.to_string(),
        source,
    };
    let Value::Object(options) = entry else {
        let cardinality = Cardinality::parse(entry).map_err(|err| cardinality_error(key, err))?;
        return Ok(Selector::new(key, cardinality));
    };
    let selector_type = match options.get("type") {
        None | Some(Value::Null) => key,
        Some(Value::String(selector_type)) => selector_type.as_str(),
        Some(other) => {
            return Err(BlueprintError::Layout(format!("selector type for {key} must be a string, found {other}")));
        }
    };
    let source = options.get("cardinality").unwrap_or(entry);
    let cardinality =
        Cardinality::parse(source).map_err(|err| cardinality_error(selector_type, err))?;
    let mut selector = Selector::new(selector_type, cardinality);
    match options.get("version") {
        None | Some(Value::Null) => {}
        Some(Value::String(version)) => selector = selector.with_version(version.clone()),
        Some(Value::Number(version)) => selector = selector.with_version(version.to_string()),
        Some(other) => {
            return Err(BlueprintError::Layout(format!("selector version for {key} must be a string, found {other}")));
        }
    }
    if let Some(filter) = options.get("filter").filter(|filter| !filter.is_null()) {
        selector = selector.with_filter(filter.clone())?;
    }
    Ok(selector)
}

// ============================================================================
// SECTION: Blueprint
// ============================================================================

/// A compiled layout plus the skeleton seeding every context.
#[derive(Debug, Clone)]
pub struct Blueprint {
    /// Layout as authored.
    layout_source: Value,
    /// Skeleton payload.
    skeleton: Value,
    /// Compiled layout.
    layout: Arc<Layout>,
    /// Unhashed contract built from the skeleton.
    seed: Contract,
}

impl Blueprint {
    /// Compiles a layout. The skeleton defaults to `{"type": "meta.context"}`
    /// and receives that type when it declares none.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError`] when the layout or skeleton is malformed.
    pub fn new(layout: Value, skeleton: Option<Value>) -> Result<Self, BlueprintError> {
        let compiled = Layout::parse(&layout)?;
        let skeleton = match skeleton {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::Object(map)) => Value::Object(map),
            Some(other) => {
                return Err(BlueprintError::Layout(format!("skeleton must be an object, found {other}")));
            }
        };
        let mut skeleton = skeleton;
        if let Value::Object(map) = &mut skeleton
            && !map.contains_key("type")
        {
            map.insert("type".to_string(), Value::String(CONTEXT.to_string()));
        }
        let seed = Contract::with_options(skeleton.clone(), ContractOptions {
            hash: false,
            canonical_slug: None,
        })?;
        debug!(
            finite = compiled.finite.selectors.len(),
            infinite = compiled.infinite.selectors.len(),
            "compiled blueprint layout"
        );
        Ok(Self {
            layout_source: layout,
            skeleton,
            layout: Arc::new(compiled),
            seed,
        })
    }

    /// Compiled layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Skeleton payload.
    #[must_use]
    pub const fn skeleton(&self) -> &Value {
        &self.skeleton
    }

    /// `{type: "meta.blueprint", layout, skeleton}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut json = Map::new();
        json.insert("type".to_string(), Value::String(BLUEPRINT.to_string()));
        json.insert("layout".to_string(), self.layout_source.clone());
        json.insert("skeleton".to_string(), self.skeleton.clone());
        Value::Object(json)
    }

    /// Lazily yields every context of `universe` satisfying the layout.
    ///
    /// Contexts come out in a deterministic order: selector declaration
    /// order, then child insertion order within each selector.
    #[must_use]
    pub fn reproduce<'a>(&self, universe: &'a Contract) -> Reproduction<'a> {
        let mut lists = Vec::with_capacity(self.layout.finite.selectors.len());
        let mut exhausted = false;
        for selector in &self.layout.finite.selectors {
            let combinations = universe.children_combinations(selector);
            trace!(
                selector_type = selector.selector_type(),
                combinations = combinations.len(),
                "enumerated selector combinations"
            );
            exhausted |= combinations.is_empty();
            lists.push(combinations);
        }
        let candidates = if exhausted {
            debug!("a bounded selector has no combination, nothing to reproduce");
            Candidates::Exhausted
        } else if lists.is_empty() {
            Candidates::Seed(Some(self.seed.clone()))
        } else {
            let seed = PartialContext {
                context: self.seed.clone(),
                depth: 0,
            };
            Candidates::Product(CartesianProduct::new(lists, seed, ContextReducer::new(&self.layout)))
        };
        Reproduction {
            universe,
            layout: Arc::clone(&self.layout),
            candidates,
        }
    }
}

/// Compiles `layout` and reproduces it in `universe`.
///
/// # Errors
///
/// Returns [`BlueprintError`] when the layout or skeleton is malformed.
pub fn query(
    universe: &Contract,
    layout: Value,
    skeleton: Option<Value>,
) -> Result<Reproduction<'_>, BlueprintError> {
    Ok(Blueprint::new(layout, skeleton)?.reproduce(universe))
}

// ============================================================================
// SECTION: Reproduction
// ============================================================================

/// A partial context and the number of selectors folded into it.
#[derive(Debug, Clone)]
struct PartialContext {
    /// Context under construction.
    context: Contract,
    /// Bounded selectors applied so far.
    depth: usize,
}

/// Merges a combination into a partial context, pruning unsatisfied ones.
///
/// A type is checked only once every bounded selector naming it has been
/// folded and no unbounded selector names it, so the verdict on a branch
/// does not depend on selector order.
#[derive(Debug, Clone)]
struct ContextReducer {
    /// Types settled after each product depth.
    settled: Vec<TypeSet>,
}

impl ContextReducer {
    /// Computes the settled types of every depth of `layout`.
    fn new(layout: &Layout) -> Self {
        let finite = &layout.finite.selectors;
        let settled = (0..finite.len())
            .map(|depth| {
                finite
                    .iter()
                    .take(depth + 1)
                    .map(Selector::selector_type)
                    .filter(|selector_type| {
                        !finite
                            .iter()
                            .skip(depth + 1)
                            .any(|later| later.selector_type() == *selector_type)
                    })
                    .filter(|selector_type| !layout.infinite.types.contains(*selector_type))
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        Self {
            settled,
        }
    }
}

impl ProductReducer<Combination, PartialContext> for ContextReducer {
    fn reduce(&mut self, accumulator: &PartialContext, element: &Combination) -> Option<PartialContext> {
        let scope = self.settled.get(accumulator.depth)?;
        let mut context = accumulator.context.clone();
        let added = context.add_children(element.contracts().iter().cloned(), Rehash::Defer).ok()?;
        if added != element.len() {
            trace!(depth = accumulator.depth, "pruned overlapping selection");
            return None;
        }
        if context.are_children_satisfied(scope) {
            Some(PartialContext {
                context,
                depth: accumulator.depth + 1,
            })
        } else {
            trace!(children = context.children().len(), "pruned partial context");
            None
        }
    }
}

/// Source of candidate contexts before unbounded resolution.
#[derive(Debug)]
enum Candidates {
    /// Some bounded selector has no combination.
    Exhausted,
    /// No bounded selector: the skeleton alone, once.
    Seed(Option<Contract>),
    /// Product of bounded selector combinations.
    Product(CartesianProduct<Combination, PartialContext, ContextReducer>),
}

impl Iterator for Candidates {
    type Item = Contract;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Exhausted => None,
            Self::Seed(seed) => seed.take(),
            Self::Product(product) => product.next().map(|partial| partial.context),
        }
    }
}

/// Lazy sequence of reproduced contexts.
#[derive(Debug)]
pub struct Reproduction<'a> {
    /// Universe searched.
    universe: &'a Contract,
    /// Compiled layout.
    layout: Arc<Layout>,
    /// Candidate contexts.
    candidates: Candidates,
}

impl Reproduction<'_> {
    /// Resolves unbounded selectors for a candidate and finalizes it.
    /// Returns `None` when the candidate is rejected.
    fn complete(&self, mut context: Contract) -> Option<Result<Contract, BlueprintError>> {
        let infinite = &self.layout.infinite;
        if !infinite.is_empty() {
            let mut references =
                context.children_cross_referenced_contracts(self.universe, infinite.types());
            if references.is_empty() {
                references = self.universe.children_of_types(infinite.types());
            }
            references.retain(|reference| infinite.accepts(reference));
            if let Err(err) = context.add_children(references.iter().cloned(), Rehash::Defer) {
                return Some(Err(err.into()));
            }
            for reference in &references {
                if context.satisfies_child_contract(reference, &self.layout.types) {
                    continue;
                }
                trace!(reference = reference.slug(), "dropping unsatisfied reference");
                if let Err(err) = context.remove_child(reference, Rehash::Defer) {
                    return Some(Err(err.into()));
                }
            }
        }
        if !context.are_children_satisfied(infinite.types())
            || !infinite.lower_bounds_hold(&context)
            || !context.are_children_satisfied(&self.layout.types)
        {
            trace!(children = context.children().len(), "rejected context");
            return None;
        }
        if let Err(err) = context.interpolate() {
            return Some(Err(err.into()));
        }
        debug!(
            hash = context.hash().map(|hash| hash.as_str()),
            children = context.children().len(),
            "reproduced context"
        );
        Some(Ok(context))
    }
}

impl Iterator for Reproduction<'_> {
    type Item = Result<Contract, BlueprintError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = self.candidates.next()?;
            if let Some(result) = self.complete(candidate) {
                return Some(result);
            }
        }
    }
}
