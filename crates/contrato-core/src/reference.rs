// contrato-core/src/reference.rs
// ============================================================================
// Module: Contract References
// Description: `requires` / `conflicts` declarations compiled to requirements.
// Purpose: Describe what a contract needs from, or rejects in, its context.
// Dependencies: serde_json, thiserror, crate::{cardinality, matcher, requirement}
// ============================================================================

//! ## Overview
//! A contract payload may declare cross-references:
//!
//! ```json
//! {
//!   "requires": [
//!     { "type": "arch.sw", "slug": "armv7hf" },
//!     { "or": [ { "type": "sw.os", "slug": "debian" }, { "type": "sw.os", "slug": "fedora" } ] }
//!   ],
//!   "conflicts": [ { "type": "sw.stack", "slug": "nodejs" } ]
//! }
//! ```
//!
//! Each criteria object becomes a [`Reference`] predicate holding the
//! criteria and a [`Cardinality`] (an optional `cardinality` member, `1+`
//! when absent). Composite entries use `and`, `or` and `not`. Conflicts
//! compile to negated references. Every criteria object names a `type`, so
//! a reference is only decided once its type is part of the queried scope.
//!
//! Security posture: declarations are authored input; malformed entries are
//! rejected when the contract is constructed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::cardinality::Cardinality;
use crate::cardinality::CardinalityError;
use crate::matcher::Criteria;
use crate::requirement::Requirement;
use crate::requirement::TriState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Payload member listing required references.
pub const REQUIRES_FIELD: &str = "requires";
/// Payload member listing conflicting references.
pub const CONFLICTS_FIELD: &str = "conflicts";
/// Criteria member overriding the default reference cardinality.
const CARDINALITY_FIELD: &str = "cardinality";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when compiling declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// A declaration list is not an array.
    #[error("{field} must be an array")]
    NotAList {
        /// Payload member name.
        field: &'static str,
    },
    /// An entry is neither criteria nor a composite.
    #[error("invalid {field} entry: {entry}")]
    InvalidEntry {
        /// Payload member name.
        field: &'static str,
        /// Offending entry.
        entry: String,
    },
    /// A criteria entry names no string `type`.
    #[error("{field} entry must name a type: {entry}")]
    Untyped {
        /// Payload member name.
        field: &'static str,
        /// Offending entry.
        entry: String,
    },
    /// An entry carries an invalid cardinality.
    #[error("invalid {field} entry cardinality: {source}")]
    Cardinality {
        /// Payload member name.
        field: &'static str,
        /// Underlying parse error.
        source: CardinalityError,
    },
}

// ============================================================================
// SECTION: Reference
// ============================================================================

/// A criteria predicate counted against a set of children.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Partial document a matching child contains.
    criteria: Criteria,
    /// Accepted number of matching children.
    cardinality: Cardinality,
}

impl Reference {
    /// Creates a reference.
    #[must_use]
    pub const fn new(criteria: Criteria, cardinality: Cardinality) -> Self {
        Self {
            criteria,
            cardinality,
        }
    }

    /// Criteria a matching child contains.
    #[must_use]
    pub const fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Accepted number of matching children.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Type named by the criteria, if any.
    #[must_use]
    pub fn target_type(&self) -> Option<&str> {
        self.criteria.contract_type()
    }

    /// True when the reference can be decided for the given types.
    #[must_use]
    pub fn in_scope(&self, types: &BTreeSet<String>) -> bool {
        self.target_type().is_some_and(|target| types.contains(target))
    }

    /// Evaluates the reference given the number of matching children.
    #[must_use]
    pub fn evaluate(&self, types: &BTreeSet<String>, matching: usize) -> TriState {
        if self.in_scope(types) {
            TriState::from(self.cardinality.contains(matching))
        } else {
            TriState::Unknown
        }
    }
}

// ============================================================================
// SECTION: Declarations
// ============================================================================

/// Compiled `requires` and `conflicts` of one contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    /// Conjunction of `requires` entries.
    requires: Requirement<Reference>,
    /// Conjunction of negated `conflicts` entries.
    conflicts: Requirement<Reference>,
}

impl Declarations {
    /// Compiles declarations from a contract payload.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError`] when an entry is malformed.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, DeclarationError> {
        let requires = match payload.get(REQUIRES_FIELD) {
            None | Some(Value::Null) => Requirement::default(),
            Some(Value::Array(entries)) => Requirement::and(
                entries
                    .iter()
                    .map(|entry| compile_entry(REQUIRES_FIELD, entry))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => {
                return Err(DeclarationError::NotAList {
                    field: REQUIRES_FIELD,
                });
            }
        };
        let conflicts = match payload.get(CONFLICTS_FIELD) {
            None | Some(Value::Null) => Requirement::default(),
            Some(Value::Array(entries)) => Requirement::and(
                entries
                    .iter()
                    .map(|entry| compile_entry(CONFLICTS_FIELD, entry).map(Requirement::negate))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => {
                return Err(DeclarationError::NotAList {
                    field: CONFLICTS_FIELD,
                });
            }
        };
        Ok(Self {
            requires,
            conflicts,
        })
    }

    /// Compiled `requires`.
    #[must_use]
    pub const fn requires(&self) -> &Requirement<Reference> {
        &self.requires
    }

    /// Compiled `conflicts`, already negated.
    #[must_use]
    pub const fn conflicts(&self) -> &Requirement<Reference> {
        &self.conflicts
    }

    /// True when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.conflicts.is_empty()
    }

    /// References this contract pulls in.
    #[must_use]
    pub fn positive_references(&self) -> Vec<&Reference> {
        self.requires.positive_predicates()
    }

    /// Evaluates requires and conflicts together.
    pub fn evaluate<F>(&self, count: &mut F) -> TriState
    where
        F: FnMut(&Reference) -> TriState,
    {
        self.requires.eval_tristate(count).and(self.conflicts.eval_tristate(count))
    }
}

/// Compiles one declaration entry.
fn compile_entry(
    field: &'static str,
    entry: &Value,
) -> Result<Requirement<Reference>, DeclarationError> {
    let Value::Object(map) = entry else {
        return Err(invalid(field, entry));
    };
    if map.len() == 1 {
        if let Some(Value::Array(operands)) = map.get("and") {
            return compile_operands(field, operands).map(Requirement::and);
        }
        if let Some(Value::Array(operands)) = map.get("or") {
            return compile_operands(field, operands).map(Requirement::or);
        }
        if let Some(operand) = map.get("not") {
            return compile_entry(field, operand).map(Requirement::negate);
        }
    }
    let mut criteria = map.clone();
    let cardinality = match criteria.remove(CARDINALITY_FIELD) {
        Some(value) => Cardinality::parse(&value).map_err(|source| DeclarationError::Cardinality {
            field,
            source,
        })?,
        None => Cardinality::at_least(1),
    };
    if criteria.is_empty() {
        return Err(invalid(field, entry));
    }
    if !criteria.get("type").is_some_and(Value::is_string) {
        return Err(DeclarationError::Untyped {
            field,
            entry: entry.to_string(),
        });
    }
    Ok(Requirement::predicate(Reference::new(Criteria::new(criteria), cardinality)))
}

/// Compiles composite operands.
fn compile_operands(
    field: &'static str,
    operands: &[Value],
) -> Result<Vec<Requirement<Reference>>, DeclarationError> {
    operands.iter().map(|operand| compile_entry(field, operand)).collect()
}

/// Builds an invalid-entry error.
fn invalid(field: &'static str, entry: &Value) -> DeclarationError {
    DeclarationError::InvalidEntry {
        field,
        entry: entry.to_string(),
    }
}
