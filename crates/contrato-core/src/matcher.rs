// contrato-core/src/matcher.rs
// ============================================================================
// Module: Structural Matchers
// Description: Criteria predicates and and/or matcher composition.
// Purpose: Query contracts by partial structural equality instead of identity.
// Dependencies: serde, serde_json, thiserror, crate::{contract, requirement}
// ============================================================================

//! ## Overview
//! Criteria are partial JSON documents: a contract matches when every member
//! of the criteria is present in its payload with an equal value, recursing
//! into nested objects. A matcher contract (`meta.matcher`) carries criteria
//! in `data` and may compose nested matchers with an `and`/`or` operation; it
//! compiles into a [`Requirement`] over [`Criteria`] leaves. An operand list
//! without an explicit operation is a conjunction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::contract::Contract;
use crate::requirement::Requirement;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved type of matcher contracts.
pub const MATCHER: &str = "meta.matcher";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when compiling a matcher payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatcherError {
    /// Criteria must be a JSON object.
    #[error("matcher criteria must be an object, found {0}")]
    InvalidCriteria(String),
    /// Unknown operation name.
    #[error("unknown matcher operation: {0}")]
    UnknownOperation(String),
}

// ============================================================================
// SECTION: Operation
// ============================================================================

/// Combinator for composite matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherOperation {
    /// Every operand must match.
    And,
    /// Any operand may match.
    Or,
}

impl MatcherOperation {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl std::fmt::Display for MatcherOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatcherOperation {
    type Err = MatcherError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(MatcherError::UnknownOperation(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Criteria
// ============================================================================

/// Partial document a payload must contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(Map<String, Value>);

impl Criteria {
    /// Wraps a criteria object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builds criteria from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError::InvalidCriteria`] when `value` is not an object.
    pub fn from_value(value: &Value) -> Result<Self, MatcherError> {
        match value {
            Value::Object(map) => Ok(Self(map.clone())),
            other => Err(MatcherError::InvalidCriteria(other.to_string())),
        }
    }

    /// The contract type named by the criteria, if any.
    #[must_use]
    pub fn contract_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Criteria members.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// True when `payload` contains every criteria member.
    #[must_use]
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.0.iter().all(|(key, expected)| {
            payload.get(key).is_some_and(|actual| contains_partial(actual, expected))
        })
    }
}

/// Partial deep equality: objects recurse, everything else compares equal.
#[must_use]
pub fn contains_partial(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(key, value)| {
            actual.get(key).is_some_and(|candidate| contains_partial(candidate, value))
        }),
        _ => actual == expected,
    }
}

// ============================================================================
// SECTION: Matcher
// ============================================================================

/// Compiled matcher expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    /// Expression over criteria leaves.
    expression: Requirement<Criteria>,
}

impl Matcher {
    /// Compiles a matcher payload `{type, data, operation?}`.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError`] when the payload is malformed.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, MatcherError> {
        Ok(Self {
            expression: compile_payload(payload)?,
        })
    }

    /// Compiles a matcher contract built by [`Contract::create_matcher`].
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError`] when the contract payload is malformed.
    pub fn from_contract(contract: &Contract) -> Result<Self, MatcherError> {
        Self::from_payload(contract.raw())
    }

    /// Matcher over a single criteria object.
    #[must_use]
    pub const fn from_criteria(criteria: Criteria) -> Self {
        Self {
            expression: Requirement::predicate(criteria),
        }
    }

    /// Compiled expression.
    #[must_use]
    pub const fn expression(&self) -> &Requirement<Criteria> {
        &self.expression
    }

    /// Type shared by the whole expression when it is a single criteria leaf.
    #[must_use]
    pub fn type_hint(&self) -> Option<&str> {
        match &self.expression {
            Requirement::Predicate(criteria) => criteria.contract_type(),
            _ => None,
        }
    }

    /// Evaluates the matcher against a payload.
    #[must_use]
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.expression.eval(&mut |criteria: &Criteria| criteria.matches(payload))
    }
}

/// Compiles a `{type, data, operation?}` payload.
fn compile_payload(payload: &Map<String, Value>) -> Result<Requirement<Criteria>, MatcherError> {
    let operation = match payload.get("operation") {
        Some(Value::String(name)) => Some(name.parse::<MatcherOperation>()?),
        Some(Value::Null) | None => None,
        Some(other) => return Err(MatcherError::UnknownOperation(other.to_string())),
    };
    match payload.get("data") {
        Some(Value::Array(operands)) => {
            let compiled =
                operands.iter().map(compile_operand).collect::<Result<Vec<_>, _>>()?;
            Ok(match operation.unwrap_or(MatcherOperation::And) {
                MatcherOperation::And => Requirement::and(compiled),
                MatcherOperation::Or => Requirement::or(compiled),
            })
        }
        Some(data) => Criteria::from_value(data).map(Requirement::predicate),
        None => Err(MatcherError::InvalidCriteria("null".to_string())),
    }
}

/// Compiles one operand of a composite matcher.
fn compile_operand(operand: &Value) -> Result<Requirement<Criteria>, MatcherError> {
    match operand {
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some(MATCHER) => {
            compile_payload(map)
        }
        other => Criteria::from_value(other).map(Requirement::predicate),
    }
}
