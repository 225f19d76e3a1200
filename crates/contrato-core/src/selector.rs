// contrato-core/src/selector.rs
// ============================================================================
// Module: Layout Selectors
// Description: Typed, cardinality-bounded child selectors with optional filters.
// Purpose: Describe which children a blueprint picks for one type.
// Dependencies: jsonschema, serde_json, thiserror, crate::{cardinality, contract}
// ============================================================================

//! ## Overview
//! A [`Selector`] names a child type, a [`Cardinality`] and two optional
//! narrowing rules: a JSON Schema (draft 2020-12) validated against the
//! child's JSON form, and an exact `version`. Schemas are compiled once, when
//! the selector is built, so an invalid filter fails before any search.
//!
//! [`Combination`] is what a selector enumerates: a single contract when the
//! cardinality is exactly one, otherwise a (possibly empty) list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

use crate::cardinality::Cardinality;
use crate::contract::Contract;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when building a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The filter is not a valid JSON Schema.
    #[error("invalid filter for {selector_type}: {reason}")]
    InvalidFilter {
        /// Selector type.
        selector_type: String,
        /// Compiler message.
        reason: String,
    },
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// A compiled JSON Schema filter.
#[derive(Clone)]
pub struct SelectorFilter {
    /// Source schema.
    schema: Value,
    /// Compiled validator.
    validator: Arc<Validator>,
}

impl SelectorFilter {
    /// Compiles a schema.
    fn compile(selector_type: &str, schema: Value) -> Result<Self, SelectorError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|err| SelectorError::InvalidFilter {
                selector_type: selector_type.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            schema,
            validator: Arc::new(validator),
        })
    }

    /// Source schema.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// True when `instance` validates.
    #[must_use]
    pub fn accepts(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }
}

impl fmt::Debug for SelectorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorFilter").field("schema", &self.schema).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Selector
// ============================================================================

/// A typed, bounded selection of children.
#[derive(Debug, Clone)]
pub struct Selector {
    /// Child type selected.
    selector_type: String,
    /// Accepted subset sizes.
    cardinality: Cardinality,
    /// Optional schema filter.
    filter: Option<SelectorFilter>,
    /// Optional exact version.
    version: Option<String>,
}

impl Selector {
    /// Selector over `selector_type` with no filter or version.
    #[must_use]
    pub fn new(selector_type: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            selector_type: selector_type.into(),
            cardinality,
            filter: None,
            version: None,
        }
    }

    /// Adds a JSON Schema filter.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidFilter`] when the schema does not compile.
    pub fn with_filter(mut self, schema: Value) -> Result<Self, SelectorError> {
        self.filter = Some(SelectorFilter::compile(&self.selector_type, schema)?);
        Ok(self)
    }

    /// Restricts the selector to one version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Child type selected.
    #[must_use]
    pub fn selector_type(&self) -> &str {
        &self.selector_type
    }

    /// Accepted subset sizes.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Schema filter, when present.
    #[must_use]
    pub const fn filter(&self) -> Option<&SelectorFilter> {
        self.filter.as_ref()
    }

    /// Required version, when present.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// True when `contract` has the selector type and passes its filters.
    #[must_use]
    pub fn accepts(&self, contract: &Contract) -> bool {
        if contract.contract_type() != self.selector_type {
            return false;
        }
        if let Some(version) = &self.version
            && !version_matches(contract.raw().get("version"), version)
        {
            return false;
        }
        self.filter.as_ref().is_none_or(|filter| filter.accepts(&contract.to_json()))
    }
}

/// Exact version comparison over string or numeric payload versions.
fn version_matches(actual: Option<&Value>, expected: &str) -> bool {
    match actual {
        Some(Value::String(text)) => text == expected,
        Some(Value::Number(number)) => number.to_string() == expected,
        _ => false,
    }
}

// ============================================================================
// SECTION: Combination
// ============================================================================

/// One admissible selection of children for a selector.
#[derive(Debug, Clone)]
pub enum Combination {
    /// Exactly one contract.
    Single(Arc<Contract>),
    /// Any other subset, possibly empty.
    Many(Vec<Arc<Contract>>),
}

impl Combination {
    /// Contracts in the combination.
    #[must_use]
    pub fn contracts(&self) -> &[Arc<Contract>] {
        match self {
            Self::Single(contract) => std::slice::from_ref(contract),
            Self::Many(contracts) => contracts,
        }
    }

    /// Number of contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts().len()
    }

    /// True for the empty subset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts().is_empty()
    }
}
