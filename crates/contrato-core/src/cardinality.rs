// contrato-core/src/cardinality.rs
// ============================================================================
// Module: Cardinality Parsing
// Description: Normalized integer ranges constraining how many children apply.
// Purpose: Parse cardinality shorthand into validated `[from, to]` ranges.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A cardinality is a range of integers `[from, to]`, where `to` may be
//! unbounded. Besides the explicit tuple form the parser accepts the following
//! sugar, with `x` a non-negative integer:
//!
//! - `x` -> `[x, x]`
//! - `"*"` -> `[0, *]`
//! - `"?"` or `"1?"` -> `[0, 1]`
//! - `"x"` -> `[x, x]`
//! - `"x+"` -> `[x, *]`
//! - `[x, "*"]` -> `[x, *]`
//!
//! `[0, 0]` is rejected: a range that can never be satisfied nor be absent
//! carries no meaning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeStruct;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Token standing for an unbounded upper limit.
pub const UNBOUNDED_TOKEN: &str = "*";

/// Length of the explicit tuple form.
const ORDERED_LIST_LENGTH: usize = 2;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when a cardinality is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardinalityError {
    /// Input shape is not a number, string, or two element tuple.
    #[error("invalid cardinality: {0}")]
    Malformed(String),
    /// Tuple form with the wrong number of elements.
    #[error("invalid cardinality: expected 2 bounds, found {0}")]
    Arity(usize),
    /// A bound is negative.
    #[error("invalid cardinality: negative bound in {0}")]
    Negative(String),
    /// A bound is not an integer.
    #[error("invalid cardinality: non-integer bound in {0}")]
    NonInteger(String),
    /// The lower bound exceeds the upper bound.
    #[error("invalid cardinality: from ({from}) exceeds to ({to})")]
    Reversed {
        /// Lower bound.
        from: usize,
        /// Upper bound.
        to: usize,
    },
    /// The range `[0, 0]`.
    #[error("invalid cardinality: [0, 0] can never be satisfied")]
    Empty,
}

// ============================================================================
// SECTION: Cardinality
// ============================================================================

/// A validated `[from, to]` range; `to == None` means unbounded.
///
/// # Invariants
/// - `from <= to` when `to` is bounded.
/// - `(from, to) != (0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "Value")]
pub struct Cardinality {
    /// Inclusive lower bound.
    from: usize,
    /// Inclusive upper bound, `None` when unbounded.
    to: Option<usize>,
}

impl Cardinality {
    /// Builds a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`CardinalityError`] when `from > to` or the range is `[0, 0]`.
    pub const fn new(from: usize, to: Option<usize>) -> Result<Self, CardinalityError> {
        match to {
            Some(0) if from == 0 => Err(CardinalityError::Empty),
            Some(to) if from > to => Err(CardinalityError::Reversed {
                from,
                to,
            }),
            _ => Ok(Self {
                from,
                to,
            }),
        }
    }

    /// Exactly `count` elements. `exactly(0)` is rejected like `[0, 0]`.
    ///
    /// # Errors
    ///
    /// Returns [`CardinalityError::Empty`] when `count` is zero.
    pub const fn exactly(count: usize) -> Result<Self, CardinalityError> {
        Self::new(count, Some(count))
    }

    /// At least `count` elements.
    #[must_use]
    pub const fn at_least(count: usize) -> Self {
        Self {
            from: count,
            to: None,
        }
    }

    /// Parses the JSON forms accepted in layouts and declarations.
    ///
    /// # Errors
    ///
    /// Returns [`CardinalityError`] when the input is malformed or violates
    /// the range invariants.
    pub fn parse(input: &Value) -> Result<Self, CardinalityError> {
        match input {
            Value::Number(_) => {
                let count = integer_bound(input, input)?;
                Self::exactly(count)
            }
            Value::String(text) => text.parse(),
            Value::Array(bounds) => parse_tuple(input, bounds),
            Value::Object(map) => {
                let from = map.get("from").ok_or_else(|| malformed(input))?;
                let to = map.get("to").ok_or_else(|| malformed(input))?;
                parse_tuple(input, &[from.clone(), to.clone()])
            }
            Value::Null | Value::Bool(_) => Err(malformed(input)),
        }
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn from(&self) -> usize {
        self.from
    }

    /// Inclusive upper bound, `None` when unbounded.
    #[must_use]
    pub const fn to(&self) -> Option<usize> {
        self.to
    }

    /// True when the upper bound is finite.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.to.is_some()
    }

    /// True when the range is exactly one element.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self.to, Some(1)) && self.from == 1
    }

    /// True when `count` lies within the range.
    #[must_use]
    pub const fn contains(&self, count: usize) -> bool {
        match self.to {
            Some(to) => count >= self.from && count <= to,
            None => count >= self.from,
        }
    }

    /// Upper bound clamped to `available` elements.
    #[must_use]
    pub fn upper_bound(&self, available: usize) -> usize {
        self.to.map_or(available, |to| to.min(available))
    }
}

impl FromStr for Cardinality {
    type Err = CardinalityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let text = input.trim();
        if text == UNBOUNDED_TOKEN {
            return Ok(Self::at_least(0));
        }
        if text == "?" || is_optional_one(text) {
            return Self::new(0, Some(1));
        }
        if is_digits(text) {
            let count = parse_digits(text)?;
            return Self::exactly(count);
        }
        if let Some(prefix) = text.strip_suffix('+') {
            let prefix = prefix.trim();
            if is_digits(prefix) {
                return Ok(Self::at_least(parse_digits(prefix)?));
            }
        }
        Err(CardinalityError::Malformed(input.to_string()))
    }
}

impl TryFrom<Value> for Cardinality {
    type Error = CardinalityError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Serialize for Cardinality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Cardinality", 3)?;
        state.serialize_field("from", &self.from)?;
        match self.to {
            Some(to) => state.serialize_field("to", &to)?,
            None => state.serialize_field("to", UNBOUNDED_TOKEN)?,
        }
        state.serialize_field("finite", &self.is_finite())?;
        state.end()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) => write!(f, "[{}, {to}]", self.from),
            None => write!(f, "[{}, {UNBOUNDED_TOKEN}]", self.from),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the explicit `[from, to]` form.
fn parse_tuple(input: &Value, bounds: &[Value]) -> Result<Cardinality, CardinalityError> {
    if bounds.len() != ORDERED_LIST_LENGTH {
        return Err(CardinalityError::Arity(bounds.len()));
    }
    let from = integer_bound(input, &bounds[0])?;
    let to = match &bounds[1] {
        Value::String(token) if token.trim() == UNBOUNDED_TOKEN => None,
        other => Some(integer_bound(input, other)?),
    };
    Cardinality::new(from, to)
}

/// Reads a non-negative integer bound.
fn integer_bound(input: &Value, bound: &Value) -> Result<usize, CardinalityError> {
    let Value::Number(number) = bound else {
        return Err(malformed(input));
    };
    if let Some(value) = number.as_u64() {
        return usize::try_from(value).map_err(|_| malformed(input));
    }
    if number.as_i64().is_some_and(|value| value < 0)
        || number.as_f64().is_some_and(|value| value < 0.0)
    {
        return Err(CardinalityError::Negative(input.to_string()));
    }
    Err(CardinalityError::NonInteger(input.to_string()))
}

/// Matches `1?` with optional inner whitespace.
fn is_optional_one(text: &str) -> bool {
    text.strip_prefix('1').and_then(|rest| rest.trim_start().strip_suffix('?')).is_some_and(str::is_empty)
}

/// True for a non-empty run of ASCII digits.
fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

/// Parses a digit run that may overflow.
fn parse_digits(text: &str) -> Result<usize, CardinalityError> {
    text.parse().map_err(|_| CardinalityError::Malformed(text.to_string()))
}

/// Builds a malformed-input error.
fn malformed(input: &Value) -> CardinalityError {
    CardinalityError::Malformed(input.to_string())
}
