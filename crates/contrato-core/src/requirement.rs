// contrato-core/src/requirement.rs
// ============================================================================
// Module: Requirement Algebra
// Description: Boolean trees over typed predicates with tri-state evaluation.
// Purpose: Compose matcher criteria and contract requires/conflicts.
// Dependencies: serde, smallvec
// ============================================================================

//! ## Overview
//! A [`Requirement`] is a small Boolean algebra (`And`, `Or`, `Not`) whose
//! leaves are domain predicates. Evaluation uses strong Kleene logic so a
//! predicate that cannot be decided yet (its type is not part of the current
//! search scope) yields [`TriState::Unknown`] and never prunes on its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

// ============================================================================
// SECTION: Tri-State Value
// ============================================================================

/// Tri-state truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    /// Definitively true
    True,
    /// Definitively false
    False,
    /// Not decidable in the current scope
    Unknown,
}

impl TriState {
    /// Returns true if the value is `False`
    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::False)
    }

    /// Strong Kleene conjunction.
    #[must_use]
    pub const fn and(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Strong Kleene disjunction.
    #[must_use]
    pub const fn or(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Strong Kleene negation.
    #[must_use]
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

// ============================================================================
// SECTION: Requirement Definition
// ============================================================================

/// Requirement tree with domain-specific leaves
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement<P> {
    /// All sub-requirements must hold. Empty And is trivially satisfied.
    And(SmallVec<[Box<Self>; 4]>),
    /// At least one sub-requirement must hold. Empty Or is unsatisfiable.
    Or(SmallVec<[Box<Self>; 4]>),
    /// Inverts the sub-requirement.
    Not(Box<Self>),
    /// Domain predicate.
    Predicate(P),
}

impl<P> Default for Requirement<P> {
    /// Creates an empty And requirement (trivially satisfied)
    fn default() -> Self {
        Self::And(SmallVec::new())
    }
}

impl<P> Requirement<P> {
    /// Creates a logical AND of the given requirements
    pub fn and(requirements: Vec<Self>) -> Self {
        Self::And(requirements.into_iter().map(Box::new).collect())
    }

    /// Creates a logical OR of the given requirements
    pub fn or(requirements: Vec<Self>) -> Self {
        Self::Or(requirements.into_iter().map(Box::new).collect())
    }

    /// Creates a logical NOT of the given requirement
    pub fn negate(requirement: Self) -> Self {
        Self::Not(Box::new(requirement))
    }

    /// Creates a requirement from a predicate
    pub const fn predicate(predicate: P) -> Self {
        Self::Predicate(predicate)
    }

    /// True for an empty And, the identity requirement.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::And(reqs) if reqs.is_empty())
    }

    /// Evaluates with short-circuiting two-valued logic.
    pub fn eval<F>(&self, predicate: &mut F) -> bool
    where
        F: FnMut(&P) -> bool,
    {
        match self {
            Self::Predicate(leaf) => predicate(leaf),
            Self::Not(requirement) => !requirement.eval(predicate),
            Self::And(requirements) => requirements.iter().all(|req| req.eval(predicate)),
            Self::Or(requirements) => requirements.iter().any(|req| req.eval(predicate)),
        }
    }

    /// Evaluates with strong Kleene logic.
    pub fn eval_tristate<F>(&self, predicate: &mut F) -> TriState
    where
        F: FnMut(&P) -> TriState,
    {
        match self {
            Self::Predicate(leaf) => predicate(leaf),
            Self::Not(requirement) => requirement.eval_tristate(predicate).not(),
            Self::And(requirements) => {
                let mut acc = TriState::True;
                for req in requirements {
                    acc = acc.and(req.eval_tristate(predicate));
                    if acc.is_false() {
                        break;
                    }
                }
                acc
            }
            Self::Or(requirements) => {
                let mut acc = TriState::False;
                for req in requirements {
                    acc = acc.or(req.eval_tristate(predicate));
                    if acc == TriState::True {
                        break;
                    }
                }
                acc
            }
        }
    }

    /// Predicates reachable without crossing a `Not`, in tree order.
    ///
    /// These are the positive references a requirement pulls in; negated
    /// leaves describe conflicts and never name something to fetch.
    #[must_use]
    pub fn positive_predicates(&self) -> Vec<&P> {
        let mut out = Vec::new();
        self.collect_positive(&mut out);
        out
    }

    /// Walk feeding [`Self::positive_predicates`].
    fn collect_positive<'a>(&'a self, out: &mut Vec<&'a P>) {
        match self {
            Self::Predicate(leaf) => out.push(leaf),
            Self::Not(_) => {}
            Self::And(requirements) | Self::Or(requirements) => {
                for req in requirements {
                    req.collect_positive(out);
                }
            }
        }
    }

    /// Returns the complexity of this requirement tree
    pub fn complexity(&self) -> usize {
        match self {
            Self::Predicate(_) => 1,
            Self::Not(req) => 1 + req.complexity(),
            Self::And(reqs) | Self::Or(reqs) => {
                1 + reqs.iter().map(|r| r.complexity()).sum::<usize>()
            }
        }
    }
}
