// contrato-core/src/lib.rs
// ============================================================================
// Module: Contrato Core Library
// Description: Public API surface for contracts, blueprints and their search.
// Purpose: Expose the contract model and the blueprint reproduction engine.
// Dependencies: crate::{blueprint, contract, cardinality, ...}
// ============================================================================

//! ## Overview
//! Contrato resolves blueprints against a universe of typed metadata
//! contracts. A [`Blueprint`] maps contract types to cardinality-bounded
//! selectors; [`Blueprint::reproduce`] lazily yields every context (a
//! contract whose children are one valid selection per selector) that the
//! universe can satisfy. Bounded selectors are enumerated through a pruning
//! depth-first product, unbounded ones are resolved through the
//! cross-references declared by the selected contracts.
//!
//! The crate is synchronous and performs no I/O; loading and rendering live
//! in sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod blueprint;
pub mod cardinality;
pub mod contract;
pub mod hashing;
pub mod matcher;
pub mod object_set;
pub mod product;
pub mod reference;
pub mod requirement;
pub mod selector;
pub mod template;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use blueprint::Blueprint;
pub use blueprint::BlueprintError;
pub use blueprint::Layout;
pub use blueprint::Reproduction;
pub use blueprint::SelectorGroup;
pub use blueprint::query;
pub use cardinality::Cardinality;
pub use cardinality::CardinalityError;
pub use contract::BLUEPRINT;
pub use contract::CONTEXT;
pub use contract::Contract;
pub use contract::ContractError;
pub use contract::ContractOptions;
pub use contract::Rehash;
pub use contract::TypeSet;
pub use contract::UNIVERSE;
pub use hashing::ContentHash;
pub use hashing::HashError;
pub use matcher::Criteria;
pub use matcher::MATCHER;
pub use matcher::Matcher;
pub use matcher::MatcherError;
pub use matcher::MatcherOperation;
pub use object_set::ObjectSet;
pub use object_set::SetMember;
pub use product::CartesianProduct;
pub use product::ProductReducer;
pub use reference::DeclarationError;
pub use reference::Declarations;
pub use reference::Reference;
pub use requirement::Requirement;
pub use requirement::TriState;
pub use selector::Combination;
pub use selector::Selector;
pub use selector::SelectorError;
