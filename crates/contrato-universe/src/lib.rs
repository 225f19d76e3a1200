// contrato-universe/src/lib.rs
// ============================================================================
// Module: Contrato Universe Library
// Description: Public API surface for loading universes from disk.
// Purpose: Expose the filesystem loader and its options.
// Dependencies: crate::loader
// ============================================================================

//! ## Overview
//! Builds a `meta.universe` contract from every JSON document below a
//! directory. Loading finishes before the universe is handed to a blueprint,
//! so the search itself never touches the filesystem.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod loader;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use loader::DEFAULT_CONCURRENCY;
pub use loader::DEFAULT_MAX_FILE_BYTES;
pub use loader::LoadError;
pub use loader::LoadOptions;
pub use loader::MAX_CONCURRENCY;
pub use loader::PathFilter;
pub use loader::discover_documents;
pub use loader::load_universe;
