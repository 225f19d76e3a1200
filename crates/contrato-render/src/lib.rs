// contrato-render/src/lib.rs
// ============================================================================
// Module: Contrato Render Library
// Description: Public API surface for context template rendering.
// Purpose: Expose partial lookup and template building.
// Dependencies: crate::{partials, render}
// ============================================================================

//! ## Overview
//! Renders Handlebars templates against a resolved context. Placeholders
//! read the context's children tree; the `import` helper pulls partials from
//! a directory laid out by contract type, falling back from the most specific
//! combination of children to the bare partial name. Comparison and boolean
//! helpers support conditional sections.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod partials;
pub mod render;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use partials::PARTIAL_EXTENSION;
pub use partials::REFERENCE_DELIMITER;
pub use partials::find_partial;
pub use render::ImportDirective;
pub use render::MAX_IMPORT_DEPTH;
pub use render::RenderError;
pub use render::build_template;
pub use render::strip_extra_blank_lines;
