// contrato-render/src/render.rs
// ============================================================================
// Module: Template Builder
// Description: Handlebars rendering of a context with partial imports.
// Purpose: Produce text artifacts (docs, scripts) from resolved contexts.
// Dependencies: contrato-core, handlebars, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`build_template`] renders a Handlebars template against a context. The
//! root scope is the context's children tree, so `{{sw.os.slug}}` reads the
//! `sw.os` child; the context payload is reachable through `this.*` and the
//! tree again through `children.*`. Output is not HTML-escaped and runs of
//! blank lines collapse to one.
//!
//! Two groups of helpers are registered:
//!
//! - `import partial="name" combination="type-a+type-b"` inlines the first
//!   partial found through [`find_partial`] under
//!   `<directory>/<combination>`, rendered against the same root scope;
//! - `eq`, `ne`, `lt`, `gt`, `lte`, `gte`, `and` and `or`, usable as
//!   subexpressions such as `{{#if (eq hw.device-type.arch "armv7hf")}}`.
//!
//! A failing import aborts the render with the typed [`RenderError`] raised
//! by the innermost import.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering as Comparison;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use contrato_core::Contract;
use handlebars::Context;
use handlebars::Handlebars;
use handlebars::Helper;
use handlebars::HelperDef;
use handlebars::HelperResult;
use handlebars::Output;
use handlebars::PathAndJson;
use handlebars::RenderContext;
use handlebars::RenderErrorReason;
use handlebars::ScopedJson;
use handlebars::no_escape;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::partials::REFERENCE_DELIMITER;
use crate::partials::find_partial;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum nesting of imported partials.
pub const MAX_IMPORT_DEPTH: usize = 16;
/// Helper name of the import directive.
const IMPORT_HELPER: &str = "import";
/// Import argument naming the partial.
const PARTIAL_ARGUMENT: &str = "partial";
/// Import argument naming the directory structure.
const COMBINATION_ARGUMENT: &str = "combination";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// No candidate path exists for a partial.
    #[error("partial not found: {partial}")]
    PartialNotFound {
        /// Partial name.
        partial: String,
    },
    /// Malformed import directive.
    #[error("invalid import directive: {0}")]
    InvalidImport(String),
    /// Imports nest too deeply.
    #[error("partial imports exceed depth {limit}")]
    ImportDepth {
        /// Depth limit.
        limit: usize,
    },
    /// A partial could not be read.
    #[error("failed to read partial {}: {message}", path.display())]
    Io {
        /// Partial path.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// The template does not parse or render.
    #[error("template error: {0}")]
    Template(String),
}

// ============================================================================
// SECTION: Import Directive
// ============================================================================

/// Arguments of one `import` helper call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// Partial name, without extension.
    pub partial: String,
    /// `+`-separated type structure of the partial directory.
    pub combination: String,
}

impl ImportDirective {
    /// Types named by the combination, trimmed.
    #[must_use]
    pub fn structure(&self) -> Vec<&str> {
        self.combination.split(REFERENCE_DELIMITER).map(str::trim).collect()
    }

    /// Reads the hash arguments of an `import` call.
    fn from_helper(helper: &Helper<'_>) -> Result<Self, RenderError> {
        if !helper.params().is_empty() {
            return Err(RenderError::InvalidImport("positional arguments are not accepted".to_string()));
        }
        if let Some(unknown) = helper
            .hash()
            .keys()
            .find(|key| **key != PARTIAL_ARGUMENT && **key != COMBINATION_ARGUMENT)
        {
            return Err(RenderError::InvalidImport(format!("unknown argument {unknown}")));
        }
        let argument = |name: &str| {
            helper.hash_get(name).and_then(|value| value.value().as_str()).map(str::to_string)
        };
        match (argument(PARTIAL_ARGUMENT), argument(COMBINATION_ARGUMENT)) {
            (Some(partial), Some(combination)) if !partial.is_empty() => Ok(Self {
                partial,
                combination,
            }),
            _ => Err(RenderError::InvalidImport(
                "partial and combination must be strings".to_string(),
            )),
        }
    }
}

// ============================================================================
// SECTION: Building
// ============================================================================

/// Renders `template` against `context`, importing partials from `directory`.
///
/// # Errors
///
/// Returns [`RenderError`] when the template is malformed or an import is
/// malformed, missing, unreadable or nested too deeply.
pub fn build_template(
    template: &str,
    context: &Contract,
    directory: &Path,
) -> Result<String, RenderError> {
    let state = Arc::new(ImportState::default());
    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);
    registry.register_helper(
        IMPORT_HELPER,
        Box::new(ImportHelper {
            context,
            directory,
            state: Arc::clone(&state),
        }),
    );
    for (name, helper) in LogicHelper::ALL {
        registry.register_helper(name, Box::new(helper));
    }
    match registry.render_template(template, &render_scope(context)) {
        Ok(rendered) => Ok(strip_extra_blank_lines(&rendered)),
        Err(err) => Err(state.take().unwrap_or_else(|| RenderError::Template(err.to_string()))),
    }
}

/// Root scope: the context payload with its children tree, which is also
/// spread at the root.
fn render_scope(context: &Contract) -> Value {
    let mut scope = context.to_json();
    if let Some(Value::Object(tree)) = scope.get("children").cloned()
        && let Value::Object(root) = &mut scope
    {
        root.extend(tree);
    }
    scope
}

/// Collapses runs of blank lines into a single empty line.
#[must_use]
pub fn strip_extra_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.split('\n') {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(if blank { "" } else { line });
        previous_blank = blank;
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Import Helper
// ============================================================================

/// State shared by every import of one render.
#[derive(Debug, Default)]
struct ImportState {
    /// Imports currently being rendered.
    depth: AtomicUsize,
    /// First typed failure.
    failure: Mutex<Option<RenderError>>,
}

impl ImportState {
    /// Records `err` unless a failure is already recorded, and converts it
    /// for the template engine.
    fn fail(&self, err: RenderError) -> handlebars::RenderError {
        let message = err.to_string();
        if let Ok(mut slot) = self.failure.lock()
            && slot.is_none()
        {
            *slot = Some(err);
        }
        RenderErrorReason::Other(message).into()
    }

    /// Takes the recorded failure.
    fn take(&self) -> Option<RenderError> {
        self.failure.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// The `import` helper.
struct ImportHelper<'a> {
    /// Context whose children select partials.
    context: &'a Contract,
    /// Partials root.
    directory: &'a Path,
    /// Shared render state.
    state: Arc<ImportState>,
}

impl ImportHelper<'_> {
    /// Loads and renders the first existing partial candidate.
    fn render_partial(
        &self,
        directive: &ImportDirective,
        registry: &Handlebars<'_>,
        root: &Value,
    ) -> Result<String, handlebars::RenderError> {
        let base = self.directory.join(&directive.combination);
        let candidates =
            find_partial(&directive.partial, self.context, &base, &directive.structure());
        for candidate in candidates {
            match fs::read_to_string(&candidate) {
                Ok(mut content) => {
                    debug!(path = %candidate.display(), "using partial");
                    content.pop();
                    return registry.render_template(&content, root);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!(path = %candidate.display(), "partial candidate missing");
                }
                Err(err) => {
                    return Err(self.state.fail(RenderError::Io {
                        path: candidate,
                        message: err.to_string(),
                    }));
                }
            }
        }
        Err(self.state.fail(RenderError::PartialNotFound {
            partial: directive.partial.clone(),
        }))
    }
}

impl HelperDef for ImportHelper<'_> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        helper: &Helper<'rc>,
        registry: &'reg Handlebars<'reg>,
        context: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let directive = ImportDirective::from_helper(helper).map_err(|err| self.state.fail(err))?;
        let depth = self.state.depth.fetch_add(1, Ordering::SeqCst);
        let rendered = if depth >= MAX_IMPORT_DEPTH {
            Err(self.state.fail(RenderError::ImportDepth {
                limit: MAX_IMPORT_DEPTH,
            }))
        } else {
            self.render_partial(&directive, registry, context.data())
        };
        self.state.depth.fetch_sub(1, Ordering::SeqCst);
        out.write(&rendered?)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Logic Helpers
// ============================================================================

/// Comparison and boolean helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicHelper {
    /// Strict equality.
    Eq,
    /// Strict inequality.
    Ne,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Less than or equal.
    Lte,
    /// Greater than or equal.
    Gte,
    /// Every argument truthy.
    And,
    /// Some argument truthy.
    Or,
}

impl LogicHelper {
    /// Registered names.
    const ALL: [(&'static str, Self); 8] = [
        ("eq", Self::Eq),
        ("ne", Self::Ne),
        ("lt", Self::Lt),
        ("gt", Self::Gt),
        ("lte", Self::Lte),
        ("gte", Self::Gte),
        ("and", Self::And),
        ("or", Self::Or),
    ];

    /// Applies the helper to its positional arguments.
    fn apply(self, params: &[&Value]) -> bool {
        let left = params.first().copied().unwrap_or(&Value::Null);
        let right = params.get(1).copied().unwrap_or(&Value::Null);
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => compare(left, right) == Some(Comparison::Less),
            Self::Gt => compare(left, right) == Some(Comparison::Greater),
            Self::Lte => matches!(compare(left, right), Some(Comparison::Less | Comparison::Equal)),
            Self::Gte => {
                matches!(compare(left, right), Some(Comparison::Greater | Comparison::Equal))
            }
            Self::And => params.iter().all(|value| truthy(value)),
            Self::Or => params.iter().any(|value| truthy(value)),
        }
    }
}

impl HelperDef for LogicHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        helper: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, handlebars::RenderError> {
        let params: Vec<&Value> = helper.params().iter().map(PathAndJson::value).collect();
        Ok(ScopedJson::Derived(Value::Bool(self.apply(&params))))
    }
}

/// Orders numbers numerically and strings lexicographically; other pairs
/// are unordered.
fn compare(left: &Value, right: &Value) -> Option<Comparison> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

/// Truthiness: null, false, zero and the empty string are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
