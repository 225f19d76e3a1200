// contrato-core/src/template.rs
// ============================================================================
// Module: Payload Templates
// Description: Placeholder parsing and resolution over JSON payloads.
// Purpose: Support two-phase interpolation of `{{this.*}}` / `{{children.*}}`.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Any string inside a contract payload may embed `{{ dotted.path }}`
//! placeholders. Strings are parsed once into a [`Template`] of literal and
//! placeholder segments and remembered by location, so a later pass renders
//! from the original template instead of re-scanning already rendered text.
//! Placeholders whose path does not resolve to a scalar are kept verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Opening placeholder delimiter.
const OPEN: &str = "{{";
/// Closing placeholder delimiter.
const CLOSE: &str = "}}";

// ============================================================================
// SECTION: Template
// ============================================================================

/// A parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text copied to the output.
    Literal(String),
    /// Placeholder resolved against a scope.
    Placeholder {
        /// Dotted path split into segments.
        path: Vec<String>,
        /// Original placeholder text including delimiters.
        source: String,
    },
}

/// Behaviour for placeholders that do not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// Keep the placeholder text for a later pass.
    Keep,
    /// Render nothing.
    Empty,
}

/// A string split into literal and placeholder segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Segments in source order.
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `text`, returning `None` when it contains no placeholder.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut has_placeholder = false;
        while let Some(start) = rest.find(OPEN) {
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let expression = after_open[..end].trim();
            let source = &rest[start..start + OPEN.len() + end + CLOSE.len()];
            segments.push(Segment::Placeholder {
                path: expression.split('.').map(str::to_string).collect(),
                source: source.to_string(),
            });
            has_placeholder = true;
            rest = &after_open[end + CLOSE.len()..];
        }
        if !has_placeholder {
            return None;
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Some(Self {
            segments,
        })
    }

    /// Segments in source order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders the template against `scope`.
    #[must_use]
    pub fn render(&self, scope: &Value, unresolved: Unresolved) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder {
                    path,
                    source,
                } => match lookup(scope, path).and_then(scalar_text) {
                    Some(text) => out.push_str(&text),
                    None if unresolved == Unresolved::Keep => out.push_str(source),
                    None => {}
                },
            }
        }
        out
    }
}

// ============================================================================
// SECTION: Path Lookup
// ============================================================================

/// Resolves a dotted path against a JSON value.
#[must_use]
pub fn lookup<'a, S: AsRef<str>>(scope: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(scope, |current, segment| {
        let segment = segment.as_ref();
        match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
    })
}

/// Text rendering for scalar values.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ============================================================================
// SECTION: Payload Templates
// ============================================================================

/// Step from a payload root to a nested string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

/// A templated string and where it lives in a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    /// Path from the payload root.
    location: Vec<Location>,
    /// Parsed template.
    template: Template,
}

impl TemplateField {
    /// Path from the payload root.
    #[must_use]
    pub fn location(&self) -> &[Location] {
        &self.location
    }

    /// Parsed template.
    #[must_use]
    pub const fn template(&self) -> &Template {
        &self.template
    }
}

/// Collects every templated string inside `value`.
#[must_use]
pub fn collect_templates(value: &Value) -> Vec<TemplateField> {
    let mut fields = Vec::new();
    let mut location = Vec::new();
    collect_into(value, &mut location, &mut fields);
    fields
}

/// Depth-first walk feeding [`collect_templates`].
fn collect_into(value: &Value, location: &mut Vec<Location>, fields: &mut Vec<TemplateField>) {
    match value {
        Value::String(text) => {
            if let Some(template) = Template::parse(text) {
                fields.push(TemplateField {
                    location: location.clone(),
                    template,
                });
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                location.push(Location::Index(idx));
                collect_into(item, location, fields);
                location.pop();
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                location.push(Location::Key(key.clone()));
                collect_into(item, location, fields);
                location.pop();
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Renders `fields` against `scope` and writes the results into `target`.
pub fn apply_templates(target: &mut Value, fields: &[TemplateField], scope: &Value) {
    for field in fields {
        let rendered = field.template.render(scope, Unresolved::Keep);
        if let Some(slot) = locate_mut(target, &field.location) {
            *slot = Value::String(rendered);
        }
    }
}

/// Mutable access to the value at `location`.
fn locate_mut<'a>(value: &'a mut Value, location: &[Location]) -> Option<&'a mut Value> {
    location.iter().try_fold(value, |current, step| match (current, step) {
        (Value::Object(map), Location::Key(key)) => map.get_mut(key),
        (Value::Array(items), Location::Index(idx)) => items.get_mut(*idx),
        _ => None,
    })
}
