//! Workflow context values.
//!
//! Context entries are arbitrary nested structures. String leaves that
//! contain `@{` are *deferred*: reading them through the renderer
//! triggers evaluation, while direct access returns the raw string.
//! Subtrees tagged as object templates evaluate to a fresh value each
//! time they are read.

use indexmap::IndexMap;
use serde_json::Value;

/// Ordered mapping of context keys to values.
pub type ContextStore = IndexMap<String, ContextValue>;

/// A single context node.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    /// A plain scalar (string without templates, number, bool, null).
    Literal(Value),
    /// A string leaf containing `@{`, rendered lazily.
    Template(String),
    /// An object template (`!@ <expression>`), evaluated lazily and may
    /// produce a value of any shape.
    Expression(String),
    /// A nested mapping.
    Map(IndexMap<String, ContextValue>),
    /// A nested sequence.
    List(Vec<ContextValue>),
}

impl ContextValue {
    /// Wrap a string, marking it deferred when it contains a template
    /// trigger.
    pub fn from_string(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.contains("@{") {
            Self::Template(s)
        } else {
            Self::Literal(Value::String(s))
        }
    }

    /// The raw string behind this node, when it is string-shaped.
    ///
    /// Deferred templates and object expressions return their unrendered
    /// source text.
    #[must_use]
    pub fn raw_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Value::String(s)) => Some(s),
            Self::Template(s) | Self::Expression(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` when reading this node through the renderer would
    /// trigger evaluation.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        match self {
            Self::Template(_) | Self::Expression(_) => true,
            Self::Map(entries) => entries.values().any(Self::is_deferred),
            Self::List(items) => items.iter().any(Self::is_deferred),
            Self::Literal(_) => false,
        }
    }
}

impl From<Value> for ContextValue {
    /// Convert a plain JSON value, marking deferred string leaves.
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::from_string(s),
            Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            other => Self::Literal(other),
        }
    }
}
