//! Template-bearing argument field types.
//!
//! Action args distinguish *template* strings (rendered just before the
//! action starts) from plain strings (taken verbatim). Fields that accept
//! either a structured value or a template use [`ObjectTemplate`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RenderError, RenderResult};
use crate::templar::Renderer;

/// A string argument subject to late rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTemplate(pub String);

impl StringTemplate {
    /// Wrap raw source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// The current (possibly unrendered) text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the template and keep the result in place.
    pub fn render_in_place(&mut self, renderer: &dyn Renderer) -> RenderResult<()> {
        self.0 = renderer.render_str(&self.0)?;
        Ok(())
    }
}

impl From<String> for StringTemplate {
    fn from(source: String) -> Self {
        Self(source)
    }
}

impl From<&str> for StringTemplate {
    fn from(source: &str) -> Self {
        Self(source.to_string())
    }
}

impl std::fmt::Display for StringTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An argument field declared as "structured value or template".
///
/// Resolution tries the structured side first: a decoded value is
/// returned as-is and an object-template expression is evaluated and
/// decoded into `T`. When the expression produces a string, that string
/// falls back through the string-template pipeline before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectTemplate<T> {
    /// A structured value decoded directly from the workflow source.
    Object(T),
    /// An `!@` expression producing the value at render time.
    Expression(String),
}

impl<T: DeserializeOwned + Clone> ObjectTemplate<T> {
    /// Produce the final value using the given renderer.
    pub fn resolve(&self, renderer: &dyn Renderer) -> RenderResult<T> {
        match self {
            Self::Object(value) => Ok(value.clone()),
            Self::Expression(expression) => {
                let mut value = renderer.evaluate(expression)?;
                if let Value::String(text) = &value {
                    value = Value::String(renderer.render_str(text)?);
                }
                serde_json::from_value(value)
                    .map_err(|e| RenderError::BadObjectShape(e.to_string()))
            }
        }
    }
}
