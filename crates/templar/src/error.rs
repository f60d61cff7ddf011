//! Render error types.

use thiserror::Error;

/// Hard ceiling for nested template evaluation (context → template → …).
pub const MAX_RECURSION_DEPTH: usize = 10;

/// A template evaluation failure.
///
/// Render errors fail only the action being rendered; independent actions
/// keep running.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An `@{` trigger without a matching closing brace.
    #[error("Unclosed expression at offset {0}")]
    UnclosedExpression(usize),
    /// The expression could not be parsed.
    #[error("Expression syntax error: {0}")]
    Syntax(String),
    /// The expression referenced an unknown top-level scope name.
    #[error("Unknown expression type: {0:?}")]
    UnknownScope(String),
    /// An `outcomes` or `status` lookup named an unknown action.
    #[error("Action not found: {0:?}")]
    ActionNotFound(String),
    /// Strict outcomes mode: the named key was never yielded.
    #[error("Action {action:?} outcome key {key:?} not found")]
    OutcomeKeyNotFound {
        /// Action whose outcomes were consulted.
        action: String,
        /// The missing outcome key.
        key: String,
    },
    /// A `context` lookup named an unknown key.
    #[error("Context key not found: {0:?}")]
    ContextKeyNotFound(String),
    /// Attribute or index access on a value that does not support it.
    #[error("Cannot access {key:?} on {kind} value")]
    BadAccess {
        /// The attribute or index being accessed.
        key: String,
        /// A short description of the receiver type.
        kind: &'static str,
    },
    /// A list index outside the bounds of the receiver.
    #[error("Index {0} out of range")]
    IndexOutOfRange(i64),
    /// An object template produced a value of the wrong shape.
    #[error("Object template produced an unexpected shape: {0}")]
    BadObjectShape(String),
    /// A call to a deny-listed builtin.
    #[error("Disabled builtin invoked: {0:?}")]
    DisabledBuiltin(String),
    /// A call to anything else; templates cannot invoke functions.
    #[error("Unknown function: {0:?}")]
    UnknownFunction(String),
    /// Nested evaluation exceeded [`MAX_RECURSION_DEPTH`].
    ///
    /// Self-referential context keys terminate here deterministically.
    #[error("Recursion depth exceeded: {depth}/{max}")]
    RecursionDepthExceeded {
        /// Depth reached when the guard fired.
        depth: usize,
        /// The configured ceiling.
        max: usize,
    },
}

impl RenderError {
    /// Returns `true` for the recursion-bound failure.
    #[must_use]
    pub fn is_recursion(&self) -> bool {
        matches!(self, Self::RecursionDepthExceeded { .. })
    }
}

/// Result alias for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
