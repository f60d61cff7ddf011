#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # cjunct templar
//!
//! Late-bound `@{ ... }` templating for workflow actions:
//!
//! - [`lexer`]: splits template strings into text and expressions,
//!   honoring `@@` escaping
//! - [`expr`]: the closed expression grammar (names, attributes,
//!   indexing; calls are parsed only to be rejected)
//! - [`Templar`]: the renderer, bound to a [`RenderScope`] view of
//!   outcomes, statuses, context, and environment
//! - [`ContextValue`]: lazy workflow context nodes (deferred strings,
//!   object templates)
//! - [`StringTemplate`] / [`ObjectTemplate`]: argument field types for
//!   handlers

pub mod context;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod template;
mod templar;

pub use context::{ContextStore, ContextValue};
pub use error::{MAX_RECURSION_DEPTH, RenderError, RenderResult};
pub use template::{ObjectTemplate, StringTemplate};
pub use templar::{RenderOptions, RenderScope, Renderer, Templar};
