#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # cjunct loader
//!
//! Turns workflow source files into validated [`Workflow`] values. The
//! default format is YAML (see [`YamlWorkflowLoader`]); alternative
//! formats plug in through the [`WorkflowLoader`] trait.

pub mod yaml;

use std::path::Path;

use cjunct_error::{ClassifiedError, LoadError};
use cjunct_workflow::Workflow;

pub use yaml::YamlWorkflowLoader;

/// A workflow source parser.
pub trait WorkflowLoader {
    /// Load a workflow from a file.
    fn load(self: Box<Self>, path: &Path) -> Result<Workflow, ClassifiedError>;

    /// Load a workflow from already-read text (e.g. standard input).
    fn loads(self: Box<Self>, text: &str) -> Result<Workflow, ClassifiedError>;
}

/// File extensions served by the default loader.
pub const YAML_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Whether the default YAML loader covers the given path.
#[must_use]
pub fn is_default_loadable(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| YAML_EXTENSIONS.contains(&extension))
}

/// Reject paths the default loader does not understand.
pub fn check_loadable(path: &Path) -> Result<(), LoadError> {
    if is_default_loadable(path) {
        return Ok(());
    }
    Err(LoadError::new(format!(
        "No default loader for source file {} (recognized extensions: {})",
        path.display(),
        YAML_EXTENSIONS.join(", ")
    )))
}
