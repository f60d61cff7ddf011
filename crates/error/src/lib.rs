#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Classified errors for the cjunct task runner.
//!
//! Every failure that may abort the process is funneled into
//! [`ClassifiedError`], which carries the exit code the CLI reports.
//! Per-action failures (render errors, handler failures) never reach this
//! level; they mark the affected action and surface through the display.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for a successful run.
pub const EXIT_OK: i32 = 0;
/// Exit code for an unhandled (unclassified) panic or bug.
pub const EXIT_UNHANDLED: i32 = 2;

/// A syntactic or semantic defect in the workflow source.
///
/// Carries the stack of files being loaded at the moment of failure so
/// that errors inside `!import`ed files point at the whole chain.
#[derive(Debug, Error)]
pub struct LoadError {
    /// Human-readable description of the defect.
    pub message: String,
    /// Files being processed when the error was raised, outermost first.
    pub stack: Vec<String>,
}

impl LoadError {
    /// Create a load error with an empty file stack.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Create a load error with the given file stack.
    pub fn with_stack(message: impl Into<String>, stack: Vec<String>) -> Self {
        Self {
            message: message.into(),
            stack,
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.stack.is_empty() {
            write!(f, "\nCurrent stack: {}", self.stack.join(" -> "))?;
        }
        Ok(())
    }
}

/// A graph-level violation detected while building the workflow.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct IntegrityError(pub String);

/// The workflow source could not be resolved.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No candidate source file was found.
    #[error("No workflow source detected in {0}")]
    NotFound(PathBuf),
    /// More than one candidate source file matched.
    #[error("Multiple workflow sources detected in {0}: {1:?}")]
    Ambiguous(PathBuf, Vec<String>),
    /// The source exists but could not be read.
    #[error("Unreadable workflow source {path}: {reason}")]
    Unreadable {
        /// Path of the offending source.
        path: PathBuf,
        /// Underlying I/O failure.
        reason: String,
    },
}

/// Interactive mode was requested but cannot be served.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InteractionError(pub String);

/// One or more actions ended in FAILURE.
#[derive(Debug, Error)]
#[error("Execution failed: {0:?}")]
pub struct ExecutionFailed(pub Vec<String>);

/// Top-level classified error with a defined process exit code.
#[derive(Debug, Error)]
pub enum ClassifiedError {
    /// One or more actions ended in FAILURE.
    #[error(transparent)]
    ExecutionFailed(#[from] ExecutionFailed),
    /// Workflow source defect.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Workflow graph violation.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// Workflow source resolution failure.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Interactive mode unavailable.
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    /// Any other classified failure.
    #[error("{0}")]
    Other(String),
}

impl ClassifiedError {
    /// The process exit code reported for this error class.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExecutionFailed(_) => 1,
            Self::Other(_) => 101,
            Self::Load(_) => 102,
            Self::Integrity(_) => 103,
            Self::Source(_) => 104,
            Self::Interaction(_) => 105,
        }
    }
}

/// Convenience result alias for fallible workflow-level operations.
pub type ClassifiedResult<T> = Result<T, ClassifiedError>;
