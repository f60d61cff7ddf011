#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # cjunct action
//!
//! Concrete action types for the cjunct task runner:
//!
//! - [`ArgsReader`]: typed, path-precise decoding of handler args
//! - [`HandlerRegistry`]: dispatch from `type` strings to constructors
//! - [`EmissionScanner`]: the stdout outcome-sentinel protocol
//! - bundled handlers: `echo`, `sleep`, `shell`

pub mod args;
pub mod handlers;
pub mod registry;
pub mod scanner;

pub use args::{ArgsError, ArgsReader};
pub use registry::{HandlerBuildError, HandlerFactory, HandlerRegistry, HandlerSettings};
pub use scanner::{EmissionScanner, YIELD_FUNCTION_DEFINITION};
