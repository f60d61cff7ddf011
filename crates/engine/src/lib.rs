#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # cjunct engine
//!
//! The execution engine: strategies that emit actions as their
//! preconditions are met, the [`Runner`] driver loop that binds
//! scheduling, rendering, the action runtime, and a [`Display`] sink.

pub mod display;
pub mod runner;
pub mod strategy;

pub use display::{Display, DisplayError, DisplayRegistry, DisplayResult, PrefixDisplay, SilentDisplay};
pub use runner::{AUTODETECT_FILE_NAMES, LoaderFactory, Runner, WorkflowSource, source_from_arg};
pub use strategy::{DEFAULT_STRATEGY, KNOWN_STRATEGIES, Strategy, strategy_by_name};
