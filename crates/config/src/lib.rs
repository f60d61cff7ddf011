#![warn(missing_docs)]

//! # cjunct config
//!
//! The explicit configuration value threaded into the runner: no global
//! mutable state. Sources, in precedence order: CLI arguments (applied
//! by the CLI layer), `CJUNCT_*` environment variables, defaults.

pub mod dotenv;
pub mod vars;

use std::path::PathBuf;

use cjunct_error::{ClassifiedError, LoadError};

pub use dotenv::load_dotenv;
pub use vars::{ConfigError, EnvVarSpec, RECOGNIZED_VARIABLES, parse_bool, parse_list};

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging level name.
    pub log_level: Option<String>,
    /// Log sink file.
    pub log_file: Option<PathBuf>,
    /// Explicit dotenv location.
    pub env_file: Option<PathBuf>,
    /// Workflow source, used when no positional argument is given.
    pub workflow_file: Option<PathBuf>,
    /// External loader definition (recognized; unsupported).
    pub workflow_loader_source_file: Option<PathBuf>,
    /// Registered display to use.
    pub display_name: Option<String>,
    /// External display definition (recognized; unsupported).
    pub display_source_file: Option<PathBuf>,
    /// Execution strategy name.
    pub strategy_name: Option<String>,
    /// Tri-state ANSI color override.
    pub force_color: Option<bool>,
    /// Prepend the `yield_outcome` helper to shell commands.
    pub shell_inject_yield_function: bool,
    /// Extra module search paths (recognized; unsupported).
    pub external_modules_paths: Vec<PathBuf>,
    /// Action type definition directories (recognized; unsupported).
    pub actions_class_definitions_directories: Vec<PathBuf>,
    /// Make reads of missing outcome keys a render error.
    pub strict_outcomes_rendering: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            log_file: None,
            env_file: None,
            workflow_file: None,
            workflow_loader_source_file: None,
            display_name: None,
            display_source_file: None,
            strategy_name: None,
            force_color: None,
            shell_inject_yield_function: true,
            external_modules_paths: Vec::new(),
            actions_class_definitions_directories: Vec::new(),
            strict_outcomes_rendering: false,
        }
    }
}

impl Config {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (injectable for tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let get_path = |name: &str| get(name).map(PathBuf::from);

        Ok(Self {
            log_level: get("CJUNCT_LOG_LEVEL"),
            log_file: get_path("CJUNCT_LOG_FILE"),
            env_file: get_path("CJUNCT_ENV_FILE"),
            workflow_file: get_path("CJUNCT_WORKFLOW_FILE"),
            workflow_loader_source_file: get_path("CJUNCT_WORKFLOW_LOADER_SOURCE_FILE"),
            display_name: get("CJUNCT_DISPLAY_NAME"),
            display_source_file: get_path("CJUNCT_DISPLAY_SOURCE_FILE"),
            strategy_name: get("CJUNCT_STRATEGY_NAME"),
            force_color: get("CJUNCT_FORCE_COLOR")
                .map(|value| parse_bool("CJUNCT_FORCE_COLOR", &value))
                .transpose()?,
            shell_inject_yield_function: get("CJUNCT_SHELL_INJECT_YIELD_FUNCTION")
                .map(|value| parse_bool("CJUNCT_SHELL_INJECT_YIELD_FUNCTION", &value))
                .transpose()?
                .unwrap_or(true),
            external_modules_paths: get("CJUNCT_EXTERNAL_MODULES_PATHS")
                .map(|value| parse_list(&value).into_iter().map(PathBuf::from).collect())
                .unwrap_or_default(),
            actions_class_definitions_directories: get(
                "CJUNCT_ACTIONS_CLASS_DEFINITIONS_DIRECTORY",
            )
            .map(|value| parse_list(&value).into_iter().map(PathBuf::from).collect())
            .unwrap_or_default(),
            strict_outcomes_rendering: get("CJUNCT_STRICT_OUTCOMES_RENDERING")
                .map(|value| parse_bool("CJUNCT_STRICT_OUTCOMES_RENDERING", &value))
                .transpose()?
                .unwrap_or(false),
        })
    }

    /// Reject configurations that point at foreign code objects, which
    /// this build cannot load. Extensions register through the library
    /// API instead.
    pub fn ensure_static_extensions(&self) -> Result<(), ConfigError> {
        if self.workflow_loader_source_file.is_some() {
            return Err(ConfigError::UnsupportedDynamicModules {
                variable: "CJUNCT_WORKFLOW_LOADER_SOURCE_FILE",
            });
        }
        if self.display_source_file.is_some() {
            return Err(ConfigError::UnsupportedDynamicModules {
                variable: "CJUNCT_DISPLAY_SOURCE_FILE",
            });
        }
        if !self.external_modules_paths.is_empty() {
            return Err(ConfigError::UnsupportedDynamicModules {
                variable: "CJUNCT_EXTERNAL_MODULES_PATHS",
            });
        }
        if !self.actions_class_definitions_directories.is_empty() {
            return Err(ConfigError::UnsupportedDynamicModules {
                variable: "CJUNCT_ACTIONS_CLASS_DEFINITIONS_DIRECTORY",
            });
        }
        Ok(())
    }
}

impl From<ConfigError> for ClassifiedError {
    fn from(error: ConfigError) -> Self {
        match error {
            unsupported @ ConfigError::UnsupportedDynamicModules { .. } => {
                Self::Load(LoadError::new(unsupported.to_string()))
            }
            bad_value @ ConfigError::BadValue { .. } => Self::Other(bad_value.to_string()),
        }
    }
}
