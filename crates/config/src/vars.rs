//! Recognized environment variables and value parsing.

use thiserror::Error;

/// A defective environment variable value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The value does not parse as the expected type.
    #[error("Invalid value for {variable}: {value:?} (expected {expected})")]
    BadValue {
        /// Variable name.
        variable: &'static str,
        /// Offending raw value.
        value: String,
        /// Human description of the accepted values.
        expected: &'static str,
    },
    /// A dynamic-module variable is set, which this build cannot serve.
    #[error(
        "{variable} is set, but loading foreign code objects is not supported; \
         register custom loaders, displays, strategies, and action types \
         through the library API instead"
    )]
    UnsupportedDynamicModules {
        /// Variable name.
        variable: &'static str,
    },
}

/// Description of one recognized variable, for `info env-vars`.
#[derive(Debug, Clone, Copy)]
pub struct EnvVarSpec {
    /// Variable name.
    pub name: &'static str,
    /// One-line purpose.
    pub description: &'static str,
    /// Rendered default.
    pub default: &'static str,
}

/// Every variable the tool recognizes.
pub const RECOGNIZED_VARIABLES: &[EnvVarSpec] = &[
    EnvVarSpec {
        name: "CJUNCT_LOG_LEVEL",
        description: "Logging level (error, warn, info, debug, trace)",
        default: "error",
    },
    EnvVarSpec {
        name: "CJUNCT_LOG_FILE",
        description: "Write logs to this file instead of standard error",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_ENV_FILE",
        description: "Dotenv file to inject before configuration resolution",
        default: ".env",
    },
    EnvVarSpec {
        name: "CJUNCT_WORKFLOW_FILE",
        description: "Workflow source path, used when no positional argument is given",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_WORKFLOW_LOADER_SOURCE_FILE",
        description: "External loader definition (unsupported in this build)",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_DISPLAY_NAME",
        description: "Registered display to use",
        default: "prefix",
    },
    EnvVarSpec {
        name: "CJUNCT_DISPLAY_SOURCE_FILE",
        description: "External display definition (unsupported in this build)",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_STRATEGY_NAME",
        description: "Execution strategy (free, sequential, loose, strict, strict-sequential)",
        default: "loose",
    },
    EnvVarSpec {
        name: "CJUNCT_FORCE_COLOR",
        description: "Force ANSI colors on or off, overriding terminal detection",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_SHELL_INJECT_YIELD_FUNCTION",
        description: "Prepend the yield_outcome helper to shell commands",
        default: "true",
    },
    EnvVarSpec {
        name: "CJUNCT_EXTERNAL_MODULES_PATHS",
        description: "Extra module search paths (unsupported in this build)",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_ACTIONS_CLASS_DEFINITIONS_DIRECTORY",
        description: "Directories with action type definitions (unsupported in this build)",
        default: "",
    },
    EnvVarSpec {
        name: "CJUNCT_STRICT_OUTCOMES_RENDERING",
        description: "Make reads of missing outcome keys a render error",
        default: "false",
    },
];

/// Parse a boolean-ish value.
pub fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(ConfigError::BadValue {
            variable,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

/// Split a comma-separated list, dropping empty segments.
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
