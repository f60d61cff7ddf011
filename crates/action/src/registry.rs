//! Type-erased registry of handler constructors keyed by action type.
//!
//! The loader resolves each action's `type` key through this registry.
//! Embedding code registers custom types through [`HandlerRegistry::register`];
//! the bundled set covers `echo`, `sleep`, and `shell`.

use indexmap::IndexMap;
use thiserror::Error;

use cjunct_workflow::ActionHandler;

use crate::args::{ArgsError, ArgsReader};
use crate::handlers::{EchoHandler, ShellHandler, SleepHandler};

/// Settings threaded into bundled handler constructors.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSettings {
    /// Prepend the `yield_outcome` function definition to shell commands.
    pub shell_inject_yield_function: bool,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            shell_inject_yield_function: true,
        }
    }
}

/// Why a handler could not be built for an action.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// The `type` key named no registered handler.
    #[error("Unknown dispatched type: {0}")]
    UnknownType(String),
    /// The handler rejected its args.
    #[error(transparent)]
    Args(#[from] ArgsError),
}

/// Constructor turning an args mapping into a ready handler.
pub type HandlerFactory =
    Box<dyn Fn(ArgsReader) -> Result<Box<dyn ActionHandler>, ArgsError> + Send + Sync>;

/// Registry of handler constructors keyed by the `type` dispatch string.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: IndexMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the bundled handlers.
    pub fn bundled(settings: HandlerSettings) -> Self {
        let mut registry = Self::new();
        registry.register("echo", |args| {
            Ok(Box::new(EchoHandler::from_args(args)?) as Box<dyn ActionHandler>)
        });
        registry.register("sleep", |args| {
            Ok(Box::new(SleepHandler::from_args(args)?) as Box<dyn ActionHandler>)
        });
        registry.register("shell", move |args| {
            Ok(Box::new(ShellHandler::from_args(
                args,
                settings.shell_inject_yield_function,
            )?) as Box<dyn ActionHandler>)
        });
        registry
    }

    /// Register (or override) a handler constructor for a type key.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(ArgsReader) -> Result<Box<dyn ActionHandler>, ArgsError> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Box::new(factory));
    }

    /// Returns `true` when the type key is known.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type keys, in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a handler for the given type from an args mapping.
    pub fn build(
        &self,
        type_name: &str,
        args: ArgsReader,
    ) -> Result<Box<dyn ActionHandler>, HandlerBuildError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| HandlerBuildError::UnknownType(type_name.to_string()))?;
        Ok(factory(args)?)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
