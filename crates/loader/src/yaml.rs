//! The default YAML workflow loader.
//!
//! Recognized root keys: `actions`, `context`, `miscellaneous`. Action
//! list items are mappings or `!import <path>` splices; context is a
//! mapping or a list of mappings/imports, shallow-merged with later keys
//! overriding earlier ones. `!@ <expression>` tags mark object
//! templates.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::debug;

use cjunct_action::{ArgsReader, HandlerBuildError, HandlerRegistry};
use cjunct_error::{ClassifiedError, LoadError};
use cjunct_templar::{ContextStore, ContextValue};
use cjunct_workflow::{Action, Dependency, Severity, Workflow};

use crate::WorkflowLoader;

const ALLOWED_ROOT_KEYS: &[&str] = &["actions", "context", "miscellaneous"];
const RESERVED_ACTION_KEYS: &[&str] = &[
    "name",
    "type",
    "description",
    "expects",
    "selectable",
    "severity",
];

/// Stateful one-shot YAML loader.
pub struct YamlWorkflowLoader {
    registry: Arc<HandlerRegistry>,
    actions: IndexMap<String, Action>,
    context: ContextStore,
    raw_stack: Vec<String>,
    resolved_stack: Vec<PathBuf>,
}

impl YamlWorkflowLoader {
    /// Create a loader resolving action types against the registry.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            actions: IndexMap::new(),
            context: ContextStore::new(),
            raw_stack: Vec::new(),
            resolved_stack: Vec::new(),
        }
    }

    fn throw<T>(&self, message: impl Into<String>) -> Result<T, LoadError> {
        Err(LoadError::with_stack(message, self.raw_stack.clone()))
    }

    fn context_dir(&self) -> PathBuf {
        self.resolved_stack
            .last()
            .and_then(|path| path.parent())
            .map_or_else(PathBuf::new, Path::to_path_buf)
    }

    fn load_file(&mut self, source: &Path, allowed: &[&str]) -> Result<(), LoadError> {
        let mut resolved = source.to_path_buf();
        if !resolved.is_absolute() {
            resolved = self.context_dir().join(resolved);
        }
        let resolved = resolved.canonicalize().unwrap_or(resolved);
        if self.resolved_stack.contains(&resolved) {
            return self.throw("Cyclic load");
        }
        self.raw_stack.push(source.display().to_string());
        self.resolved_stack.push(resolved.clone());
        debug!(file = %resolved.display(), "loading workflow file");
        let outcome = (|| {
            let text = std::fs::read_to_string(&resolved).map_err(|_| {
                LoadError::with_stack(
                    format!("Workflow file not found: {}", resolved.display()),
                    self.raw_stack.clone(),
                )
            })?;
            self.load_text(&text, allowed)
        })();
        self.raw_stack.pop();
        self.resolved_stack.pop();
        outcome
    }

    fn load_text(&mut self, text: &str, allowed: &[&str]) -> Result<(), LoadError> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| LoadError::with_stack(format!("YAML parse error: {e}"), self.raw_stack.clone()))?;
        let Value::Mapping(root) = root else {
            return self.throw(format!(
                "Unknown workflow structure: {} (should be a mapping)",
                value_kind(&root)
            ));
        };
        if root.is_empty() {
            return self.throw(format!(
                "Empty root dictionary (expected some of: {})",
                ALLOWED_ROOT_KEYS.join(", ")
            ));
        }

        let mut entries: IndexMap<String, Value> = IndexMap::new();
        for (key, value) in root {
            let Value::String(key) = key else {
                return self.throw(format!("Non-string root key: {}", value_kind(&key)));
            };
            entries.insert(key, value);
        }
        let mut unrecognized: Vec<&String> = entries
            .keys()
            .filter(|key| !ALLOWED_ROOT_KEYS.contains(&key.as_str()))
            .collect();
        if !unrecognized.is_empty() {
            unrecognized.sort();
            return self.throw(format!(
                "Unrecognized root keys: {unrecognized:?} (expected some of: {})",
                ALLOWED_ROOT_KEYS.join(", ")
            ));
        }

        for (key, value) in entries {
            if !allowed.contains(&key.as_str()) {
                continue;
            }
            match key.as_str() {
                "actions" => self.load_actions(value)?,
                "context" => self.load_context(value)?,
                // Free-form metadata block, accepted and skipped.
                "miscellaneous" => {}
                _ => {}
            }
        }
        Ok(())
    }

    fn load_actions(&mut self, value: Value) -> Result<(), LoadError> {
        let Value::Sequence(items) = value else {
            return self.throw(format!(
                "'actions' contents should be a list (got {})",
                value_kind(&value)
            ));
        };
        for item in items {
            match item {
                Value::Mapping(mapping) => {
                    let action = self.build_action(mapping)?;
                    self.register_action(action)?;
                }
                Value::Tagged(tagged) if tagged.tag == "!import" => {
                    let path = self.import_path(&tagged.value)?;
                    self.load_file(&path, &["actions"])?;
                }
                other => {
                    return self.throw(format!(
                        "Unrecognized action node type: {} (expected a mapping or !import)",
                        value_kind(&other)
                    ));
                }
            }
        }
        Ok(())
    }

    fn load_context(&mut self, value: Value) -> Result<(), LoadError> {
        match value {
            Value::Mapping(mapping) => self.merge_context(mapping),
            Value::Sequence(items) => {
                for (position, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Mapping(mapping) => self.merge_context(mapping)?,
                        Value::Tagged(tagged) if tagged.tag == "!import" => {
                            let path = self.import_path(&tagged.value)?;
                            self.load_file(&path, &["context"])?;
                        }
                        other => {
                            return self.throw(format!(
                                "Context item #{} is not a mapping nor an '!import' (got {})",
                                position + 1,
                                value_kind(&other)
                            ));
                        }
                    }
                }
                Ok(())
            }
            other => self.throw(format!(
                "'context' contents should be a mapping or a list (got {})",
                value_kind(&other)
            )),
        }
    }

    /// Shallow merge: later top-level keys override earlier ones.
    fn merge_context(&mut self, mapping: serde_yaml::Mapping) -> Result<(), LoadError> {
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return self.throw(format!(
                    "Context keys should be strings (got {})",
                    value_kind(&key)
                ));
            };
            let converted = self.to_context_value(value)?;
            if self.context.insert(key.clone(), converted).is_some() {
                debug!(key, "context key redefined");
            }
        }
        Ok(())
    }

    fn to_context_value(&self, value: Value) -> Result<ContextValue, LoadError> {
        Ok(match value {
            Value::Tagged(tagged) if tagged.tag == "!@" => match &tagged.value {
                Value::String(expression) => ContextValue::Expression(expression.clone()),
                other => {
                    return self.throw(format!(
                        "'!@' object template expects an expression string (got {})",
                        value_kind(other)
                    ));
                }
            },
            Value::Tagged(tagged) => {
                return self.throw(format!("Unrecognized YAML tag: {}", tagged.tag));
            }
            Value::String(text) => ContextValue::from_string(text),
            Value::Mapping(mapping) => {
                let mut entries = IndexMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    let Value::String(key) = key else {
                        return self.throw(format!(
                            "Context keys should be strings (got {})",
                            value_kind(&key)
                        ));
                    };
                    entries.insert(key, self.to_context_value(value)?);
                }
                ContextValue::Map(entries)
            }
            Value::Sequence(items) => ContextValue::List(
                items
                    .into_iter()
                    .map(|item| self.to_context_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            scalar => ContextValue::Literal(scalar_to_json(&scalar)),
        })
    }

    fn import_path(&self, value: &Value) -> Result<PathBuf, LoadError> {
        let Value::String(path) = value else {
            return self.throw(format!(
                "Unrecognized '!import' contents type: {} (expected a string)",
                value_kind(value)
            ));
        };
        if path.is_empty() {
            return self.throw("Empty import");
        }
        Ok(PathBuf::from(path))
    }

    fn register_action(&mut self, action: Action) -> Result<(), LoadError> {
        if self.actions.contains_key(&action.name) {
            return self.throw(format!("Action declared twice: {:?}", action.name));
        }
        self.actions.insert(action.name.clone(), action);
        Ok(())
    }

    fn build_action(&self, mapping: serde_yaml::Mapping) -> Result<Action, LoadError> {
        let mut entries: IndexMap<String, Value> = IndexMap::new();
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return self.throw(format!(
                    "Action keys should be strings (got {})",
                    value_kind(&key)
                ));
            };
            entries.insert(key, value);
        }

        // Name
        let Some(name_value) = entries.shift_remove("name") else {
            return self.throw("Missing action node required key: 'name'");
        };
        let Value::String(name) = name_value else {
            return self.throw(format!(
                "Unexpected name type: {} (should be a string)",
                value_kind(&name_value)
            ));
        };
        if name.is_empty() {
            return self.throw("Action node name is empty");
        }

        // Type
        let Some(type_value) = entries.shift_remove("type") else {
            return self.throw(format!("'type' not specified for action {name:?}"));
        };
        let Value::String(action_type) = type_value else {
            return self.throw(format!(
                "Unexpected type type: {} (should be a string)",
                value_kind(&type_value)
            ));
        };

        // Description
        let description = match entries.shift_remove("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => {
                return self.throw(format!(
                    "Unrecognized 'description' content type: {} (expected optional string)",
                    value_kind(&other)
                ));
            }
        };

        // Dependencies
        let ancestors = match entries.shift_remove("expects") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::String(dependency)) => {
                IndexMap::from_iter([self.build_dependency(&Value::String(dependency))?])
            }
            Some(Value::Sequence(items)) => {
                let mut dependencies = IndexMap::new();
                for item in &items {
                    let (dependency_name, dependency) = self.build_dependency(item)?;
                    dependencies.insert(dependency_name, dependency);
                }
                dependencies
            }
            Some(other) => {
                return self.throw(format!(
                    "Unrecognized 'expects' content type: {} (expected a string or list)",
                    value_kind(&other)
                ));
            }
        };

        // Selectable
        let selectable = match entries.shift_remove("selectable") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return self.throw(format!(
                    "Unrecognized 'selectable' content type: {} (expected a bool)",
                    value_kind(&other)
                ));
            }
        };

        // Severity
        let severity = match entries.shift_remove("severity") {
            None | Some(Value::Null) => Severity::Normal,
            Some(Value::String(text)) => match Severity::from_str(&text) {
                Ok(severity) => severity,
                Err(message) => return self.throw(format!("Action {name:?}: {message}")),
            },
            Some(other) => {
                return self.throw(format!(
                    "Unrecognized 'severity' content type: {} (expected a string)",
                    value_kind(&other)
                ));
            }
        };

        // Everything else feeds the handler's args schema.
        debug_assert!(RESERVED_ACTION_KEYS.iter().all(|key| !entries.contains_key(*key)));
        let handler = match self.registry.build(&action_type, ArgsReader::new(entries)) {
            Ok(handler) => handler,
            Err(HandlerBuildError::UnknownType(type_name)) => {
                return self.throw(format!("Unknown dispatched type: {type_name}"));
            }
            Err(HandlerBuildError::Args(args_error)) => {
                return self.throw(format!("Action {name:?}: {args_error}"));
            }
        };

        let mut action = Action::new(name, action_type, handler);
        action.description = description;
        action.ancestors = ancestors;
        action.selectable = selectable;
        action.severity = severity;
        Ok(action)
    }

    fn build_dependency(&self, node: &Value) -> Result<(String, Dependency), LoadError> {
        match node {
            Value::String(name) => {
                if name.is_empty() {
                    return self.throw("Empty dependency name met");
                }
                Ok((name.clone(), Dependency::default()))
            }
            Value::Mapping(mapping) => {
                let mut name: Option<String> = None;
                let mut dependency = Dependency::default();
                for (key, value) in mapping {
                    let Value::String(key) = key else {
                        return self.throw(format!(
                            "Unrecognized dependency node key type: {}",
                            value_kind(key)
                        ));
                    };
                    match (key.as_str(), value) {
                        ("name", Value::String(text)) => name = Some(text.clone()),
                        ("name", other) => {
                            return self.throw(format!(
                                "Unrecognized dependency name type: {} (expected a string)",
                                value_kind(other)
                            ));
                        }
                        ("strict", Value::Bool(flag)) => dependency.strict = *flag,
                        ("strict", other) => {
                            return self.throw(format!(
                                "Unrecognized 'strict' attribute type: {} (expected boolean)",
                                value_kind(other)
                            ));
                        }
                        ("external", Value::Bool(flag)) => dependency.external = *flag,
                        ("external", other) => {
                            return self.throw(format!(
                                "Unrecognized 'external' attribute type: {} (expected boolean)",
                                value_kind(other)
                            ));
                        }
                        (unexpected, _) => {
                            return self.throw(format!(
                                "Unrecognized dependency node keys: [{unexpected:?}]"
                            ));
                        }
                    }
                }
                let Some(name) = name else {
                    return self.throw("Name not specified for the dependency");
                };
                if name.is_empty() {
                    return self.throw("Empty dependency name met");
                }
                Ok((name, dependency))
            }
            other => self.throw(format!(
                "Unrecognized dependency node structure: {} (expected a string or a mapping)",
                value_kind(other)
            )),
        }
    }

    fn into_workflow(self) -> Result<Workflow, ClassifiedError> {
        let workflow = Workflow::new(self.actions, self.context)?;
        Ok(workflow)
    }
}

impl WorkflowLoader for YamlWorkflowLoader {
    fn load(mut self: Box<Self>, path: &Path) -> Result<Workflow, ClassifiedError> {
        self.load_file(path, &["actions", "context"])?;
        self.into_workflow()
    }

    fn loads(mut self: Box<Self>, text: &str) -> Result<Workflow, ClassifiedError> {
        self.load_text(text, &["actions", "context"])?;
        self.into_workflow()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged node",
    }
}

fn scalar_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(flag) => serde_json::Value::Bool(*flag),
        Value::Number(number) => number
            .as_i64()
            .map(serde_json::Value::from)
            .or_else(|| number.as_u64().map(serde_json::Value::from))
            .or_else(|| number.as_f64().map(serde_json::Value::from))
            .unwrap_or(serde_json::Value::Null),
        Value::String(text) => serde_json::Value::String(text.clone()),
        // Composites are handled structurally before this point.
        _ => serde_json::Value::Null,
    }
}
