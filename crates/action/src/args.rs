//! Typed extraction of handler args from workflow mappings.
//!
//! Each handler declares its schema as a sequence of typed `take_*`
//! calls against an [`ArgsReader`], finishing with [`ArgsReader::finish`]
//! which rejects unrecognized keys. String-typed fields are explicitly
//! read as either *templates* (late-rendered) or plain strings.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

use cjunct_templar::{ObjectTemplate, StringTemplate};

/// A defect in the args mapping, relative to the handler schema.
///
/// The loader prefixes these with the owning action name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    /// A required key is absent.
    #[error("Missing key: {0:?}")]
    Missing(String),
    /// Keys the schema does not know.
    #[error("Unrecognized keys: {0:?}")]
    Unexpected(Vec<String>),
    /// A key holds a value of the wrong shape.
    #[error("Unrecognized {field:?} content type (expected {expected})")]
    WrongType {
        /// Path of the offending field.
        field: String,
        /// Human description of the accepted shape.
        expected: &'static str,
    },
    /// A schema-level constraint violation (e.g. mutually exclusive keys).
    #[error("{0}")]
    Invalid(String),
}

/// Reader over the non-reserved keys of an action mapping.
#[derive(Debug, Default)]
pub struct ArgsReader {
    entries: IndexMap<String, Value>,
}

impl ArgsReader {
    /// Wrap the remaining (handler-specific) keys of an action mapping.
    pub fn new(entries: IndexMap<String, Value>) -> Self {
        Self { entries }
    }

    fn take(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// A required template-typed string field.
    pub fn take_template(&mut self, key: &str) -> Result<StringTemplate, ArgsError> {
        self.take_optional_template(key)?
            .ok_or_else(|| ArgsError::Missing(key.to_string()))
    }

    /// An optional template-typed string field.
    pub fn take_optional_template(
        &mut self,
        key: &str,
    ) -> Result<Option<StringTemplate>, ArgsError> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(StringTemplate::new(text))),
            Some(_) => Err(ArgsError::WrongType {
                field: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// An optional plain (never rendered) string field.
    pub fn take_optional_string(&mut self, key: &str) -> Result<Option<String>, ArgsError> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(_) => Err(ArgsError::WrongType {
                field: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// A required non-negative number field.
    pub fn take_number(&mut self, key: &str) -> Result<f64, ArgsError> {
        match self.take(key) {
            Some(Value::Number(number)) => number.as_f64().ok_or(ArgsError::WrongType {
                field: key.to_string(),
                expected: "a number",
            }),
            None | Some(Value::Null) => Err(ArgsError::Missing(key.to_string())),
            Some(_) => Err(ArgsError::WrongType {
                field: key.to_string(),
                expected: "a number",
            }),
        }
    }

    /// An optional object-or-template union field: either a structured
    /// value decoded to `T`, or an `!@` object-template expression
    /// resolved at render time.
    pub fn take_optional_object<T: DeserializeOwned>(
        &mut self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<ObjectTemplate<T>>, ArgsError> {
        match self.take(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Tagged(tagged)) if tagged.tag == "!@" => match &tagged.value {
                Value::String(expression) => {
                    Ok(Some(ObjectTemplate::Expression(expression.clone())))
                }
                _ => Err(ArgsError::WrongType {
                    field: key.to_string(),
                    expected: "an expression string under the !@ tag",
                }),
            },
            Some(value) => {
                let decoded: T = serde_yaml::from_value(value).map_err(|_| {
                    ArgsError::WrongType {
                        field: key.to_string(),
                        expected,
                    }
                })?;
                Ok(Some(ObjectTemplate::Object(decoded)))
            }
        }
    }

    /// Reject whatever keys were never taken.
    pub fn finish(self) -> Result<(), ArgsError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let mut keys: Vec<String> = self.entries.into_keys().collect();
        keys.sort();
        Err(ArgsError::Unexpected(keys))
    }
}
