//! The expression renderer.
//!
//! A [`Templar`] binds a [`RenderScope`] (outcomes, statuses, context,
//! environment) and substitutes every `@{ ... }` occurrence in a string
//! with the string form of the evaluated expression.

use std::cell::Cell;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::context::{ContextStore, ContextValue};
use crate::error::{MAX_RECURSION_DEPTH, RenderError, RenderResult};
use crate::expr::{DISABLED_BUILTINS, Expr, parse};
use crate::lexer::{Lexeme, lex};

/// The live view a renderer evaluates against.
///
/// The engine implements this over its runner state; tests implement it
/// over plain maps.
pub trait RenderScope {
    /// Final outcomes of the named action, or `None` for unknown actions.
    fn action_outcomes(&self, action: &str) -> Option<IndexMap<String, String>>;

    /// Status string of the named action, or `None` for unknown actions.
    fn action_status(&self, action: &str) -> Option<String>;

    /// The workflow context.
    fn context(&self) -> &ContextStore;

    /// Process environment lookup. Missing variables render empty.
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Rendering knobs threaded in from the configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// When set, reading a missing outcome key is a render error instead
    /// of an empty string.
    pub strict_outcomes: bool,
    /// Ceiling for nested evaluation of deferred context values.
    pub max_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strict_outcomes: false,
            max_depth: MAX_RECURSION_DEPTH,
        }
    }
}

/// Object-safe rendering interface handed to action args.
pub trait Renderer {
    /// Substitute every `@{ ... }` occurrence in `template`.
    fn render_str(&self, template: &str) -> RenderResult<String>;

    /// Evaluate a bare expression (the inside of `@{ ... }`) to a value.
    fn evaluate(&self, expression: &str) -> RenderResult<Value>;
}

/// Expression renderer over a scope.
pub struct Templar<'a, S: RenderScope> {
    scope: &'a S,
    options: RenderOptions,
    depth: Cell<usize>,
}

/// Intermediate evaluation states: scope roots are not values until they
/// are narrowed by attribute/index access.
enum Evaluated {
    Json(Value),
    OutcomesRoot,
    ActionOutcomes(String, IndexMap<String, String>),
    StatusRoot,
    ContextRoot,
    EnvRoot,
}

impl Evaluated {
    fn kind(&self) -> &'static str {
        match self {
            Self::Json(Value::Null) => "null",
            Self::Json(Value::Bool(_)) => "boolean",
            Self::Json(Value::Number(_)) => "number",
            Self::Json(Value::String(_)) => "string",
            Self::Json(Value::Array(_)) => "list",
            Self::Json(Value::Object(_)) => "mapping",
            Self::OutcomesRoot => "outcomes",
            Self::ActionOutcomes(..) => "action outcomes",
            Self::StatusRoot => "status",
            Self::ContextRoot => "context",
            Self::EnvRoot => "environment",
        }
    }
}

impl<'a, S: RenderScope> Templar<'a, S> {
    /// Bind a renderer to a scope with the given options.
    pub fn new(scope: &'a S, options: RenderOptions) -> Self {
        Self {
            scope,
            options,
            depth: Cell::new(0),
        }
    }

    /// Substitute every `@{ ... }` occurrence in `template`.
    pub fn render(&self, template: &str) -> RenderResult<String> {
        let mut chunks = String::with_capacity(template.len());
        for lexeme in lex(template)? {
            match lexeme {
                Lexeme::Text(text) => chunks.push_str(&text),
                Lexeme::Expression(expression) => {
                    debug!(expression = expression.trim(), "rendering expression");
                    let value = self.evaluate_expression(&expression)?;
                    chunks.push_str(&value_to_string(&value));
                }
            }
        }
        Ok(chunks)
    }

    /// Evaluate a bare expression to a value.
    pub fn evaluate_expression(&self, expression: &str) -> RenderResult<Value> {
        let parsed = parse(expression)?;
        match self.eval(&parsed)? {
            Evaluated::Json(value) => Ok(value),
            other => Err(RenderError::Syntax(format!(
                "expression stops at the {} scope and yields no value",
                other.kind()
            ))),
        }
    }

    /// Force a context value to a concrete JSON value, rendering deferred
    /// strings and object templates along the way.
    pub fn force_context_value(&self, value: &ContextValue) -> RenderResult<Value> {
        match value {
            ContextValue::Literal(v) => Ok(v.clone()),
            ContextValue::Template(template) => {
                let _guard = self.descend()?;
                Ok(Value::String(self.render(template)?))
            }
            ContextValue::Expression(expression) => {
                let _guard = self.descend()?;
                self.evaluate_expression(expression)
            }
            ContextValue::Map(entries) => {
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (key, entry) in entries {
                    out.insert(key.clone(), self.force_context_value(entry)?);
                }
                Ok(Value::Object(out))
            }
            ContextValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.force_context_value(item)?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    fn descend(&self) -> RenderResult<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth >= self.options.max_depth {
            return Err(RenderError::RecursionDepthExceeded {
                depth,
                max: self.options.max_depth,
            });
        }
        self.depth.set(depth);
        Ok(DepthGuard { cell: &self.depth })
    }

    fn eval(&self, expr: &Expr) -> RenderResult<Evaluated> {
        match expr {
            Expr::Name(name) => match name.as_str() {
                "outcomes" | "out" => Ok(Evaluated::OutcomesRoot),
                "status" => Ok(Evaluated::StatusRoot),
                "context" | "ctx" => Ok(Evaluated::ContextRoot),
                "environment" | "env" => Ok(Evaluated::EnvRoot),
                other => Err(RenderError::UnknownScope(other.to_string())),
            },
            Expr::Str(text) => Ok(Evaluated::Json(Value::String(text.clone()))),
            Expr::Int(value) => Ok(Evaluated::Json(Value::Number((*value).into()))),
            Expr::Attr(receiver, attr) => {
                let receiver = self.eval(receiver)?;
                self.access(receiver, &Key::Str(attr.clone()))
            }
            Expr::Index(receiver, index) => {
                let receiver = self.eval(receiver)?;
                let key = match self.eval(index)? {
                    Evaluated::Json(Value::String(s)) => Key::Str(s),
                    Evaluated::Json(Value::Number(n)) => {
                        Key::Int(n.as_i64().ok_or_else(|| {
                            RenderError::Syntax(format!("bad index: {n}"))
                        })?)
                    }
                    other => {
                        return Err(RenderError::BadAccess {
                            key: "<index>".into(),
                            kind: other.kind(),
                        });
                    }
                };
                self.access(receiver, &key)
            }
            Expr::Call(callee, _) => match callee.root_name() {
                Some(name) if DISABLED_BUILTINS.contains(&name) => {
                    Err(RenderError::DisabledBuiltin(name.to_string()))
                }
                Some(name) => Err(RenderError::UnknownFunction(name.to_string())),
                None => Err(RenderError::UnknownFunction("<expression>".into())),
            },
        }
    }

    fn access(&self, receiver: Evaluated, key: &Key) -> RenderResult<Evaluated> {
        match (receiver, key) {
            (Evaluated::OutcomesRoot, Key::Str(action)) => {
                match self.scope.action_outcomes(action) {
                    Some(outcomes) => Ok(Evaluated::ActionOutcomes(action.clone(), outcomes)),
                    None => Err(RenderError::ActionNotFound(action.clone())),
                }
            }
            (Evaluated::ActionOutcomes(action, outcomes), Key::Str(outcome_key)) => {
                match outcomes.get(outcome_key.as_str()) {
                    Some(value) => Ok(Evaluated::Json(Value::String(value.clone()))),
                    None if self.options.strict_outcomes => Err(RenderError::OutcomeKeyNotFound {
                        action,
                        key: outcome_key.clone(),
                    }),
                    None => Ok(Evaluated::Json(Value::String(String::new()))),
                }
            }
            (Evaluated::StatusRoot, Key::Str(action)) => {
                match self.scope.action_status(action) {
                    Some(status) => Ok(Evaluated::Json(Value::String(status))),
                    None => Err(RenderError::ActionNotFound(action.clone())),
                }
            }
            (Evaluated::ContextRoot, Key::Str(context_key)) => {
                match self.scope.context().get(context_key.as_str()) {
                    Some(value) => Ok(Evaluated::Json(self.force_context_value(value)?)),
                    None => Err(RenderError::ContextKeyNotFound(context_key.clone())),
                }
            }
            (Evaluated::EnvRoot, Key::Str(name)) => Ok(Evaluated::Json(Value::String(
                self.scope.env_var(name).unwrap_or_default(),
            ))),
            (Evaluated::Json(Value::Object(entries)), Key::Str(member)) => {
                match entries.get(member.as_str()) {
                    Some(value) => Ok(Evaluated::Json(value.clone())),
                    None => Err(RenderError::ContextKeyNotFound(member.clone())),
                }
            }
            (Evaluated::Json(Value::Array(items)), Key::Int(index)) => {
                let position = usize::try_from(*index)
                    .ok()
                    .filter(|i| *i < items.len())
                    .ok_or(RenderError::IndexOutOfRange(*index))?;
                Ok(Evaluated::Json(items[position].clone()))
            }
            (receiver, key) => Err(RenderError::BadAccess {
                key: key.to_string(),
                kind: receiver.kind(),
            }),
        }
    }
}

impl<S: RenderScope> Renderer for Templar<'_, S> {
    fn render_str(&self, template: &str) -> RenderResult<String> {
        self.render(template)
    }

    fn evaluate(&self, expression: &str) -> RenderResult<Value> {
        self.evaluate_expression(expression)
    }
}

enum Key {
    Str(String),
    Int(i64),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

struct DepthGuard<'a> {
    cell: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.cell.set(self.cell.get() - 1);
    }
}

/// The string form of an evaluated expression.
///
/// Strings pass through verbatim; null renders empty; everything else
/// renders as compact JSON.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct FixtureScope {
        outcomes: IndexMap<String, IndexMap<String, String>>,
        statuses: IndexMap<String, String>,
        context: ContextStore,
        env: IndexMap<String, String>,
    }

    impl RenderScope for FixtureScope {
        fn action_outcomes(&self, action: &str) -> Option<IndexMap<String, String>> {
            self.outcomes.get(action).cloned()
        }

        fn action_status(&self, action: &str) -> Option<String> {
            self.statuses.get(action).cloned()
        }

        fn context(&self) -> &ContextStore {
            &self.context
        }

        fn env_var(&self, name: &str) -> Option<String> {
            self.env.get(name).cloned()
        }
    }

    fn fixture() -> FixtureScope {
        let mut foo_outcomes = IndexMap::new();
        foo_outcomes.insert("bar".to_string(), "ok".to_string());
        foo_outcomes.insert("baz qux.fred".to_string(), "also ok".to_string());
        let mut outcomes = IndexMap::new();
        outcomes.insert("Foo".to_string(), foo_outcomes);

        let mut statuses = IndexMap::new();
        statuses.insert("Foo".to_string(), "SUCCESS".to_string());

        let mut context = ContextStore::new();
        context.insert("plugh".into(), ContextValue::from_string("xyzzy"));
        context.insert(
            "waldo".into(),
            ContextValue::from_string("@{ context.fred }"),
        );
        context.insert(
            "fred".into(),
            ContextValue::from_string("@{ context.waldo }"),
        );
        context.insert(
            "nested".into(),
            ContextValue::from(json!({"hosts": ["alpha", "beta"]})),
        );

        let mut env = IndexMap::new();
        env.insert("TEMPLAR_ENVIRONMENT_KEY".to_string(), "test".to_string());

        FixtureScope {
            outcomes,
            statuses,
            context,
            env,
        }
    }

    fn templar(scope: &FixtureScope) -> Templar<'_, FixtureScope> {
        Templar::new(scope, RenderOptions::default())
    }

    #[test]
    fn outcome_rendering() {
        let scope = fixture();
        assert_eq!(templar(&scope).render("@{outcomes.Foo.bar}").unwrap(), "ok");
        assert_eq!(templar(&scope).render("@{out.Foo.bar}").unwrap(), "ok");
    }

    #[test]
    fn outcome_missing_action() {
        let scope = fixture();
        let err = templar(&scope).render("@{outcomes.Unknown.bar}").unwrap_err();
        assert!(matches!(err, RenderError::ActionNotFound(name) if name == "Unknown"));
    }

    #[test]
    fn outcome_missing_key_is_empty_by_default() {
        let scope = fixture();
        assert_eq!(
            templar(&scope).render("@{outcomes.Foo.'unknown key'}").unwrap(),
            ""
        );
    }

    #[test]
    fn outcome_missing_key_errors_in_strict_mode() {
        let scope = fixture();
        let strict = Templar::new(
            &scope,
            RenderOptions {
                strict_outcomes: true,
                ..RenderOptions::default()
            },
        );
        let err = strict.render("@{outcomes.Foo.'unknown key'}").unwrap_err();
        assert!(err.to_string().contains("outcome key \"unknown key\" not found"));
    }

    #[test]
    fn status_rendering() {
        let scope = fixture();
        assert_eq!(templar(&scope).render("@{status.Foo}").unwrap(), "SUCCESS");
    }

    #[test]
    fn status_missing_action() {
        let scope = fixture();
        assert!(matches!(
            templar(&scope).render("@{status.Missing}").unwrap_err(),
            RenderError::ActionNotFound(_)
        ));
    }

    #[test]
    fn environment_rendering() {
        let scope = fixture();
        assert_eq!(
            templar(&scope)
                .render("@{environment.TEMPLAR_ENVIRONMENT_KEY}")
                .unwrap(),
            "test"
        );
        assert_eq!(templar(&scope).render("@{env.NOT_SET_ANYWHERE}").unwrap(), "");
    }

    #[test]
    fn context_rendering() {
        let scope = fixture();
        assert_eq!(templar(&scope).render("@{context.plugh}").unwrap(), "xyzzy");
        assert_eq!(templar(&scope).render("@{ctx.plugh}").unwrap(), "xyzzy");
    }

    #[test]
    fn context_missing_key() {
        let scope = fixture();
        assert!(matches!(
            templar(&scope).render("@{context.'unknown key'}").unwrap_err(),
            RenderError::ContextKeyNotFound(_)
        ));
    }

    #[test]
    fn nested_context_access() {
        let scope = fixture();
        assert_eq!(
            templar(&scope).render("@{ctx.nested.hosts[1]}").unwrap(),
            "beta"
        );
        assert_eq!(
            templar(&scope).render("@{ctx.nested.hosts}").unwrap(),
            "[\"alpha\",\"beta\"]"
        );
    }

    #[test]
    fn unknown_scope() {
        let scope = fixture();
        let err = templar(&scope)
            .render("@{'unknown type'.'unknown key'}")
            .unwrap_err();
        assert!(matches!(err, RenderError::BadAccess { .. } | RenderError::Syntax(_)));
        let err = templar(&scope).render("@{bogus.key}").unwrap_err();
        assert!(matches!(err, RenderError::UnknownScope(name) if name == "bogus"));
    }

    #[test]
    fn quoted_outcome_key() {
        let scope = fixture();
        assert_eq!(
            templar(&scope)
                .render("@{outcomes.Foo.'baz qux.fred'}")
                .unwrap(),
            "also ok"
        );
        assert_eq!(
            templar(&scope)
                .render("@{outcomes[\"Foo\"][\"baz qux.fred\"]}")
                .unwrap(),
            "also ok"
        );
    }

    #[test]
    fn escape_law() {
        let scope = fixture();
        let t = templar(&scope);
        for s in ["plain", "user@host", "@{ctx.plugh}", "a@@b", "@"] {
            let escaped = s.replace('@', "@@");
            assert_eq!(t.render(&escaped).unwrap(), *s, "failed for {s:?}");
        }
    }

    #[test]
    fn expression_cycle_fails_deterministically() {
        let scope = fixture();
        let err = templar(&scope).render("@{context.waldo}").unwrap_err();
        assert!(err.is_recursion(), "got {err}");
    }

    #[test]
    fn disabled_builtins_are_rejected() {
        let scope = fixture();
        for builtin in ["exec", "eval", "compile", "setattr", "delattr"] {
            let template = format!("@{{ {builtin}('x') }}");
            let err = templar(&scope).render(&template).unwrap_err();
            assert!(
                matches!(&err, RenderError::DisabledBuiltin(name) if name == builtin),
                "got {err} for {builtin}"
            );
        }
    }

    #[test]
    fn unknown_functions_are_rejected() {
        let scope = fixture();
        let err = templar(&scope).render("@{ frobnicate(1) }").unwrap_err();
        assert!(matches!(err, RenderError::UnknownFunction(name) if name == "frobnicate"));
    }

    #[test]
    fn render_is_deterministic_and_side_effect_free() {
        let scope = fixture();
        let t = templar(&scope);
        let first = t.render("@{outcomes.Foo.bar} and @{ctx.plugh}").unwrap();
        let second = t.render("@{outcomes.Foo.bar} and @{ctx.plugh}").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "ok and xyzzy");
    }

    #[test]
    fn object_expression_evaluates_to_structure() {
        let scope = fixture();
        let value = templar(&scope).evaluate_expression("ctx.nested").unwrap();
        assert_eq!(value, json!({"hosts": ["alpha", "beta"]}));
    }

    #[test]
    fn bare_scope_root_is_not_a_value() {
        let scope = fixture();
        assert!(templar(&scope).render("@{outcomes}").is_err());
    }
}
