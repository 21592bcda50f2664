//! Template and expression resolution for node configuration
//!
//! Two stages run over every string:
//!
//! 1. `${expr}` placeholders are interpolated. `expr` is first looked up as
//!    a key of the caller-supplied data table, then evaluated as an
//!    expression.
//! 2. If the interpolated string starts with `js/`, the rest is evaluated
//!    and its value (of any type) replaces the string.
//!
//! Expressions run on an embedded Rhai engine that only sees four read-only
//! bindings: `ctx`, `data`, `func` and `vars`. JavaScript-flavoured
//! spellings such as `data['key']` and `===` are accepted.
//!
//! Failures never escape: the offending placeholder (or the whole string)
//! is left untouched and a warning is logged.

use crate::value::{is_truthy, stringify};
use crate::{ExecutionContext, MapperError};
use regex::{Captures, Regex};
use rhai::{Dynamic, Engine, Scope};
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const EXPRESSION_PREFIX: &str = "js/";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(.*?)\}").expect("placeholder pattern is valid"));

/// Resolves `${...}` placeholders and `js/` expressions against a context
pub struct Mapper {
    engine: Engine,
}

/// Bindings visible to one resolution pass
struct Frame<'a> {
    table: Option<&'a Value>,
    ctx: Dynamic,
    data: Dynamic,
    func: Dynamic,
    vars: Dynamic,
}

impl Frame<'_> {
    fn scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_constant_dynamic("ctx", self.ctx.clone());
        scope.push_constant_dynamic("data", self.data.clone());
        scope.push_constant_dynamic("func", self.func.clone());
        scope.push_constant_dynamic("vars", self.vars.clone());
        scope
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        self.table
            .and_then(|table| table.get(key))
            .filter(|value| is_truthy(value))
    }
}

impl Mapper {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self { engine }
    }

    fn configure_engine(engine: &mut Engine) {
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(1 << 20);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);
        engine.disable_symbol("eval");
        engine.set_fail_on_invalid_map_property(true);

        engine.on_print(|text| tracing::debug!(target: "nanocore::mapper", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "nanocore::mapper", ?source, %pos, "{}", text)
        });
    }

    /// Resolve every string leaf of `obj` in place, recursing into nested
    /// objects. Other values are left as they are.
    pub fn resolve_object(
        &self,
        obj: &mut Map<String, Value>,
        ctx: &ExecutionContext,
        data: Option<&Value>,
    ) {
        let frame = self.frame(ctx, data);
        self.resolve_map(obj, &frame);
    }

    /// Resolve a template into a string.
    pub fn resolve_string(&self, text: &str, ctx: &ExecutionContext, data: Option<&Value>) -> String {
        stringify(&self.resolve_value(text, ctx, data))
    }

    /// Resolve a template, keeping a non-string `js/` result as is.
    pub fn resolve_value(&self, text: &str, ctx: &ExecutionContext, data: Option<&Value>) -> Value {
        let frame = self.frame(ctx, data);
        self.resolve_text(text, &frame)
    }

    /// Evaluate a bare expression against the context.
    pub fn run_expression(
        &self,
        expression: &str,
        ctx: &ExecutionContext,
        data: Option<&Value>,
    ) -> Result<Value, MapperError> {
        let frame = self.frame(ctx, data);
        self.evaluate(expression, &frame)
    }

    fn frame<'a>(&self, ctx: &ExecutionContext, data: Option<&'a Value>) -> Frame<'a> {
        Frame {
            table: data,
            ctx: to_dynamic(&ctx.to_value()),
            data: data.map(to_dynamic).unwrap_or(Dynamic::UNIT),
            func: to_dynamic(&Value::Object(ctx.func.clone())),
            vars: to_dynamic(&Value::Object(ctx.vars.clone())),
        }
    }

    fn resolve_map(&self, obj: &mut Map<String, Value>, frame: &Frame<'_>) {
        for value in obj.values_mut() {
            match value {
                Value::String(text) => *value = self.resolve_text(text, frame),
                Value::Object(nested) => self.resolve_map(nested, frame),
                _ => {}
            }
        }
    }

    fn resolve_text(&self, text: &str, frame: &Frame<'_>) -> Value {
        let interpolated = self.interpolate(text, frame);

        let Some(expression) = interpolated.strip_prefix(EXPRESSION_PREFIX) else {
            return Value::String(interpolated);
        };
        match self.evaluate(expression, frame) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(expression, "Mapper expression left unresolved: {}", e);
                Value::String(interpolated)
            }
        }
    }

    fn interpolate(&self, text: &str, frame: &Frame<'_>) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures<'_>| {
                let expression = &caps[1];
                let resolved = match frame.lookup(expression) {
                    Some(value) => Ok(value.clone()),
                    None => self.evaluate(expression, frame),
                };
                match resolved {
                    Ok(value) => stringify(&value),
                    Err(e) => {
                        tracing::warn!(placeholder = expression, "Mapper placeholder left unresolved: {}", e);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    fn evaluate(&self, expression: &str, frame: &Frame<'_>) -> Result<Value, MapperError> {
        let source = normalize_expression(expression);
        let mut scope = frame.scope();

        let result = self
            .engine
            .eval_expression_with_scope::<Dynamic>(&mut scope, &source)
            .map_err(|e| MapperError::Evaluation(e.to_string()))?;

        rhai::serde::from_dynamic::<Value>(&result).map_err(|e| MapperError::Conversion(e.to_string()))
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

fn to_dynamic(value: &Value) -> Dynamic {
    rhai::serde::to_dynamic(value).unwrap_or_else(|e| {
        tracing::warn!("Mapper binding could not be converted: {}", e);
        Dynamic::UNIT
    })
}

/// Rewrite JavaScript-isms into Rhai: single-quoted strings become
/// double-quoted, `===`/`!==` become `==`/`!=`.
fn normalize_expression(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '`' => {
                out.push(c);
                while let Some(next) = chars.next() {
                    out.push(next);
                    if next == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if next == c {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            out.push('\\');
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            '=' | '!' if chars.peek() == Some(&'=') => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                out.push(c);
                out.push('=');
            }
            other => out.push(other),
        }
    }
    out
}
