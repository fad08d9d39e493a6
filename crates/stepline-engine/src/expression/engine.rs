//! Expression evaluator built on minijinja's expression language.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{value::ValueKind, Environment, Error, ErrorKind, Value};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineResult;

static SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("template span pattern is valid"));

/// Returns true if the string contains at least one `{{ expr }}` span.
pub fn is_template(s: &str) -> bool {
    SPAN.is_match(s)
}

/// Returns the inner expression when the whole string is a single span.
///
/// `"{{ env.items }}"` yields `Some("env.items")`; `"a {{ b }}"` and
/// `"{{ a }}{{ b }}"` yield `None`.
pub fn single_expression(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let caps = SPAN.captures(trimmed)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != trimmed.len() {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

/// Sandboxed evaluator for template spans and guard expressions.
///
/// The evaluation context exposes every variable at the top level and the
/// whole mapping under `env`, so `{{ item }}`, `{{ env.x }}` and
/// `{{ env["step.field"] }}` all resolve.
pub struct ExpressionEngine {
    env: Environment<'static>,
}

impl ExpressionEngine {
    /// Create an evaluator with the stepline filter and test allowlist.
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.add_filter("int", filter_int);
        env.add_filter("float", filter_float);
        env.add_filter("tojson", filter_tojson);
        env.add_filter("fromjson", filter_fromjson);
        env.add_filter("split", filter_split);
        env.add_filter("b64encode", filter_b64encode);
        env.add_filter("b64decode", filter_b64decode);

        env.add_test("matching", test_matching);

        Self { env }
    }

    /// Evaluate a bare expression (no braces) to a JSON value.
    pub fn evaluate(
        &self,
        expr: &str,
        variables: &HashMap<String, serde_json::Value>,
    ) -> EngineResult<serde_json::Value> {
        let value = self.eval(expr, &build_context(variables))?;
        Ok(to_json(&value))
    }

    /// Substitute every span with its textual value.
    ///
    /// A span that fails to evaluate is logged and replaced with an empty
    /// string; the other spans are still substituted.
    pub fn render(&self, template: &str, variables: &HashMap<String, serde_json::Value>) -> String {
        if !is_template(template) {
            return template.to_string();
        }
        let ctx = build_context(variables);
        self.render_in(template, &ctx)
    }

    /// Like [`render`](Self::render) but fails on the first broken span.
    pub fn render_strict(
        &self,
        template: &str,
        variables: &HashMap<String, serde_json::Value>,
    ) -> EngineResult<String> {
        let ctx = build_context(variables);
        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;
        for caps in SPAN.captures_iter(template) {
            let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            rendered.push_str(&template[last..whole.start()]);
            rendered.push_str(&to_text(&self.eval(expr.as_str(), &ctx)?));
            last = whole.end();
        }
        rendered.push_str(&template[last..]);
        Ok(rendered)
    }

    /// Resolve a value, keeping native types for single-span strings.
    ///
    /// Lists and objects are resolved element-wise. Non-template values are
    /// returned unchanged.
    pub fn render_value(
        &self,
        value: &serde_json::Value,
        variables: &HashMap<String, serde_json::Value>,
    ) -> serde_json::Value {
        let ctx = build_context(variables);
        self.render_value_in(value, &ctx)
    }

    fn render_value_in(&self, value: &serde_json::Value, ctx: &Value) -> serde_json::Value {
        match value {
            serde_json::Value::String(s) => match single_expression(s) {
                Some(expr) => match self.eval(expr, ctx) {
                    Ok(v) => to_json(&v),
                    Err(e) => {
                        warn_unresolved(expr, &e);
                        serde_json::Value::String(String::new())
                    }
                },
                None if is_template(s) => serde_json::Value::String(self.render_in(s, ctx)),
                None => value.clone(),
            },
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items.iter().map(|v| self.render_value_in(v, ctx)).collect(),
            ),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value_in(v, ctx)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    fn render_in(&self, template: &str, ctx: &Value) -> String {
        SPAN.replace_all(template, |caps: &regex::Captures<'_>| {
            let expr = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match self.eval(expr, ctx) {
                Ok(v) => to_text(&v),
                Err(e) => {
                    warn_unresolved(expr, &e);
                    String::new()
                }
            }
        })
        .into_owned()
    }

    fn eval(&self, expr: &str, ctx: &Value) -> Result<Value, Error> {
        let compiled = self.env.compile_expression(expr)?;
        compiled.eval(ctx)
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine").finish_non_exhaustive()
    }
}

fn warn_unresolved(expr: &str, error: &Error) {
    tracing::warn!(expression = %expr, error = %error, "⚠️ failed to resolve expression");
}

fn build_context(variables: &HashMap<String, serde_json::Value>) -> Value {
    let mut root: serde_json::Map<String, serde_json::Value> = variables
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let env = serde_json::Value::Object(root.clone());
    root.insert("env".to_string(), env);
    Value::from_serialize(serde_json::Value::Object(root))
}

fn to_json(value: &Value) -> serde_json::Value {
    if value.is_undefined() {
        return serde_json::Value::Null;
    }
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn to_text(value: &Value) -> String {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => String::new(),
        ValueKind::Bool => value.is_true().to_string(),
        ValueKind::Seq | ValueKind::Map => serde_json::to_string(value).unwrap_or_default(),
        _ => value.to_string(),
    }
}

fn filter_int(value: Value) -> Value {
    if let Some(n) = value.as_i64() {
        return Value::from(n);
    }
    let text = value.to_string();
    let text = text.trim();
    text.parse::<i64>()
        .or_else(|_| text.parse::<f64>().map(|f| f as i64))
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(0i64))
}

fn filter_float(value: Value) -> Value {
    value
        .to_string()
        .trim()
        .parse::<f64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(0.0f64))
}

fn filter_tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn filter_fromjson(value: Value) -> Result<Value, Error> {
    let parsed: serde_json::Value = serde_json::from_str(&value.to_string())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
    Ok(Value::from_serialize(parsed))
}

fn filter_split(value: Value, sep: Option<String>) -> Vec<String> {
    let text = value.to_string();
    match sep {
        Some(sep) => text.split(sep.as_str()).map(str::to_string).collect(),
        None => text.split_whitespace().map(str::to_string).collect(),
    }
}

fn filter_b64encode(value: Value) -> String {
    STANDARD.encode(value.to_string().as_bytes())
}

fn filter_b64decode(value: Value) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(value.to_string().as_bytes())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn test_matching(value: String, pattern: String) -> bool {
    Regex::new(&pattern).map(|re| re.is_match(&value)).unwrap_or(false)
}
