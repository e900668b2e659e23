// src/expression.rs
use itertools::Itertools;
use tracing::trace;

use crate::context::{Context, Models};
use crate::errors::{EvalError, Result};
use crate::parser::Parser;
use crate::registry::Registry;
use crate::value::Value;

/// Resolve a path expression such as `order.items.1.price * 2` against the
/// models, first model first.
///
/// A trailing `?` makes the expression optional: when nothing resolves it the
/// result is the empty string instead of an error. Malformed literals are
/// reported either way.
pub fn resolve(registry: &Registry, context: &Context, expression: &str, models: &Models) -> Result<Value> {
    let expression = expression.trim();
    let (path, optional) = match expression.strip_suffix('?') {
        Some(path) => (path, true),
        None => (expression, false),
    };

    let segments = Parser::new(path).split_path();
    if segments.iter().all(String::is_empty) {
        return Ok(empty());
    }

    let walker = Walker {
        registry,
        file: context.file_name.as_deref(),
        path: path.trim(),
    };

    if let Some(name) = segments[0].strip_prefix('$') {
        let outcome = registry
            .variable(name, walker.file)
            .and_then(|value| walker.walk(&segments[1..], value));
        return match outcome {
            Err(e) if optional && !is_malformed(&e) => Ok(empty()),
            other => other,
        };
    }

    let mut problems = Vec::new();
    for model in models {
        match walker.walk(&segments, model.clone()) {
            Ok(value) => {
                trace!(path = walker.path, model = %model.type_name(), "resolved");
                return Ok(value);
            }
            Err(e) => problems.push(e),
        }
    }

    if optional && !problems.iter().any(is_malformed) {
        trace!(path = walker.path, "optional expression resolved to nothing");
        return Ok(empty());
    }

    match problems.len() {
        0 => Err(EvalError::Unresolved {
            path: walker.path.to_string(),
            segment: segments[0].clone(),
            model: "<none>".into(),
            file: walker.file.map(str::to_string),
        }),
        1 => Err(problems.remove(0)),
        _ => Err(EvalError::Several {
            path: walker.path.to_string(),
            problems: problems.iter().map(ToString::to_string).unique().collect(),
            file: walker.file.map(str::to_string),
        }),
    }
}

fn empty() -> Value {
    Value::Text(String::new())
}

fn is_malformed(e: &EvalError) -> bool {
    matches!(e, EvalError::Malformed { .. })
}

struct Walker<'a> {
    registry: &'a Registry,
    file: Option<&'a str>,
    path: &'a str,
}

impl Walker<'_> {
    /// Resolve the remaining segments left to right starting from `value`.
    fn walk(&self, segments: &[String], mut value: Value) -> Result<Value> {
        for segment in segments {
            if value.is_empty() {
                return Ok(empty());
            }
            value = self.step(segment, &value)?;
        }
        Ok(if value.is_empty() { empty() } else { value })
    }

    /// Resolver, then property, then method.
    fn step(&self, segment: &str, value: &Value) -> Result<Value> {
        if let Some((resolver, captures)) = self.registry.resolver_for(segment, value) {
            trace!(segment, resolver = resolver.name(), "resolver matched");
            return resolver.resolve(&captures, value);
        }

        if let Some(found) = value.property(segment) {
            return Ok(found);
        }

        if let Value::Object(model) = value {
            let call = Parser::new(segment).parse_call()?;
            if let Some(result) = model.invoke(call.name, &call.args) {
                return result;
            }
        }

        Err(EvalError::Unresolved {
            path: self.path.to_string(),
            segment: segment.to_string(),
            model: value.type_name(),
            file: self.file.map(str::to_string),
        })
    }
}
