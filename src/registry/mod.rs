use std::sync::Arc;

use crate::errors::{EvalError, Result};
use crate::tree::{CellFormat, RunFormat};
use crate::value::Value;

pub mod resolvers;
pub mod styles;
pub mod variables;

pub use resolvers::Resolver;
pub use styles::StyleMark;
pub use variables::{Constants, Variable};

pub(crate) use styles::Styles;

/// Extension points shared by every evaluation: value resolvers, built-in
/// variable providers and style callbacks.
///
/// Cloning is cheap and clones share their tables; registering on a clone
/// copies the affected table first, so evaluators already holding the
/// registry never observe the change.
#[derive(Clone, Default)]
pub struct Registry {
    resolvers: Arc<Vec<Arc<dyn Resolver>>>,
    variables: Arc<Vec<Arc<dyn Variable>>>,
    styles: Arc<Styles>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in resolvers in their fixed order.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_resolver(resolvers::builtins::ListIndex);
        registry.register_resolver(resolvers::builtins::ListRange);
        registry.register_resolver(resolvers::builtins::Arithmetic);
        registry.register_resolver(resolvers::builtins::Temporal);
        registry.register_resolver(resolvers::builtins::Line);
        registry.register_resolver(resolvers::builtins::NoBreak);
        registry
    }

    pub fn register_resolver<R: Resolver + 'static>(&mut self, resolver: R) {
        Arc::make_mut(&mut self.resolvers).push(Arc::new(resolver));
    }

    pub fn register_variable<V: Variable + 'static>(&mut self, variable: V) {
        Arc::make_mut(&mut self.variables).push(Arc::new(variable));
    }

    pub fn register_run_style<F>(&mut self, styling: F) -> StyleMark
    where
        F: Fn(&mut RunFormat) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.styles).add_run(Arc::new(styling))
    }

    pub fn register_cell_style<F>(&mut self, styling: F) -> StyleMark
    where
        F: Fn(&mut CellFormat) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.styles).add_cell(Arc::new(styling))
    }

    /// First resolver, in registration order, that accepts `value` and
    /// matches the whole `segment`.
    pub fn resolver_for<'s>(
        &self,
        segment: &'s str,
        value: &Value,
    ) -> Option<(&dyn Resolver, regex::Captures<'s>)> {
        self.resolvers
            .iter()
            .filter(|r| r.accepts(value))
            .find_map(|r| r.matches(segment).map(|c| (r.as_ref(), c)))
    }

    /// Value of the built-in variable `name` (without its `$`).
    pub fn variable(&self, name: &str, file: Option<&str>) -> Result<Value> {
        match self.variables.iter().find(|v| v.test(name)) {
            Some(variable) => variable.apply(name),
            None => Err(EvalError::UnknownVariable {
                name: name.to_string(),
                file: file.map(str::to_string),
            }),
        }
    }

    pub(crate) fn styles(&self) -> &Styles {
        &self.styles
    }
}
