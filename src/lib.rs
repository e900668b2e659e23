pub mod errors;
pub mod context;
pub mod value;
pub mod model;
pub mod registry;
pub mod tree;
pub mod outline;
pub mod engine;
pub mod scanner;
pub mod sheet;
mod expression;
mod parser;

pub use context::{Context, Models};
pub use errors::{EvalError, Result};
pub use outline::Outline;
pub use registry::{Constants, Registry, Resolver, StyleMark, Variable};
pub use sheet::{Sheet, SheetCell};
pub use tree::Document;
pub use value::Value;

/// The main evaluator. Holds the registry shared by every document it
/// evaluates and the options of the current template.
#[derive(Clone, Default)]
pub struct Evaluator {
    ctx: Context,
    registry: Registry,
}

impl Evaluator {
    pub fn new(registry: Registry) -> Self {
        Self { ctx: Context::default(), registry }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve one path expression, e.g. `order.items.1.price * 2`.
    pub fn resolve(&self, path: &str, models: &Models) -> Result<Value> {
        expression::resolve(&self.registry, &self.ctx, path, models)
    }

    /// Substitute every `{…}` placeholder of a piece of text.
    pub fn apply(&self, text: &str, models: &Models) -> Result<String> {
        scanner::apply(&self.registry, &self.ctx, text, models)
    }

    /// Evaluate the regions and placeholders of a document in place.
    pub fn evaluate<'d>(&self, document: &'d mut Document, models: &Models) -> Result<&'d mut Document> {
        engine::evaluate(document, &self.registry, &self.ctx, models)
    }

    /// One evaluated copy of `template` per model, concatenated page by page.
    pub fn evaluate_and_merge(&self, template: &Document, models: &[Value], additions: &Models) -> Result<Document> {
        engine::evaluate_and_merge(template, &self.registry, &self.ctx, models, additions)
    }

    /// Fill the noted cells of a spreadsheet template.
    pub fn calculate<'s>(&self, sheet: &'s mut Sheet, models: &Models) -> Result<&'s mut Sheet> {
        sheet::calculate(sheet, &self.registry, &self.ctx, models)
    }
}

/// Convenience: resolve with the built-in registry.
pub fn resolve(path: &str, models: &Models) -> Result<Value> {
    Evaluator::new(Registry::with_builtins()).resolve(path, models)
}

/// Convenience: substitute placeholders with the built-in registry.
pub fn apply(text: &str, models: &Models) -> Result<String> {
    Evaluator::new(Registry::with_builtins()).apply(text, models)
}

/// Convenience: evaluate a document with the built-in registry.
pub fn evaluate<'d>(document: &'d mut Document, models: &Models) -> Result<&'d mut Document> {
    Evaluator::new(Registry::with_builtins()).evaluate(document, models)
}

/// Convenience: calculate a sheet with the built-in registry.
pub fn calculate<'s>(sheet: &'s mut Sheet, models: &Models) -> Result<&'s mut Sheet> {
    Evaluator::new(Registry::with_builtins()).calculate(sheet, models)
}
