//! Name-based access to typed application objects.
//!
//! A type becomes resolvable by describing itself once: a [`Descriptor`] maps
//! property names to accessor closures and method names to callable entries
//! with typed parameters. The table is built on first use and cached for the
//! life of the process.
//!
//! ```
//! use std::sync::OnceLock;
//! use docmerge::model::{Described, Descriptor, ParamKind};
//! use docmerge::{resolve, Models, Value};
//!
//! struct Person { name: String, age: i64 }
//!
//! impl Described for Person {
//!     fn descriptor() -> &'static Descriptor<Self> {
//!         static TABLE: OnceLock<Descriptor<Person>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             Descriptor::new("Person")
//!                 .property("name", |p: &Person| p.name.clone().into())
//!                 .property("age", |p: &Person| p.age.into())
//!                 .method("greet", [ParamKind::Text], |p: &Person, args: &[Value]| {
//!                     format!("{} greets {}", p.name, args[0]).into()
//!                 })
//!         })
//!     }
//! }
//!
//! let models = Models::single(Value::object(Person { name: "one".into(), age: 1 }));
//! assert_eq!(resolve("greet(two)", &models).unwrap(), Value::from("one greets two"));
//! ```

use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::{EvalError, Result};
use crate::value::Value;

/// Capability every typed model offers to the path evaluator.
pub trait Model: Send + Sync {
    fn type_name(&self) -> &str;

    fn property(&self, name: &str) -> Option<Value>;

    /// Call a method by name with raw literal arguments. `None` means no
    /// method with this name and arity exists.
    fn invoke(&self, name: &str, args: &[&str]) -> Option<Result<Value>>;

    /// Text written into a document when the object itself is the result.
    fn to_text(&self) -> String {
        self.type_name().to_string()
    }
}

/// Parameter types a method literal can be coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Integer,
    Decimal,
    Bool,
}

impl ParamKind {
    fn coerce(self, literal: &str) -> Result<Value> {
        match self {
            ParamKind::Text => Ok(Value::Text(literal.to_string())),
            ParamKind::Integer => literal
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| EvalError::malformed(literal, format!("expected an integer argument ({e})"))),
            ParamKind::Decimal => Decimal::from_str(literal)
                .map(Value::Decimal)
                .map_err(|e| EvalError::malformed(literal, format!("expected a decimal argument ({e})"))),
            ParamKind::Bool => literal
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|e| EvalError::malformed(literal, format!("expected a boolean argument ({e})"))),
        }
    }
}

type Accessor<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type Body<T> = Box<dyn Fn(&T, &[Value]) -> Value + Send + Sync>;

struct Method<T> {
    name: &'static str,
    params: Vec<ParamKind>,
    body: Body<T>,
}

/// Per-type table of named accessors.
pub struct Descriptor<T> {
    type_name: &'static str,
    properties: IndexMap<&'static str, Accessor<T>>,
    methods: Vec<Method<T>>,
}

impl<T> Descriptor<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            properties: IndexMap::new(),
            methods: Vec::new(),
        }
    }

    pub fn property<F>(mut self, name: &'static str, accessor: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.properties.insert(name, Box::new(accessor));
        self
    }

    /// Register a method. Overloads are allowed; the first entry whose name and
    /// arity match a call wins.
    pub fn method<P, F>(mut self, name: &'static str, params: P, body: F) -> Self
    where
        P: IntoIterator<Item = ParamKind>,
        F: Fn(&T, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.methods.push(Method {
            name,
            params: params.into_iter().collect(),
            body: Box::new(body),
        });
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self, target: &T, name: &str) -> Option<Value> {
        self.properties.get(name).map(|accessor| accessor(target))
    }

    pub fn call(&self, target: &T, name: &str, args: &[&str]) -> Option<Result<Value>> {
        let method = self
            .methods
            .iter()
            .find(|m| m.name == name && m.params.len() == args.len())?;

        let coerced = method
            .params
            .iter()
            .zip(args)
            .map(|(kind, literal)| kind.coerce(literal))
            .collect::<Result<Vec<_>>>();
        Some(coerced.map(|values| (method.body)(target, &values)))
    }
}

/// Types that publish a cached [`Descriptor`] get [`Model`] for free.
pub trait Described: Sized + Send + Sync + 'static {
    fn descriptor() -> &'static Descriptor<Self>;

    fn describe(&self) -> String {
        Self::descriptor().type_name().to_string()
    }
}

impl<T: Described> Model for T {
    fn type_name(&self) -> &str {
        T::descriptor().type_name()
    }

    fn property(&self, name: &str) -> Option<Value> {
        T::descriptor().get(self, name)
    }

    fn invoke(&self, name: &str, args: &[&str]) -> Option<Result<Value>> {
        T::descriptor().call(self, name, args)
    }

    fn to_text(&self) -> String {
        self.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    struct Calc;

    impl Described for Calc {
        fn descriptor() -> &'static Descriptor<Self> {
            static TABLE: OnceLock<Descriptor<Calc>> = OnceLock::new();
            TABLE.get_or_init(|| {
                Descriptor::new("Calc")
                    .method("text", [], |_, _| "text".into())
                    .method("text", [ParamKind::Text], |_, a| format!("Hello {}", a[0]).into())
                    .method("sum", [ParamKind::Integer, ParamKind::Integer], |_, a| {
                        Value::Integer(a[0].as_i64().unwrap_or(0) + a[1].as_i64().unwrap_or(0))
                    })
            })
        }
    }

    #[test]
    fn overloads_are_picked_by_arity() {
        assert_eq!(Calc.invoke("text", &[]).unwrap().unwrap(), Value::from("text"));
        assert_eq!(Calc.invoke("text", &["World"]).unwrap().unwrap(), Value::from("Hello World"));
        assert!(Calc.invoke("text", &["a", "b"]).is_none());
    }

    #[test]
    fn literals_are_coerced_to_parameter_types() {
        assert_eq!(Calc.invoke("sum", &["1", "2"]).unwrap().unwrap(), Value::Integer(3));
        let err = Calc.invoke("sum", &["1", "x"]).unwrap().unwrap_err();
        assert!(matches!(err, EvalError::Malformed { .. }));
    }
}
