use indexmap::IndexMap;

use crate::errors::Result;
use crate::value::Value;

/// A provider of global values addressed as `{$name}` in templates.
pub trait Variable: Send + Sync {
    /// Whether this provider supplies `name` (given without the `$`).
    fn test(&self, name: &str) -> bool;
    fn apply(&self, name: &str) -> Result<Value>;
}

/// Fixed table of named constants.
#[derive(Debug, Clone, Default)]
pub struct Constants {
    values: IndexMap<String, Value>,
}

impl Constants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl Variable for Constants {
    fn test(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn apply(&self, name: &str) -> Result<Value> {
        Ok(self.values.get(name).cloned().unwrap_or_default())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Constants {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
