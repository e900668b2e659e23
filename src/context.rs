use crate::value::Value;

/// Evaluation options shared by every expression of one document.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Label of the template being evaluated, quoted in error reports.
    pub file_name: Option<String>,
    /// Render digits as kanji numerals (vertical writing).
    pub vertical: bool,
}

impl Context {
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }
}

/// The ordered models an expression is resolved against. Earlier models win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Models(Vec<Value>);

impl Models {
    /// Null entries carry nothing to resolve and are dropped.
    pub fn new(models: Vec<Value>) -> Self {
        Self(models.into_iter().filter(|m| !matches!(m, Value::Null)).collect())
    }

    pub fn single(model: impl Into<Value>) -> Self {
        Self::new(vec![model.into()])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` followed by `others`.
    pub fn chain(&self, others: &Models) -> Models {
        Models(self.0.iter().chain(others.iter()).cloned().collect())
    }
}

impl From<Vec<Value>> for Models {
    fn from(models: Vec<Value>) -> Self {
        Self::new(models)
    }
}

impl FromIterator<Value> for Models {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Models {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
