//! Dynamic values flowing through path resolution.
//!
//! Application data reaches the evaluator either as plain data (maps, lists,
//! scalars, usually converted from `serde_json::Value`) or as typed objects
//! exposed through [`Model`]. Both are carried by [`Value`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use indexmap::IndexMap;
use itertools::Itertools;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::model::Model;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(Arc<dyn Model>),
}

impl Value {
    /// Wrap a typed model object.
    pub fn object<M: Model + 'static>(model: M) -> Self {
        Value::Object(Arc::new(model))
    }

    /// Short type label used in error reports.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::Integer(_) => "integer".into(),
            Value::Decimal(_) => "decimal".into(),
            Value::Text(_) => "text".into(),
            Value::Date(_) => "date".into(),
            Value::Time(_) => "time".into(),
            Value::DateTime(_) => "datetime".into(),
            Value::List(_) => "list".into(),
            Value::Map(_) => "map".into(),
            Value::Object(m) => m.type_name().to_string(),
        }
    }

    /// Null and the empty string stop path resolution early.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Region conditions: anything non-null whose text is not blank.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            other => !other.to_text().trim().is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(n) => Some(Decimal::from(*n)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Property lookup shared by every kind of value. Objects answer through
    /// their descriptor; maps answer by key.
    pub fn property(&self, name: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(name).cloned(),
            Value::Object(model) => model.property(name),
            Value::List(items) if name == "size" => Some(Value::Integer(items.len() as i64)),
            Value::Text(s) if name == "size" => Some(Value::Integer(s.chars().count() as i64)),
            _ => None,
        }
    }

    /// Generic value → string conversion used when writing into runs.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) if t.second() == 0 && t.nanosecond() == 0 => t.format("%H:%M").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::List(items) => items.iter().map(Value::to_text).join(", "),
            Value::Map(map) => format!(
                "{{{}}}",
                map.iter().map(|(k, v)| format!("{k}: {}", v.to_text())).join(", ")
            ),
            Value::Object(model) => model.to_text(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Decimal(d) => write!(f, "Decimal({d})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Date(d) => write!(f, "Date({d})"),
            Value::Time(t) => write!(f, "Time({t})"),
            Value::DateTime(dt) => write!(f, "DateTime({dt})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Object(m) => write!(f, "Object({})", m.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (a, b) => match (a.as_decimal(), b.as_decimal()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(v as i64)
            }
        })*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        i64::try_from(v).map(Value::Integer).unwrap_or_else(|_| Value::Decimal(Decimal::from(v)))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Decimal::from_f64(v).map(Value::Decimal).unwrap_or(Value::Null)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => {
                    let text = n.to_string();
                    Decimal::from_str(&text)
                        .or_else(|_| Decimal::from_scientific(&text))
                        .map(Value::Decimal)
                        .unwrap_or(Value::Null)
                }
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_their_kind() {
        assert_eq!(Value::from(json!(3)), Value::Integer(3));
        assert!(matches!(Value::from(json!(1.25)), Value::Decimal(_)));
        assert_eq!(Value::from(json!(1.25)).to_text(), "1.25");
    }

    #[test]
    fn integers_and_decimals_compare_numerically() {
        assert_eq!(Value::Integer(11), Value::Decimal(Decimal::new(110, 1)));
        assert_ne!(Value::Integer(11), Value::Text("11".into()));
    }

    #[test]
    fn truthiness_follows_blank_text() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("  ").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("x").is_truthy());
    }

    #[test]
    fn stringify_collections() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.to_text(), "a, b");
        let map = Value::from(json!({"k": 1}));
        assert_eq!(map.to_text(), "{k: 1}");
    }
}
