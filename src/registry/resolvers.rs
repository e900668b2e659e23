use regex::{Captures, Regex};

use crate::errors::Result;
use crate::value::Value;

/// A pluggable transform applied to one path segment.
///
/// A resolver is only consulted when the current value is of a kind it
/// [`accepts`](Resolver::accepts), and only when its pattern matches the whole
/// segment. Patterns are expected to be anchored.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;
    fn accepts(&self, value: &Value) -> bool;
    fn pattern(&self) -> &Regex;
    fn resolve(&self, captures: &Captures<'_>, value: &Value) -> Result<Value>;

    fn matches<'s>(&self, segment: &'s str) -> Option<Captures<'s>> {
        self.pattern().captures(segment)
    }
}

pub mod builtins {
    use super::*;
    use crate::errors::EvalError;
    use chrono::{Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
    use rust_decimal::{Decimal, RoundingStrategy};
    use std::str::FromStr;
    use std::sync::LazyLock;

    static INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());
    static RANGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)?[~～](\d+)?$").unwrap());
    static ARITHMETIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([+\-*/%])([0-9.]+)$").unwrap());
    static TEMPORAL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^([+-]\d+)(year|month|day|hour|min|sec|年|月|日|時間|時|分|秒)$").unwrap()
    });
    static LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^line(\d+)$").unwrap());
    static NO_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^noBreak$").unwrap());
    static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

    fn number(captures: &Captures<'_>, group: usize) -> Result<Option<usize>> {
        match captures.get(group) {
            None => Ok(None),
            Some(m) => m
                .as_str()
                .parse::<usize>()
                .map(Some)
                .map_err(|e| EvalError::malformed(&captures[0], e.to_string())),
        }
    }

    /// `items.2` picks the second element; out of range yields nothing.
    pub struct ListIndex;
    impl Resolver for ListIndex {
        fn name(&self) -> &'static str { "list-index" }
        fn accepts(&self, value: &Value) -> bool { matches!(value, Value::List(_)) }
        fn pattern(&self) -> &Regex { &INDEX }
        fn resolve(&self, captures: &Captures<'_>, value: &Value) -> Result<Value> {
            let items = value.as_list().unwrap_or_default();
            let index = number(captures, 1)?.unwrap_or(0);
            Ok(index
                .checked_sub(1)
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
    }

    /// `items.2~4`, `items.~3`, `items.2~`: inclusive 1-based sub-list.
    pub struct ListRange;
    impl Resolver for ListRange {
        fn name(&self) -> &'static str { "list-range" }
        fn accepts(&self, value: &Value) -> bool { matches!(value, Value::List(_)) }
        fn pattern(&self) -> &Regex { &RANGE }
        fn resolve(&self, captures: &Captures<'_>, value: &Value) -> Result<Value> {
            let items = value.as_list().unwrap_or_default();
            let start = number(captures, 1)?.unwrap_or(1).max(1);
            let end = number(captures, 2)?.unwrap_or(items.len()).min(items.len());
            if start > end {
                return Ok(Value::List(Vec::new()));
            }
            Ok(Value::List(items[start - 1..end].to_vec()))
        }
    }

    /// `+1`, `*1.1`, `/2`: decimal arithmetic on the current number.
    pub struct Arithmetic;
    impl Resolver for Arithmetic {
        fn name(&self) -> &'static str { "arithmetic" }
        fn accepts(&self, value: &Value) -> bool { matches!(value, Value::Integer(_) | Value::Decimal(_)) }
        fn pattern(&self) -> &Regex { &ARITHMETIC }
        fn resolve(&self, captures: &Captures<'_>, value: &Value) -> Result<Value> {
            let segment = &captures[0];
            let one = value.as_decimal().unwrap_or_default();
            let other = Decimal::from_str(&captures[2])
                .map_err(|e| EvalError::malformed(segment, e.to_string()))?;
            let overflow = || EvalError::malformed(segment, "arithmetic overflow");

            let result = match &captures[1] {
                "+" => one.checked_add(other).ok_or_else(overflow)?,
                "-" => one.checked_sub(other).ok_or_else(overflow)?,
                "*" => one.checked_mul(other).ok_or_else(overflow)?,
                "/" => {
                    if other.is_zero() {
                        return Err(EvalError::malformed(segment, "division by zero"));
                    }
                    // the quotient keeps the scale of the left operand
                    one.checked_div(other)
                        .ok_or_else(overflow)?
                        .round_dp_with_strategy(one.scale(), RoundingStrategy::MidpointTowardZero)
                }
                "%" => {
                    if other.is_zero() {
                        return Err(EvalError::malformed(segment, "division by zero"));
                    }
                    one.checked_rem(other).ok_or_else(overflow)?
                }
                op => return Err(EvalError::malformed(segment, format!("unknown operator {op}"))),
            };
            Ok(Value::Decimal(result))
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Unit {
        Year,
        Month,
        Day,
        Hour,
        Minute,
        Second,
    }

    impl Unit {
        fn parse(label: &str) -> Option<Self> {
            Some(match label {
                "year" | "年" => Unit::Year,
                "month" | "月" => Unit::Month,
                "day" | "日" => Unit::Day,
                "hour" | "時間" | "時" => Unit::Hour,
                "min" | "分" => Unit::Minute,
                "sec" | "秒" => Unit::Second,
                _ => return None,
            })
        }

        fn duration(self, amount: i64) -> Option<Duration> {
            match self {
                Unit::Day => Duration::try_days(amount),
                Unit::Hour => Duration::try_hours(amount),
                Unit::Minute => Duration::try_minutes(amount),
                Unit::Second => Duration::try_seconds(amount),
                Unit::Year | Unit::Month => None,
            }
        }

        fn months(self, amount: i64) -> Option<i64> {
            match self {
                Unit::Year => amount.checked_mul(12),
                Unit::Month => Some(amount),
                _ => None,
            }
        }
    }

    fn shift_date(date: NaiveDate, unit: Unit, amount: i64) -> Option<NaiveDate> {
        if let Some(months) = unit.months(amount) {
            let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            return if months < 0 {
                date.checked_sub_months(magnitude)
            } else {
                date.checked_add_months(magnitude)
            };
        }
        match unit {
            Unit::Day => date.checked_add_signed(unit.duration(amount)?),
            _ => None,
        }
    }

    fn shift_datetime(at: NaiveDateTime, unit: Unit, amount: i64) -> Option<NaiveDateTime> {
        if unit.months(amount).is_some() {
            let date = shift_date(at.date(), unit, amount)?;
            return Some(date.and_time(at.time()));
        }
        at.checked_add_signed(unit.duration(amount)?)
    }

    fn shift_time(time: NaiveTime, unit: Unit, amount: i64) -> Option<NaiveTime> {
        match unit {
            Unit::Hour | Unit::Minute | Unit::Second => {
                Some(time.overflowing_add_signed(unit.duration(amount)?).0)
            }
            _ => None,
        }
    }

    /// `-10min`, `+3day`, `+1年`: moves a date, time or date-time.
    pub struct Temporal;
    impl Resolver for Temporal {
        fn name(&self) -> &'static str { "temporal" }
        fn accepts(&self, value: &Value) -> bool {
            matches!(value, Value::Date(_) | Value::Time(_) | Value::DateTime(_))
        }
        fn pattern(&self) -> &Regex { &TEMPORAL }
        fn resolve(&self, captures: &Captures<'_>, value: &Value) -> Result<Value> {
            let segment = &captures[0];
            let amount = captures[1]
                .parse::<i64>()
                .map_err(|e| EvalError::malformed(segment, e.to_string()))?;
            let unit = Unit::parse(&captures[2])
                .ok_or_else(|| EvalError::malformed(segment, "unknown temporal unit"))?;
            let unsupported =
                || EvalError::malformed(segment, format!("can't shift a {} by {unit:?}", value.type_name()));

            match value {
                Value::Date(d) => shift_date(*d, unit, amount).map(Value::Date).ok_or_else(unsupported),
                Value::Time(t) => shift_time(*t, unit, amount).map(Value::Time).ok_or_else(unsupported),
                Value::DateTime(dt) => shift_datetime(*dt, unit, amount)
                    .map(Value::DateTime)
                    .ok_or_else(unsupported),
                _ => Err(unsupported()),
            }
        }
    }

    /// `line2`: the second line of a multi-line text.
    pub struct Line;
    impl Resolver for Line {
        fn name(&self) -> &'static str { "line" }
        fn accepts(&self, value: &Value) -> bool { matches!(value, Value::Text(_)) }
        fn pattern(&self) -> &Regex { &LINE }
        fn resolve(&self, captures: &Captures<'_>, value: &Value) -> Result<Value> {
            let text = value.as_str().unwrap_or_default();
            let number = number(captures, 1)?.unwrap_or(0);
            let line = number
                .checked_sub(1)
                .and_then(|i| text.lines().nth(i))
                .unwrap_or_default();
            Ok(Value::Text(line.to_string()))
        }
    }

    /// `noBreak`: collapses whitespace runs into one full-width space.
    pub struct NoBreak;
    impl Resolver for NoBreak {
        fn name(&self) -> &'static str { "noBreak" }
        fn accepts(&self, value: &Value) -> bool { matches!(value, Value::Text(_)) }
        fn pattern(&self) -> &Regex { &NO_BREAK }
        fn resolve(&self, _: &Captures<'_>, value: &Value) -> Result<Value> {
            let text = value.as_str().unwrap_or_default();
            Ok(Value::Text(WHITESPACE.replace_all(text, "\u{3000}").into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::builtins::*;
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn apply(resolver: &dyn Resolver, segment: &str, value: Value) -> Result<Value> {
        let captures = resolver.matches(segment).expect("pattern should match");
        resolver.resolve(&captures, &value)
    }

    #[test]
    fn index_is_one_based() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(apply(&ListIndex, "1", list.clone()).unwrap(), Value::from("a"));
        assert_eq!(apply(&ListIndex, "2", list.clone()).unwrap(), Value::from("b"));
        assert_eq!(apply(&ListIndex, "3", list.clone()).unwrap(), Value::Null);
        assert_eq!(apply(&ListIndex, "0", list).unwrap(), Value::Null);
    }

    #[test]
    fn range_defaults_to_full_list() {
        let list = Value::from(vec![1, 2, 3, 4]);
        assert_eq!(apply(&ListRange, "2~3", list.clone()).unwrap(), Value::from(vec![2, 3]));
        assert_eq!(apply(&ListRange, "~2", list.clone()).unwrap(), Value::from(vec![1, 2]));
        assert_eq!(apply(&ListRange, "3~", list.clone()).unwrap(), Value::from(vec![3, 4]));
        assert_eq!(apply(&ListRange, "~", list.clone()).unwrap(), list.clone());
        assert_eq!(apply(&ListRange, "3～9", list.clone()).unwrap(), Value::from(vec![3, 4]));
        assert_eq!(apply(&ListRange, "4~2", list).unwrap(), Value::List(vec![]));
    }

    #[test]
    fn division_rounds_half_down_at_left_scale() {
        assert_eq!(apply(&Arithmetic, "/2", Value::from(10)).unwrap(), Value::from(5));
        assert_eq!(apply(&Arithmetic, "/4", Value::from(10)).unwrap(), Value::from(2));
        let half = Value::Decimal(Decimal::new(105, 1));
        assert_eq!(
            apply(&Arithmetic, "/2", half).unwrap(),
            Value::Decimal(Decimal::new(52, 1))
        );
        assert!(apply(&Arithmetic, "/0", Value::from(1)).is_err());
    }

    #[test]
    fn malformed_decimal_literal_is_an_error() {
        let err = apply(&Arithmetic, "+1.2.3", Value::from(1)).unwrap_err();
        assert!(matches!(err, crate::errors::EvalError::Malformed { .. }));
    }

    #[test]
    fn temporal_units() {
        let time = Value::from(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(
            apply(&Temporal, "-10min", time.clone()).unwrap(),
            Value::from(NaiveTime::from_hms_opt(10, 20, 0).unwrap())
        );
        assert!(apply(&Temporal, "+1day", time).is_err());

        let date = Value::from(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(
            apply(&Temporal, "+1月", date.clone()).unwrap(),
            Value::from(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(
            apply(&Temporal, "-1year", date.clone()).unwrap(),
            Value::from(NaiveDate::from_ymd_opt(2023, 1, 31).unwrap())
        );
        assert!(apply(&Temporal, "+2時間", date).is_err());
    }

    #[test]
    fn lines_and_spaces() {
        let text = Value::from("first\nsecond\r\nthird");
        assert_eq!(apply(&Line, "line2", text.clone()).unwrap(), Value::from("second"));
        assert_eq!(apply(&Line, "line4", text).unwrap(), Value::from(""));
        assert_eq!(
            apply(&NoBreak, "noBreak", Value::from("a  b\n c")).unwrap(),
            Value::from("a\u{3000}b\u{3000}c")
        );
    }
}
