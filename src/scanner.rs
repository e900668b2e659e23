// src/scanner.rs
use tracing::warn;

use crate::context::{Context, Models};
use crate::errors::Result;
use crate::expression;
use crate::registry::Registry;

const KANJI_DIGITS: [char; 10] = ['〇', '一', '二', '三', '四', '五', '六', '七', '八', '九'];

/// Replace every `{expression}` in `text` with its stringified value.
///
/// Braces must balance within one call. An unterminated `{` is kept
/// literally together with the fragment that follows it, and a `}` outside a
/// placeholder is ordinary text.
pub fn apply(registry: &Registry, context: &Context, text: &str, models: &Models) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut open: Option<String> = None;

    for c in text.chars() {
        let Some(expr) = open.as_mut() else {
            match c {
                '{' => open = Some(String::new()),
                c => out.push(c),
            }
            continue;
        };
        match c {
            // a second `{` abandons the fragment opened so far
            '{' => {
                out.push('{');
                out.push_str(expr);
                expr.clear();
            }
            '}' => {
                let value = expression::resolve(registry, context, expr.as_str(), models)?;
                out.push_str(&value.to_text());
                open = None;
            }
            c => expr.push(c),
        }
    }

    if let Some(fragment) = open {
        warn!(fragment = %fragment, file = ?context.file_name, "unterminated placeholder");
        out.push('{');
        out.push_str(&fragment);
    }

    Ok(if context.vertical { verticalize(&out) } else { out })
}

/// Render ASCII and full-width digits as kanji numerals.
pub fn verticalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '0'..='9' => KANJI_DIGITS[c as usize - '0' as usize],
            '０'..='９' => KANJI_DIGITS[c as usize - '０' as usize],
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Constants;
    use crate::value::Value;
    use indexmap::IndexMap;
    use proptest::prelude::*;

    fn person() -> Models {
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::from("one"));
        map.insert("age".to_string(), Value::from(1));
        Models::single(Value::Map(map))
    }

    fn scan(text: &str) -> String {
        apply(&Registry::with_builtins(), &Context::default(), text, &person()).unwrap()
    }

    #[test]
    fn substitutes_placeholders_in_place() {
        assert_eq!(scan("Dear {name}, you are {age + 1}."), "Dear one, you are 2.");
    }

    #[test]
    fn unbalanced_braces_stay_literal() {
        assert_eq!(scan("total } {name"), "total } {name");
        assert_eq!(scan("{{name}"), "{one");
    }

    #[test]
    fn variables_are_scanned() {
        let mut registry = Registry::with_builtins();
        registry.register_variable(Constants::new().with("company", "ACME"));
        let out = apply(&registry, &Context::default(), "{$company}", &Models::default()).unwrap();
        assert_eq!(out, "ACME");
    }

    #[test]
    fn vertical_mode_converts_digits() {
        let context = Context::default().vertical(true);
        let out = apply(&Registry::new(), &context, "123", &Models::default()).unwrap();
        assert_eq!(out, "一二三");
        assert_eq!(verticalize("第１０号"), "第一〇号");
    }

    proptest! {
        #[test]
        fn text_without_braces_is_unchanged(text in "[^{}]*") {
            prop_assert_eq!(scan(&text), text);
        }

        #[test]
        fn verticalize_leaves_no_ascii_digits(text in "\\PC*") {
            prop_assert!(!verticalize(&text).chars().any(|c| c.is_ascii_digit()));
        }
    }
}
