// src/parser.rs
use crate::errors::{EvalError, Result};

/// Characters that start an operator segment (`age+1`, `date-3day`, ...).
const OPERATORS: &[char] = &['+', '-', '*', '/', '%', '#', '&', '!', '=', '<', '>', '?', '@'];

/// A method invocation segment such as `sum(1, 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    /// Split a path expression into its segments.
    ///
    /// Whitespace outside argument lists never matters. A dot separates
    /// segments unless it sits in an argument list or is the decimal point of
    /// an operator literal. An operator character directly after an operand
    /// starts a new segment, so `order.total * 1.1` reads as
    /// `["order", "total", "*1.1"]`.
    pub fn split_path(mut self) -> Vec<String> {
        let mut parts = Vec::new();
        let mut part = String::new();
        let mut in_operator = false;
        let mut depth = 0usize;

        while let Some(c) = self.next_char() {
            if depth > 0 {
                match c {
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
                part.push(c);
                continue;
            }
            if c.is_whitespace() {
                in_operator = false;
                continue;
            }
            match c {
                '(' => {
                    depth += 1;
                    in_operator = false;
                    part.push(c);
                }
                '.' => {
                    in_operator = false;
                    let decimal_point = part.starts_with(OPERATORS)
                        && self.peek_char().is_some_and(|n| n.is_ascii_digit());
                    if decimal_point {
                        part.push(c);
                    } else {
                        parts.push(std::mem::take(&mut part));
                    }
                }
                c if OPERATORS.contains(&c) => {
                    if !in_operator {
                        in_operator = true;
                        parts.push(std::mem::take(&mut part));
                    }
                    part.push(c);
                }
                _ => {
                    in_operator = false;
                    part.push(c);
                }
            }
        }
        parts.push(part);

        // A leading operator produces an empty first segment; drop empties
        // that are artifacts of splitting rather than of the author's text.
        if parts.len() > 1 && parts[0].is_empty() {
            parts.remove(0);
        }
        parts
    }

    /// Parse `name` or `name(arg, arg, ...)`.
    pub fn parse_call(mut self) -> Result<Call<'a>> {
        self.skip_ws();
        let name = self.capture_while(|c| c != '(' && c != ')');
        let name = name.trim();
        if name.is_empty() {
            return Err(EvalError::Parse(format!("method name expected in [{}]", self.s)));
        }
        self.skip_ws();
        if self.eof() {
            return Ok(Call { name, args: Vec::new() });
        }
        self.expect('(')?;
        let inner = self.capture_until_last(')')?;
        self.expect(')')?;
        self.skip_ws();
        if !self.eof() {
            return Err(EvalError::Parse(format!("trailing input after [{}]", self.s)));
        }
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(str::trim).collect()
        };
        Ok(Call { name, args })
    }

    fn capture_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if !keep(c) {
                break;
            }
            self.i += c.len_utf8();
        }
        &self.s[start..self.i]
    }

    fn capture_until_last(&mut self, end: char) -> Result<&'a str> {
        let rest = &self.s[self.i..];
        match rest.rfind(end) {
            Some(offset) => {
                let start = self.i;
                self.i += offset;
                Ok(&self.s[start..self.i])
            }
            None => Err(EvalError::Parse(format!("expected '{end}' in [{}]", self.s))),
        }
    }

    pub fn expect(&mut self, c: char) -> Result<()> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(EvalError::Parse(format!("expected '{}' in [{}]", c, self.s)))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.i += c.len_utf8();
        Some(c)
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(expr: &str) -> Vec<String> {
        Parser::new(expr).split_path()
    }

    #[test]
    fn dotted_paths_ignore_whitespace() {
        assert_eq!(split(" 1 . name "), vec!["1", "name"]);
        assert_eq!(split("order.items.2.name"), vec!["order", "items", "2", "name"]);
    }

    #[test]
    fn operators_open_new_segments() {
        assert_eq!(split("age + 1 * 10"), vec!["age", "+1", "*10"]);
        assert_eq!(split("age * 1.1"), vec!["age", "*1.1"]);
        assert_eq!(split("time - 10min"), vec!["time", "-10min"]);
    }

    #[test]
    fn arguments_keep_their_dots() {
        assert_eq!(split("scale(1.5).label"), vec!["scale(1.5)", "label"]);
        assert_eq!(split("items.1~3"), vec!["items", "1~3"]);
    }

    #[test]
    fn calls_split_arguments() {
        let call = Parser::new("sum( 1 , 2 )").parse_call().unwrap();
        assert_eq!(call, Call { name: "sum", args: vec!["1", "2"] });
        let call = Parser::new("text").parse_call().unwrap();
        assert_eq!(call, Call { name: "text", args: vec![] });
        assert!(Parser::new("sum(1").parse_call().is_err());
    }
}
