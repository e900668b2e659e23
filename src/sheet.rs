//! Spreadsheet templates.
//!
//! A sheet cell carrying a note is a formula cell: the note text goes through
//! the placeholder scanner, the result becomes the cell value and the note is
//! dropped. Cells without a note are left alone.
//!
//! ```json
//! { "name": "invoice", "rows": [[{ "value": "Total" }, { "note": "{total}" }]] }
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{Context, Models};
use crate::errors::Result;
use crate::registry::Registry;
use crate::scanner;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sheet {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub rows: Vec<Vec<SheetCell>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetCell {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SheetCell {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), note: None }
    }

    pub fn noted(note: impl Into<String>) -> Self {
        Self { value: String::new(), note: Some(note.into()) }
    }
}

/// Fill every noted cell of `sheet` with its evaluated note.
///
/// Digits are never verticalized here, whatever the context says.
pub fn calculate<'s>(
    sheet: &'s mut Sheet,
    registry: &Registry,
    context: &Context,
    models: &Models,
) -> Result<&'s mut Sheet> {
    let context = Context {
        vertical: false,
        ..context.clone()
    };
    for (row, cells) in sheet.rows.iter_mut().enumerate() {
        for (column, cell) in cells.iter_mut().enumerate() {
            let Some(note) = cell.note.take() else {
                continue;
            };
            debug!(cell = %address(row, column), "calculating noted cell");
            cell.value = scanner::apply(registry, &context, note.trim(), models)?;
        }
    }
    Ok(sheet)
}

/// `A1`-style name of a zero-based cell position.
pub fn address(row: usize, column: usize) -> String {
    let mut letters = Vec::new();
    let mut n = column + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn addresses() {
        assert_eq!(address(0, 0), "A1");
        assert_eq!(address(4, 25), "Z5");
        assert_eq!(address(0, 26), "AA1");
        assert_eq!(address(9, 701), "ZZ10");
        assert_eq!(address(0, 702), "AAA1");
    }

    #[test]
    fn noted_cells_take_their_evaluated_note() {
        let mut sheet = Sheet {
            name: "invoice".into(),
            rows: vec![
                vec![SheetCell::new("Customer"), SheetCell::noted("  {customer.name} 様 ")],
                vec![SheetCell::new("Total"), SheetCell::noted("{total + 10}")],
            ],
        };
        let models = Models::single(json!({ "customer": { "name": "one" }, "total": 100 }));
        calculate(&mut sheet, &Registry::with_builtins(), &Context::default(), &models).unwrap();

        assert_eq!(sheet.rows[0], vec![SheetCell::new("Customer"), SheetCell::new("one 様")]);
        assert_eq!(sheet.rows[1][1], SheetCell::new("110"));
    }

    #[test]
    fn reads_the_json_shape() {
        let sheet: Sheet = serde_json::from_value(json!({
            "rows": [[{ "value": "Total" }, { "note": "{total}" }], []]
        }))
        .unwrap();
        assert_eq!(sheet.rows[0][1], SheetCell::noted("{total}"));
        assert!(sheet.rows[1].is_empty());
    }
}
