use std::fmt;
use std::sync::Arc;

use crate::tree::{CellFormat, RunFormat};

pub(crate) const RUN_PREFIX: &str = "DOCMERGE_RUN_STYLE_";
pub(crate) const CELL_PREFIX: &str = "DOCMERGE_CELL_STYLE_";
const ID_WIDTH: usize = 6;

pub type RunStyling = Arc<dyn Fn(&mut RunFormat) + Send + Sync>;
pub type CellStyling = Arc<dyn Fn(&mut CellFormat) + Send + Sync>;

/// Handle returned when a style callback is registered. Its `Display` form is
/// the hidden sentinel a model prepends to a value to request the style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleMark {
    prefix: &'static str,
    id: usize,
}

impl fmt::Display for StyleMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.id, width = ID_WIDTH)
    }
}

impl StyleMark {
    /// Prefix `text` with this mark.
    pub fn wrap(&self, text: impl fmt::Display) -> String {
        format!("{self}{text}")
    }
}

#[derive(Clone, Default)]
pub(crate) struct Styles {
    runs: Vec<RunStyling>,
    cells: Vec<CellStyling>,
}

impl Styles {
    pub fn add_run(&mut self, styling: RunStyling) -> StyleMark {
        self.runs.push(styling);
        StyleMark { prefix: RUN_PREFIX, id: self.runs.len() - 1 }
    }

    pub fn add_cell(&mut self, styling: CellStyling) -> StyleMark {
        self.cells.push(styling);
        StyleMark { prefix: CELL_PREFIX, id: self.cells.len() - 1 }
    }

    /// Strip every leading cell mark, applying each callback to `cell` when the
    /// text lives inside a table cell.
    pub fn apply_cell_marks<'t>(&self, mut text: &'t str, mut cell: Option<&mut CellFormat>) -> &'t str {
        while let Some((id, rest)) = split_mark(text, CELL_PREFIX) {
            match (self.cells.get(id), cell.as_deref_mut()) {
                (Some(styling), Some(format)) => styling(format),
                (None, _) => tracing::warn!(id, "unknown cell style mark"),
                (Some(_), None) => tracing::debug!(id, "cell style mark outside of a table cell"),
            }
            text = rest;
        }
        text
    }

    /// Strip one leading run mark, applying its callback to `format`.
    pub fn apply_run_mark<'t>(&self, text: &'t str, format: &mut RunFormat) -> &'t str {
        match split_mark(text, RUN_PREFIX) {
            Some((id, rest)) => {
                match self.runs.get(id) {
                    Some(styling) => styling(format),
                    None => tracing::warn!(id, "unknown run style mark"),
                }
                rest
            }
            None => text,
        }
    }
}

fn split_mark<'t>(text: &'t str, prefix: &str) -> Option<(usize, &'t str)> {
    let rest = text.strip_prefix(prefix)?;
    let digits = rest.get(..ID_WIDTH)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = digits.parse().ok()?;
    Some((id, &rest[ID_WIDTH..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_render_with_fixed_width_ids() {
        let mut styles = Styles::default();
        styles.add_run(Arc::new(|_| {}));
        let mark = styles.add_run(Arc::new(|f| f.bold = true));
        assert_eq!(mark.to_string(), "DOCMERGE_RUN_STYLE_000001");
        assert_eq!(mark.wrap("x"), "DOCMERGE_RUN_STYLE_000001x");
    }

    #[test]
    fn run_mark_is_stripped_and_applied() {
        let mut styles = Styles::default();
        let mark = styles.add_run(Arc::new(|f| f.bold = true));
        let mut format = RunFormat::default();
        let text = mark.wrap("bold text");
        assert_eq!(styles.apply_run_mark(&text, &mut format), "bold text");
        assert!(format.bold);
    }

    #[test]
    fn cell_marks_stack() {
        let mut styles = Styles::default();
        let shade = styles.add_cell(Arc::new(|c| c.shading = Some("FF0000".into())));
        let center = styles.add_cell(Arc::new(|c| c.vertical_align = Some("center".into())));
        let text = format!("{shade}{center}value");
        let mut cell = CellFormat::default();
        assert_eq!(styles.apply_cell_marks(&text, Some(&mut cell)), "value");
        assert_eq!(cell.shading.as_deref(), Some("FF0000"));
        assert_eq!(cell.vertical_align.as_deref(), Some("center"));
    }
}
