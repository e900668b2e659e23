//! Document block state machine.
//!
//! The walker visits every paragraph of the document in order. A paragraph
//! carrying a region start resolves the directive in its note and opens a
//! [`Block`]. While it is open, visited paragraphs are left alone (a Replace
//! block rewrites them in place), and the paragraph carrying the region end
//! finalizes the block. That is where the tree is actually mutated.
//!
//! Tables met while a region is open are skipped by the walk. The region end
//! evaluates them as whole containers, under the item's model context for
//! loop copies, so directives inside them still open their own regions.

use tracing::{debug, trace, warn};

use crate::context::{Context, Models};
use crate::errors::{EvalError, Result};
use crate::expression;
use crate::registry::Registry;
use crate::scanner;
use crate::tree::{Document, NodeId, Run, RunFormat};
use crate::value::Value;

const RUBY_OPEN: char = '｛';
const RUBY_CLOSE: char = '｝';
const RUBY_SIZE: f32 = 7.0;
const RUBY_COLOR: &str = "989898";
const RUBY_POSITION: i32 = 2;

const KEEP_LINE: &str = "keepLine";

/// State tied to the currently open region.
#[derive(Debug, Default)]
enum Block {
    #[default]
    Normal,
    If { condition: bool, start: NodeId },
    Replace { value: Value, start: NodeId },
    Loop { items: Vec<Value>, start: NodeId },
    LoopInCell { items: Vec<Value>, keep_line: bool, start: NodeId },
    TableRowLoop { items: Vec<Value>, start_row: NodeId },
}

impl Block {
    fn name(&self) -> &'static str {
        match self {
            Block::Normal => "normal",
            Block::If { .. } => "if",
            Block::Replace { .. } => "replace",
            Block::Loop { .. } => "loop",
            Block::LoopInCell { .. } => "loop-in-cell",
            Block::TableRowLoop { .. } => "table-row-loop",
        }
    }
}

/// Evaluate every region and placeholder of `document` against `models`.
///
/// The document is mutated in place and handed back. Region markers are
/// consumed: evaluating the result again only re-scans its text.
pub fn evaluate<'d>(
    document: &'d mut Document,
    registry: &Registry,
    context: &Context,
    models: &Models,
) -> Result<&'d mut Document> {
    // digits are converted after style marks are stripped, never inside them
    let vertical = context.vertical || document.vertical;
    let context = Context {
        vertical: false,
        ..context.clone()
    };
    let mut machine = Machine {
        doc: &mut *document,
        registry,
        context: &context,
        models,
        vertical,
        block: Block::Normal,
    };
    machine.run()?;
    document.clear_markers();
    Ok(document)
}

/// Evaluate a fresh copy of `template` per model and concatenate the results,
/// each copy after the first starting on a new page.
///
/// Every copy resolves against its own model followed by `additions`. Without
/// models the template is returned untouched.
pub fn evaluate_and_merge(
    template: &Document,
    registry: &Registry,
    context: &Context,
    models: &[Value],
    additions: &Models,
) -> Result<Document> {
    let mut merged: Option<Document> = None;
    for (index, model) in models.iter().enumerate() {
        debug!(index, "evaluating merged copy");
        let mut copy = template.clone();
        let scoped = Models::single(model.clone()).chain(additions);
        evaluate(&mut copy, registry, context, &scoped)?;
        match merged.as_mut() {
            Some(doc) => doc.append(&copy),
            None => merged = Some(copy),
        }
    }
    Ok(merged.unwrap_or_else(|| template.clone()))
}

struct Machine<'a> {
    doc: &'a mut Document,
    registry: &'a Registry,
    context: &'a Context,
    models: &'a Models,
    vertical: bool,
    block: Block,
}

impl Machine<'_> {
    fn run(&mut self) -> Result<()> {
        let models = self.models;
        for part in self.doc.parts() {
            self.walk(part, models)?;
        }
        match &self.block {
            Block::Normal => Ok(()),
            open => Err(EvalError::Structure(format!("{} region is never closed", open.name()))),
        }
    }

    /// Visit the paragraphs and tables of a part or a cell.
    fn walk(&mut self, container: NodeId, models: &Models) -> Result<()> {
        for child in self.doc.children(container).to_vec() {
            if !self.doc.is_connected(child) {
                trace!(?child, "skipping node removed by an enclosing region");
                continue;
            }
            if self.doc.is_paragraph(child) {
                self.paragraph(child, models)?;
            } else if self.doc.is_table(child) {
                if matches!(self.block, Block::Normal) {
                    self.table(child, models)?;
                } else {
                    debug!(?child, block = self.block.name(), "table left to the open region");
                }
            }
        }
        Ok(())
    }

    fn table(&mut self, table: NodeId, models: &Models) -> Result<()> {
        for row in self.doc.rows(table) {
            for cell in self.doc.cells(row) {
                self.walk(cell, models)?;
            }
        }
        Ok(())
    }

    /// Walk a table the enclosing region deferred. Any region opened inside
    /// it has to close inside it.
    fn deferred_table(&mut self, table: NodeId, models: &Models) -> Result<()> {
        trace!(?table, "evaluating table deferred by its region");
        self.table(table, models)?;
        match &self.block {
            Block::Normal => Ok(()),
            open => Err(EvalError::Structure(format!(
                "{} region opened in a table is never closed there",
                open.name()
            ))),
        }
    }

    fn paragraph(&mut self, paragraph: NodeId, models: &Models) -> Result<()> {
        let Some(para) = self.doc.paragraph(paragraph) else {
            return Ok(());
        };
        let directive = para.region_start().map(str::to_string);
        let ends = para.has_region_end();

        if let Some(directive) = directive {
            self.start(paragraph, &directive, models)?;
        }
        self.process(paragraph, models)?;
        if ends {
            self.end(paragraph, models)?;
        }
        Ok(())
    }

    /// Resolve the directive and pick the block for the region.
    fn start(&mut self, paragraph: NodeId, directive: &str, models: &Models) -> Result<()> {
        if !matches!(self.block, Block::Normal) {
            return Err(EvalError::NestedRegion { directive: directive.to_string() });
        }

        let (condition, command) = directive.split_once('#').unwrap_or((directive, ""));
        let value = expression::resolve(self.registry, self.context, condition, models)?;

        self.block = match value {
            Value::List(items) => match self.doc.enclosing_cell(paragraph) {
                Some(cell) if self.doc.paragraphs(cell).first() == Some(&paragraph) => {
                    let start_row = self
                        .doc
                        .parent(cell)
                        .ok_or_else(|| EvalError::Structure("table cell outside of a row".into()))?;
                    Block::TableRowLoop { items, start_row }
                }
                Some(_) => Block::LoopInCell {
                    items,
                    keep_line: command.trim() == KEEP_LINE,
                    start: paragraph,
                },
                None => Block::Loop { items, start: paragraph },
            },
            Value::Bool(condition) => Block::If { condition, start: paragraph },
            value if matches!(self.doc.text(paragraph).as_str(), "$" | "{$}") => Block::Replace { value, start: paragraph },
            value => Block::If { condition: value.is_truthy(), start: paragraph },
        };
        debug!(directive, block = self.block.name(), "region start");
        Ok(())
    }

    fn process(&mut self, paragraph: NodeId, models: &Models) -> Result<()> {
        match &self.block {
            Block::Normal => self.substitute(paragraph, models),
            Block::Replace { value, .. } => {
                let text = value.to_text();
                self.replace(paragraph, text);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn end(&mut self, paragraph: NodeId, models: &Models) -> Result<()> {
        let block = std::mem::take(&mut self.block);
        debug!(block = block.name(), "region end");
        match block {
            Block::Normal => {
                warn!(?paragraph, "region end without a matching start");
                Ok(())
            }
            Block::Replace { start, .. } => {
                // paragraphs were rewritten on the way, tables are still pending
                for node in self.sibling_range(start, paragraph)? {
                    if self.doc.is_table(node) {
                        self.deferred_table(node, models)?;
                    }
                }
                Ok(())
            }
            Block::If { condition, start } => self.finish_if(condition, start, paragraph, models),
            Block::Loop { items, start } => {
                let range = self.sibling_range(start, paragraph)?;
                self.repeat(&items, &range)
            }
            Block::LoopInCell { items, keep_line, start } => {
                let cell = self.doc.parent(start);
                let range = self.sibling_range(start, paragraph)?;
                self.repeat(&items, &range)?;
                if let (true, Some(cell)) = (keep_line, cell) {
                    self.trim_blank_lines(cell, items.len().saturating_sub(1));
                }
                Ok(())
            }
            Block::TableRowLoop { items, start_row } => {
                let end_row = self
                    .doc
                    .enclosing_cell(paragraph)
                    .and_then(|cell| self.doc.parent(cell))
                    .ok_or_else(|| EvalError::Structure("row loop must end inside a table cell".into()))?;
                let rows = self.sibling_range(start_row, end_row)?;
                self.repeat(&items, &rows)
            }
        }
    }

    fn finish_if(&mut self, condition: bool, start: NodeId, end: NodeId, models: &Models) -> Result<()> {
        let range = self.sibling_range(start, end)?;
        if condition {
            return range.iter().try_for_each(|node| self.expand(*node, models));
        }

        // a cell keeps its paragraphs, only their text goes
        let in_cell = self.doc.enclosing_cell(start).is_some();
        for node in range {
            if in_cell && self.doc.is_paragraph(node) {
                if let Some(para) = self.doc.paragraph_mut(node) {
                    para.clear_text();
                }
            } else {
                self.doc.remove(node);
            }
        }
        Ok(())
    }

    /// Siblings from `start` through `end`, both included.
    fn sibling_range(&self, start: NodeId, end: NodeId) -> Result<Vec<NodeId>> {
        let parent = self.doc.parent(start);
        if parent.is_none() || parent != self.doc.parent(end) {
            return Err(EvalError::Structure(format!(
                "region starting at {start:?} ends at {end:?} in another container"
            )));
        }
        match (self.doc.position(start), self.doc.position(end)) {
            (Some(from), Some(to)) if from <= to => {
                let parent = parent.ok_or_else(|| EvalError::Structure("detached region".into()))?;
                Ok(self.doc.children(parent)[from..=to].to_vec())
            }
            _ => Err(EvalError::Structure(format!("region end {end:?} precedes its start {start:?}"))),
        }
    }

    /// Insert one substituted copy of `range` per item before the range, then
    /// drop the template nodes.
    fn repeat(&mut self, items: &[Value], range: &[NodeId]) -> Result<()> {
        let Some(&anchor) = range.first() else {
            return Ok(());
        };
        debug!(items = items.len(), nodes = range.len(), "repeating region");
        for item in items {
            let narrowed = Models::single(item.clone());
            for node in range {
                let copy = self.doc.deep_copy(*node);
                self.doc.insert_before(anchor, copy)?;
                self.expand(copy, &narrowed)?;
            }
        }
        for node in range {
            self.doc.remove(*node);
        }
        Ok(())
    }

    /// Drop up to `times` blank paragraphs from the end of a cell.
    fn trim_blank_lines(&mut self, cell: NodeId, times: usize) {
        for _ in 0..times {
            match self.doc.paragraphs(cell).last() {
                Some(&last) if self.doc.text(last).is_empty() => self.doc.remove(last),
                _ => break,
            }
        }
    }

    /// Finish a node of a closed region. Its own paragraphs (and the cells of
    /// repeated rows) are substituted with their markers ignored; tables are
    /// walked like any other container.
    fn expand(&mut self, node: NodeId, models: &Models) -> Result<()> {
        if self.doc.is_paragraph(node) {
            return self.substitute(node, models);
        }
        if self.doc.is_table(node) {
            return self.deferred_table(node, models);
        }
        for child in self.doc.children(node).to_vec() {
            self.expand(child, models)?;
        }
        Ok(())
    }

    /// Run every text run of the paragraph through placeholders, style marks
    /// and ruby splitting.
    fn substitute(&mut self, paragraph: NodeId, models: &Models) -> Result<()> {
        let Some(runs) = self.doc.paragraph(paragraph).map(|p| p.runs.clone()) else {
            return Ok(());
        };
        let cell = self.doc.enclosing_cell(paragraph);
        let registry = self.registry;
        let styles = registry.styles();

        let mut out = Vec::with_capacity(runs.len());
        for run in runs {
            let scanned = scanner::apply(registry, self.context, &run.text, models)?;
            let cell_format = cell.and_then(|c| self.doc.cell_format_mut(c));
            let text = styles.apply_cell_marks(&scanned, cell_format);
            let mut format = run.format.clone();
            let text = styles.apply_run_mark(text, &mut format);
            let text = if self.vertical {
                scanner::verticalize(text)
            } else {
                text.to_string()
            };
            split_ruby(&text, Run { format, ..run }, &mut out);
        }

        if let Some(para) = self.doc.paragraph_mut(paragraph) {
            para.runs = out;
        }
        Ok(())
    }

    /// Keep one carrier run and write `text` into it.
    fn replace(&mut self, paragraph: NodeId, text: String) {
        let Some(para) = self.doc.paragraph_mut(paragraph) else {
            return;
        };
        let carrier = para.runs.iter().position(|r| r.text.contains('$')).unwrap_or(0);
        let mut run = if para.runs.is_empty() {
            Run::default()
        } else {
            para.runs.swap_remove(carrier)
        };
        run.text = text;
        para.runs = vec![run];
    }
}

/// Push `run` with `text`, splitting every `base｛ruby｝` into a base run and a
/// small raised annotation run.
fn split_ruby(text: &str, run: Run, out: &mut Vec<Run>) {
    let mut rest = text;
    while let Some(open) = rest.find(RUBY_OPEN) {
        let after_open = open + RUBY_OPEN.len_utf8();
        let Some(close) = rest[after_open..].find(RUBY_CLOSE).map(|i| after_open + i) else {
            break;
        };
        out.push(Run {
            text: rest[..open].to_string(),
            format: run.format.clone(),
            media: None,
        });
        out.push(Run {
            text: rest[after_open..close].to_string(),
            format: RunFormat {
                size: Some(RUBY_SIZE),
                color: Some(RUBY_COLOR.to_string()),
                position: Some(RUBY_POSITION),
                ..run.format.clone()
            },
            media: None,
        });
        rest = &rest[close + RUBY_CLOSE.len_utf8()..];
    }
    out.push(Run {
        text: rest.to_string(),
        ..run
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Marker, Paragraph};
    use pretty_assertions::assert_eq;

    fn regioned(text: &str, start: Option<&str>, end: bool) -> Paragraph {
        let mut para = Paragraph::new(text);
        if let Some(note) = start {
            para.markers.push(Marker::Start { id: 0, note: note.into() });
        }
        if end {
            para.markers.push(Marker::End { id: 0 });
        }
        para
    }

    #[test]
    fn ruby_splits_into_annotation_runs() {
        let mut out = Vec::new();
        split_ruby("東京｛とうきょう｝駅", Run::new(""), &mut out);
        let texts: Vec<_> = out.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["東京", "とうきょう", "駅"]);
        assert_eq!(out[1].format.size, Some(7.0));
        assert_eq!(out[1].format.color.as_deref(), Some("989898"));
        assert_eq!(out[1].format.position, Some(2));
        assert_eq!(out[2].format, RunFormat::default());
    }

    #[test]
    fn unclosed_ruby_stays_in_the_text() {
        let mut out = Vec::new();
        split_ruby("a｛b", Run::new(""), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "a｛b");
    }

    #[test]
    fn replace_keeps_a_single_carrier() {
        let mut doc = Document::new();
        let body = doc.body();
        let mut para = Paragraph::from_runs(["{", "$", "}"]);
        para.markers.push(Marker::Start { id: 0, note: "total".into() });
        para.markers.push(Marker::End { id: 0 });
        let p = doc.add_paragraph(body, para);

        let models = Models::single(serde_json::json!({ "total": 42 }));
        evaluate(&mut doc, &Registry::with_builtins(), &Context::default(), &models).unwrap();

        let runs = &doc.paragraph(p).unwrap().runs;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "42");
    }

    #[test]
    fn region_must_close_in_its_own_container() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.add_paragraph(body, regioned("x", Some("flag"), false));
        let table = doc.add_table(body);
        let row = doc.add_row(table);
        let cell = doc.add_cell(row, Default::default());
        doc.add_paragraph(cell, regioned("y", None, true));

        let models = Models::single(serde_json::json!({ "flag": true }));
        let err = evaluate(&mut doc, &Registry::with_builtins(), &Context::default(), &models).unwrap_err();
        assert!(matches!(err, EvalError::Structure(_)));
    }
}
