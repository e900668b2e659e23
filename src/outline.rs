//! JSON outline of a document tree.
//!
//! The outline is the exchange format of the CLI: a template is read from it
//! and the evaluated document is written back in the same shape.
//!
//! ```json
//! {
//!   "body": [
//!     { "type": "paragraph", "runs": [{ "text": "Dear {name}" }] },
//!     { "type": "table", "rows": [{ "cells": [{ "content": [] }] }] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::tree::{CellFormat, Document, NodeId, NodeKind, Paragraph};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub vertical: bool,
    pub body: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Vec<Content>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub footers: Vec<Vec<Content>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Paragraph(Paragraph),
    Table { rows: Vec<RowOutline> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowOutline {
    pub cells: Vec<CellOutline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellOutline {
    #[serde(skip_serializing_if = "is_plain_cell")]
    pub format: CellFormat,
    pub content: Vec<Content>,
}

fn is_plain_cell(format: &CellFormat) -> bool {
    *format == CellFormat::default()
}

impl Document {
    pub fn from_outline(outline: &Outline) -> Self {
        let mut doc = Document::new();
        doc.vertical = outline.vertical;
        let body = doc.body();
        doc.build(body, &outline.body);
        for header in &outline.headers {
            let part = doc.add_header();
            doc.build(part, header);
        }
        for footer in &outline.footers {
            let part = doc.add_footer();
            doc.build(part, footer);
        }
        doc
    }

    pub fn to_outline(&self) -> Outline {
        Outline {
            vertical: self.vertical,
            body: self.describe(self.body()),
            headers: self.headers().iter().map(|h| self.describe(*h)).collect(),
            footers: self.footers().iter().map(|f| self.describe(*f)).collect(),
        }
    }

    fn build(&mut self, container: NodeId, contents: &[Content]) {
        for content in contents {
            match content {
                Content::Paragraph(paragraph) => {
                    self.add_paragraph(container, paragraph.clone());
                }
                Content::Table { rows } => {
                    let table = self.add_table(container);
                    for row in rows {
                        let row_id = self.add_row(table);
                        for cell in &row.cells {
                            let cell_id = self.add_cell(row_id, cell.format.clone());
                            self.build(cell_id, &cell.content);
                        }
                    }
                }
            }
        }
    }

    fn describe(&self, container: NodeId) -> Vec<Content> {
        self.children(container)
            .iter()
            .filter_map(|child| match self.kind(*child) {
                NodeKind::Paragraph(p) => Some(Content::Paragraph(p.clone())),
                NodeKind::Table => Some(Content::Table {
                    rows: self
                        .rows(*child)
                        .into_iter()
                        .map(|row| RowOutline {
                            cells: self
                                .cells(row)
                                .into_iter()
                                .map(|cell| CellOutline {
                                    format: self.cell_format(cell).cloned().unwrap_or_default(),
                                    content: self.describe(cell),
                                })
                                .collect(),
                        })
                        .collect(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Marker;
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = r#"{
        "body": [
            { "type": "paragraph", "runs": [{ "text": "Dear " }, { "text": "{name}", "format": { "bold": true } }] },
            { "type": "table", "rows": [
                { "cells": [
                    { "format": { "shading": "EEEEEE" }, "content": [
                        { "type": "paragraph", "runs": [{ "text": "{1.name}" }],
                          "markers": [{ "start": { "id": 0, "note": "items" } }, { "end": { "id": 0 } }] }
                    ] }
                ] }
            ] }
        ],
        "footers": [[{ "type": "paragraph", "runs": [{ "text": "page" }] }]]
    }"#;

    #[test]
    fn outline_builds_the_tree() {
        let outline: Outline = serde_json::from_str(TEMPLATE).unwrap();
        let doc = Document::from_outline(&outline);

        let body = doc.children(doc.body());
        assert_eq!(body.len(), 2);
        assert_eq!(doc.text(body[0]), "Dear {name}");
        assert!(doc.is_table(body[1]));

        let cell = doc.cells(doc.rows(body[1])[0])[0];
        assert_eq!(doc.cell_format(cell).unwrap().shading.as_deref(), Some("EEEEEE"));
        let para = doc.paragraphs(cell)[0];
        assert_eq!(
            doc.paragraph(para).unwrap().markers,
            vec![Marker::Start { id: 0, note: "items".into() }, Marker::End { id: 0 }]
        );
        assert_eq!(doc.footers().len(), 1);
    }

    #[test]
    fn outline_survives_a_trip_through_the_tree() {
        let outline: Outline = serde_json::from_str(TEMPLATE).unwrap();
        assert_eq!(Document::from_outline(&outline).to_outline(), outline);
    }
}
