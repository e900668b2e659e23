//! Arena-backed document tree.
//!
//! Nodes live in one vector and refer to each other by [`NodeId`]. Parent and
//! child relations are index lists, so removing a node only detaches it: the
//! slot stays allocated and any handle to it keeps working, but the node is no
//! longer [connected](Document::is_connected) to a part of the document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{EvalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Body,
    Header,
    Footer,
}

/// Character formatting of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunFormat {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strike: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    /// Font size in points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Baseline shift in half points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

/// A run of uniformly formatted text, optionally carrying embedded media.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "is_plain")]
    pub format: RunFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

fn is_plain(format: &RunFormat) -> bool {
    *format == RunFormat::default()
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Region boundary attached to a paragraph. The note of a start marker holds
/// the merge directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Start { id: u32, note: String },
    End { id: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub page_break: bool,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::new(text)],
            ..Self::default()
        }
    }

    pub fn from_runs<I, S>(runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runs: runs.into_iter().map(Run::new).collect(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Directive of the first region starting here.
    pub fn region_start(&self) -> Option<&str> {
        self.markers.iter().find_map(|m| match m {
            Marker::Start { note, .. } => Some(note.as_str()),
            Marker::End { .. } => None,
        })
    }

    pub fn has_region_end(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::End { .. }))
    }

    pub fn clear_text(&mut self) {
        for run in &mut self.runs {
            run.text.clear();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Part(PartKind),
    Paragraph(Paragraph),
    Table,
    Row,
    Cell(CellFormat),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    headers: Vec<NodeId>,
    footers: Vec<NodeId>,
    /// Top-to-bottom text direction; digits are rendered as kanji numerals.
    pub vertical: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
            headers: Vec::new(),
            footers: Vec::new(),
            vertical: false,
        };
        doc.body = doc.alloc(NodeKind::Part(PartKind::Body));
        doc
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node { kind, parent: None, children: Vec::new() });
        NodeId(self.nodes.len() - 1)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        child
    }

    // ---- parts ----

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn headers(&self) -> &[NodeId] {
        &self.headers
    }

    pub fn footers(&self) -> &[NodeId] {
        &self.footers
    }

    pub fn add_header(&mut self) -> NodeId {
        let id = self.alloc(NodeKind::Part(PartKind::Header));
        self.headers.push(id);
        id
    }

    pub fn add_footer(&mut self) -> NodeId {
        let id = self.alloc(NodeKind::Part(PartKind::Footer));
        self.footers.push(id);
        id
    }

    /// Every part in walk order: body, headers, footers.
    pub fn parts(&self) -> Vec<NodeId> {
        std::iter::once(self.body)
            .chain(self.headers.iter().copied())
            .chain(self.footers.iter().copied())
            .collect()
    }

    // ---- building ----

    /// Append a paragraph to a part or a cell.
    pub fn add_paragraph(&mut self, container: NodeId, paragraph: Paragraph) -> NodeId {
        debug_assert!(matches!(self.kind(container), NodeKind::Part(_) | NodeKind::Cell(_)));
        let id = self.alloc(NodeKind::Paragraph(paragraph));
        self.append_child(container, id)
    }

    /// Append an empty table to a part or a cell.
    pub fn add_table(&mut self, container: NodeId) -> NodeId {
        debug_assert!(matches!(self.kind(container), NodeKind::Part(_) | NodeKind::Cell(_)));
        let id = self.alloc(NodeKind::Table);
        self.append_child(container, id)
    }

    pub fn add_row(&mut self, table: NodeId) -> NodeId {
        debug_assert!(matches!(self.kind(table), NodeKind::Table));
        let id = self.alloc(NodeKind::Row);
        self.append_child(table, id)
    }

    pub fn add_cell(&mut self, row: NodeId, format: CellFormat) -> NodeId {
        debug_assert!(matches!(self.kind(row), NodeKind::Row));
        let id = self.alloc(NodeKind::Cell(format));
        self.append_child(row, id)
    }

    // ---- inspection ----

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn paragraph(&self, id: NodeId) -> Option<&Paragraph> {
        match &self.nodes[id.0].kind {
            NodeKind::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn paragraph_mut(&mut self, id: NodeId) -> Option<&mut Paragraph> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn cell_format(&self, id: NodeId) -> Option<&CellFormat> {
        match &self.nodes[id.0].kind {
            NodeKind::Cell(f) => Some(f),
            _ => None,
        }
    }

    pub fn cell_format_mut(&mut self, id: NodeId) -> Option<&mut CellFormat> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Cell(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_paragraph(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Paragraph(_))
    }

    pub fn is_table(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Table)
    }

    /// Paragraph children of a part or a cell.
    pub fn paragraphs(&self, container: NodeId) -> Vec<NodeId> {
        self.children_where(container, |k| matches!(k, NodeKind::Paragraph(_)))
    }

    /// Table children of a part or a cell.
    pub fn tables(&self, container: NodeId) -> Vec<NodeId> {
        self.children_where(container, |k| matches!(k, NodeKind::Table))
    }

    pub fn rows(&self, table: NodeId) -> Vec<NodeId> {
        self.children_where(table, |k| matches!(k, NodeKind::Row))
    }

    pub fn cells(&self, row: NodeId) -> Vec<NodeId> {
        self.children_where(row, |k| matches!(k, NodeKind::Cell(_)))
    }

    fn children_where(&self, id: NodeId, keep: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| keep(self.kind(*c)))
            .collect()
    }

    /// Concatenated run text of a paragraph; empty for other nodes.
    pub fn text(&self, id: NodeId) -> String {
        self.paragraph(id).map(Paragraph::text).unwrap_or_default()
    }

    /// Index of `id` among its parent's children.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Whether the node is still reachable from one of the document parts.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            match (&self.nodes[current.0].kind, self.nodes[current.0].parent) {
                (NodeKind::Part(_), _) => return true,
                (_, Some(parent)) => current = parent,
                (_, None) => return false,
            }
        }
    }

    /// The cell directly containing `id`, if any.
    pub fn enclosing_cell(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id)
            .filter(|p| matches!(self.kind(*p), NodeKind::Cell(_)))
    }

    /// Every paragraph in document order, descending into tables.
    pub fn all_paragraphs(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for part in self.parts() {
            self.collect_paragraphs(part, &mut out);
        }
        out
    }

    fn collect_paragraphs(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match self.kind(id) {
            NodeKind::Paragraph(_) => out.push(id),
            _ => {
                for child in self.children(id) {
                    self.collect_paragraphs(*child, out);
                }
            }
        }
    }

    /// First paragraph whose text contains `needle`.
    pub fn paragraph_with(&self, needle: &str) -> Option<NodeId> {
        self.all_paragraphs()
            .into_iter()
            .find(|p| self.text(*p).contains(needle))
    }

    // ---- mutation ----

    /// Detached copy of a node and its whole subtree.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let children = self.nodes[id.0].children.clone();
        let copy = self.alloc(kind);
        for child in children {
            let child_copy = self.deep_copy(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Detached copy of a node owned by another document.
    fn import(&mut self, from: &Document, id: NodeId) -> NodeId {
        let copy = self.alloc(from.kind(id).clone());
        for child in from.children(id) {
            let child_copy = self.import(from, *child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        self.insert_at(anchor, node, 0)
    }

    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        self.insert_at(anchor, node, 1)
    }

    fn insert_at(&mut self, anchor: NodeId, node: NodeId, offset: usize) -> Result<()> {
        if self.parent(node).is_some() {
            return Err(EvalError::Structure(format!("{node:?} is already attached")));
        }
        let parent = self
            .parent(anchor)
            .ok_or_else(|| EvalError::Structure(format!("anchor {anchor:?} is detached")))?;
        let index = self
            .position(anchor)
            .ok_or_else(|| EvalError::Structure(format!("anchor {anchor:?} is not a child of its parent")))?;
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index + offset, node);
        Ok(())
    }

    /// Detach a node (and with it, its subtree) from the document.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Drop every region marker; a consumed template has none left.
    pub fn clear_markers(&mut self) {
        for node in &mut self.nodes {
            if let NodeKind::Paragraph(p) = &mut node.kind {
                p.markers.clear();
            }
        }
    }

    /// Append a copy of `other`'s body after this body, starting on a new page.
    pub fn append(&mut self, other: &Document) {
        let mut first = true;
        for child in other.children(other.body) {
            let copy = self.import(other, *child);
            if first {
                if let Some(p) = self.paragraph_mut(copy) {
                    p.page_break = true;
                    first = false;
                }
            }
            self.append_child(self.body, copy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(doc: &Document, container: NodeId) -> Vec<String> {
        doc.paragraphs(container).into_iter().map(|p| doc.text(p)).collect()
    }

    #[test]
    fn insert_and_remove_keep_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.add_paragraph(body, Paragraph::new("a"));
        let c = doc.add_paragraph(body, Paragraph::new("c"));
        let b = doc.deep_copy(a);
        doc.paragraph_mut(b).unwrap().runs[0].text = "b".into();
        doc.insert_after(a, b).unwrap();
        assert_eq!(texts(&doc, body), vec!["a", "b", "c"]);

        doc.remove(c);
        assert!(!doc.is_connected(c));
        assert_eq!(texts(&doc, body), vec!["a", "b"]);
        let orphan = doc.deep_copy(a);
        assert!(doc.insert_before(c, orphan).is_err());
    }

    #[test]
    fn removed_table_disconnects_its_paragraphs() {
        let mut doc = Document::new();
        let body = doc.body();
        let table = doc.add_table(body);
        let row = doc.add_row(table);
        let cell = doc.add_cell(row, CellFormat::default());
        let para = doc.add_paragraph(cell, Paragraph::new("in cell"));
        assert!(doc.is_connected(para));
        assert_eq!(doc.enclosing_cell(para), Some(cell));
        doc.remove(row);
        assert!(!doc.is_connected(para));
    }

    #[test]
    fn all_paragraphs_walks_parts_and_tables() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.add_paragraph(body, Paragraph::new("one"));
        let table = doc.add_table(body);
        let cell = {
            let row = doc.add_row(table);
            doc.add_cell(row, CellFormat::default())
        };
        doc.add_paragraph(cell, Paragraph::new("two"));
        let footer = doc.add_footer();
        doc.add_paragraph(footer, Paragraph::new("three"));

        let all: Vec<_> = doc.all_paragraphs().into_iter().map(|p| doc.text(p)).collect();
        assert_eq!(all, vec!["one", "two", "three"]);
        assert!(doc.paragraph_with("tw").is_some());
    }

    #[test]
    fn append_starts_a_new_page() {
        let mut first = Document::new();
        let body = first.body();
        first.add_paragraph(body, Paragraph::new("page one"));
        let mut second = Document::new();
        let body2 = second.body();
        second.add_paragraph(body2, Paragraph::new("page two"));

        first.append(&second);
        let paras = first.paragraphs(first.body());
        assert_eq!(paras.len(), 2);
        assert!(first.paragraph(paras[1]).unwrap().page_break);
    }
}
