use std::ops::Range;

use tracing::debug;

use crate::docx::ids::ElementId;
use crate::docx::runs::paragraph_text;
use crate::docx::xml::{child_elements, element_span, find_attr, first_child, XmlEvent};
use crate::error::{Error, Result};

/// Word's own limit on table columns.
pub const MAX_GRID_COLUMNS: usize = 63;

#[derive(Clone, Debug)]
pub enum BodyElement {
    Paragraph { id: ElementId, span: Range<usize> },
    Table(TableLayout),
}

impl BodyElement {
    pub fn id(&self) -> ElementId {
        match self {
            BodyElement::Paragraph { id, .. } => *id,
            BodyElement::Table(t) => t.id,
        }
    }

    pub fn span(&self) -> &Range<usize> {
        match self {
            BodyElement::Paragraph { span, .. } => span,
            BodyElement::Table(t) => &t.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableLayout {
    pub id: ElementId,
    pub span: Range<usize>,
    pub rows: Vec<RowLayout>,
}

#[derive(Clone, Debug, Default)]
pub struct RowLayout {
    pub cells: Vec<CellSlot>,
}

/// One grid position of a row.
///
/// `span` is the `w:tc` holding the content: horizontally merged positions share their
/// cell, vertically continued positions point at the cell that starts the merge.
#[derive(Clone, Debug)]
pub struct CellSlot {
    pub id: ElementId,
    pub span: Range<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct BodyIndex {
    pub elements: Vec<BodyElement>,
}

impl BodyIndex {
    /// Every addressable id with its event span, cells after their table.
    pub fn addressable(&self) -> Vec<(ElementId, Range<usize>)> {
        let mut out = Vec::new();
        for el in &self.elements {
            out.push((el.id(), el.span().clone()));
            if let BodyElement::Table(t) = el {
                for row in &t.rows {
                    out.extend(row.cells.iter().map(|c| (c.id, c.span.clone())));
                }
            }
        }
        out
    }
}

pub fn index_body(events: &[XmlEvent]) -> Result<BodyIndex> {
    let Some(body) = find_body(events) else {
        return Err(Error::malformed("main document has no w:body"));
    };

    let mut index = BodyIndex::default();
    let mut counter = 0usize;
    for (name, span) in child_elements(events, &body) {
        match name {
            "w:p" => {
                index.elements.push(BodyElement::Paragraph {
                    id: ElementId::Paragraph(counter),
                    span,
                });
                counter += 1;
            }
            "w:tbl" => {
                let id = ElementId::Table(counter);
                index
                    .elements
                    .push(BodyElement::Table(table_layout(events, id, span)));
                counter += 1;
            }
            _ => {}
        }
    }
    debug!(elements = index.elements.len(), "indexed body");
    Ok(index)
}

fn find_body(events: &[XmlEvent]) -> Option<Range<usize>> {
    let idx = events
        .iter()
        .position(|ev| ev.open_name() == Some("w:body"))?;
    element_span(events, idx)
}

fn table_layout(events: &[XmlEvent], id: ElementId, span: Range<usize>) -> TableLayout {
    let grid_cols = grid_columns(events, &span);
    let mut rows: Vec<RowLayout> = Vec::new();
    for (name, tr) in child_elements(events, &span) {
        if name != "w:tr" {
            continue;
        }
        let row_idx = rows.len();
        let mut row = RowLayout::default();
        for (name, tc) in child_elements(events, &tr) {
            if name != "w:tc" {
                continue;
            }
            let props = cell_props(events, &tc);
            let origin = if props.continues_merge {
                let col = row.cells.len();
                rows.last()
                    .and_then(|above| above.cells.get(col))
                    .map(|c| c.span.clone())
                    .unwrap_or_else(|| tc.clone())
            } else {
                tc.clone()
            };
            let remaining = grid_cols.saturating_sub(row.cells.len()).max(1);
            for _ in 0..props.grid_span.min(remaining) {
                let col = row.cells.len();
                let Some(cell_id) = id.cell(row_idx, col) else {
                    continue;
                };
                row.cells.push(CellSlot {
                    id: cell_id,
                    span: origin.clone(),
                });
            }
        }
        rows.push(row);
    }
    TableLayout { id, span, rows }
}

/// Column count declared by `w:tblGrid`, or [`MAX_GRID_COLUMNS`] when absent.
fn grid_columns(events: &[XmlEvent], tbl: &Range<usize>) -> usize {
    first_child(events, tbl, "w:tblGrid")
        .map(|grid| {
            child_elements(events, &grid)
                .into_iter()
                .filter(|(name, _)| *name == "w:gridCol")
                .count()
        })
        .filter(|n| *n > 0)
        .unwrap_or(MAX_GRID_COLUMNS)
        .min(MAX_GRID_COLUMNS)
}

struct CellProps {
    grid_span: usize,
    continues_merge: bool,
}

fn cell_props(events: &[XmlEvent], tc: &Range<usize>) -> CellProps {
    let mut props = CellProps {
        grid_span: 1,
        continues_merge: false,
    };
    let Some(tc_pr) = first_child(events, tc, "w:tcPr") else {
        return props;
    };
    for (name, span) in child_elements(events, &tc_pr) {
        let attrs = events[span.start].attrs();
        match name {
            "w:gridSpan" => {
                props.grid_span = find_attr(attrs, "w:val")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(1);
            }
            "w:vMerge" => {
                props.continues_merge = find_attr(attrs, "w:val").unwrap_or("continue") == "continue";
            }
            _ => {}
        }
    }
    props
}

/// Text of a cell: its own paragraphs joined by newlines. Nested tables are ignored.
pub fn cell_text(events: &[XmlEvent], tc: &Range<usize>) -> String {
    child_elements(events, tc)
        .into_iter()
        .filter(|(name, _)| *name == "w:p")
        .map(|(_, p)| paragraph_text(events, &p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `w:pStyle` value of a paragraph, if set.
pub fn paragraph_style_id<'a>(events: &'a [XmlEvent], p_span: &Range<usize>) -> Option<&'a str> {
    let ppr = first_child(events, p_span, "w:pPr")?;
    let style = first_child(events, &ppr, "w:pStyle")?;
    find_attr(events[style.start].attrs(), "w:val")
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
