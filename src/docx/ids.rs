use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:p_(\d+)|tbl_(\d+)(?:_r(\d+)c(\d+))?)$").expect("element id")
});

/// Positional address of a body element.
///
/// `n` is the shared top-level counter; cells reuse their table's counter plus
/// row and grid-column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Paragraph(usize),
    Table(usize),
    Cell { table: usize, row: usize, col: usize },
}

impl ElementId {
    pub fn cell(self, row: usize, col: usize) -> Option<ElementId> {
        match self {
            ElementId::Table(table) => Some(ElementId::Cell { table, row, col }),
            _ => None,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Paragraph(n) => write!(f, "p_{n}"),
            ElementId::Table(n) => write!(f, "tbl_{n}"),
            ElementId::Cell { table, row, col } => write!(f, "tbl_{table}_r{row}c{col}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("not an element id: {0:?}")]
pub struct UnknownElementId(pub String);

impl FromStr for ElementId {
    type Err = UnknownElementId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || UnknownElementId(s.to_string());
        let caps = ID_RE.captures(s).ok_or_else(bad)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<usize>().ok());
        if let Some(p) = caps.get(1) {
            return p.as_str().parse().map(ElementId::Paragraph).map_err(|_| bad());
        }
        let table = num(2).ok_or_else(bad)?;
        match (caps.get(3), caps.get(4)) {
            (Some(_), Some(_)) => Ok(ElementId::Cell {
                table,
                row: num(3).ok_or_else(bad)?,
                col: num(4).ok_or_else(bad)?,
            }),
            _ => Ok(ElementId::Table(table)),
        }
    }
}
