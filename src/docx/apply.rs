use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use tracing::{info, warn};

use crate::docx::body::BodyElement;
use crate::docx::document::DocxDocument;
use crate::docx::format::{format_runs, FormatPolicy};
use crate::docx::ids::ElementId;
use crate::docx::runs::{read_runs, run_events, text_bearing_children, Run, RunFormat};
use crate::docx::xml::{first_child, is_xml_char, XmlEvent};
use crate::error::{Error, Result};
use crate::patch::{Patch, PatchMap};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Ids that were rewritten, in traversal order.
    pub applied: Vec<String>,
    /// Well-formed patch ids that named no paragraph or cell of the document.
    pub unmatched: Vec<String>,
    /// Patch ids that are not element ids at all.
    pub malformed_ids: Vec<String>,
    /// Run attributes dropped because their values could not be written.
    pub skipped_attributes: usize,
}

pub fn apply_patches(bytes: &[u8], patches: &[Patch]) -> Result<Vec<u8>> {
    apply_patches_with(bytes, patches, &FormatPolicy::default()).map(|(out, _)| out)
}

pub fn apply_patches_with(
    bytes: &[u8],
    patches: &[Patch],
    policy: &FormatPolicy,
) -> Result<(Vec<u8>, ApplyReport)> {
    let doc = DocxDocument::from_bytes(bytes)?;
    let map = PatchMap::from_patches(patches);
    apply_patch_map(&doc, &map, policy)
}

/// Serializes `doc` with every patch in `map` applied. Nothing is written until all
/// edits are in place.
pub fn apply_patch_map(
    doc: &DocxDocument,
    map: &PatchMap,
    policy: &FormatPolicy,
) -> Result<(Vec<u8>, ApplyReport)> {
    let (events, report) = patch_events(doc, map, policy)?;
    let bytes = doc.to_bytes_with_main(events)?;
    info!(
        applied = report.applied.len(),
        unmatched = report.unmatched.len(),
        malformed_ids = report.malformed_ids.len(),
        "applied patches"
    );
    Ok((bytes, report))
}

/// Main part events after patching, leaving `doc` untouched.
///
/// Fails with [`Error::Serialize`] when a replacement holds characters XML cannot carry.
pub fn patch_events(
    doc: &DocxDocument,
    map: &PatchMap,
    policy: &FormatPolicy,
) -> Result<(Vec<XmlEvent>, ApplyReport)> {
    let events = doc.events();
    let mut report = ApplyReport::default();
    // Keyed by span start; a later edit of the same cell replaces an earlier one.
    let mut edits: BTreeMap<usize, (Range<usize>, Vec<XmlEvent>)> = BTreeMap::new();

    for el in &doc.body.elements {
        match el {
            BodyElement::Paragraph { id, span } => {
                let key = id.to_string();
                if let Some(text) = map.get(&key) {
                    check_writable(&key, text)?;
                    let (new, skipped) = rewrite_paragraph(events, span, text, policy);
                    report.skipped_attributes += skipped;
                    edits.insert(span.start, (span.clone(), new));
                    report.applied.push(key);
                }
            }
            BodyElement::Table(table) => {
                for cell in table.rows.iter().flat_map(|r| r.cells.iter()) {
                    let key = cell.id.to_string();
                    if let Some(text) = map.get(&key) {
                        check_writable(&key, text)?;
                        edits.insert(
                            cell.span.start,
                            (cell.span.clone(), rewrite_cell(events, &cell.span, text)),
                        );
                        report.applied.push(key);
                    }
                }
            }
        }
    }

    let applied: HashSet<&str> = report.applied.iter().map(String::as_str).collect();
    for id in map.ids().filter(|id| !applied.contains(id)) {
        match id.parse::<ElementId>() {
            Ok(ElementId::Table(_)) => {
                warn!(element_id = %id, "whole tables are not patched; ignored");
                report.unmatched.push(id.to_string());
            }
            Ok(_) => {
                warn!(element_id = %id, "patch matches no paragraph or cell; ignored");
                report.unmatched.push(id.to_string());
            }
            Err(err) => {
                warn!(%err, "malformed patch id; ignored");
                report.malformed_ids.push(id.to_string());
            }
        }
    }

    Ok((splice(events, edits), report))
}

fn check_writable(id: &str, text: &str) -> Result<()> {
    match text.chars().find(|ch| !is_xml_char(*ch)) {
        Some(ch) => Err(Error::serialize(format!(
            "{id}: character U+{:04X} cannot be written to XML",
            ch as u32
        ))),
        None => Ok(()),
    }
}

fn splice(events: &[XmlEvent], edits: BTreeMap<usize, (Range<usize>, Vec<XmlEvent>)>) -> Vec<XmlEvent> {
    let mut out = Vec::with_capacity(events.len());
    let mut idx = 0usize;
    for (start, (span, replacement)) in edits {
        out.extend_from_slice(&events[idx..start]);
        out.extend(replacement);
        idx = span.end;
    }
    out.extend_from_slice(&events[idx..]);
    out
}

/// Rebuilds a paragraph around new runs. Returns the events and the number of run
/// attributes that had to be skipped.
///
/// Text-bearing children are removed; the new runs take the place of the first one, or
/// go before `</w:p>` when there was none. Everything else stays where it was.
fn rewrite_paragraph(
    events: &[XmlEvent],
    span: &Range<usize>,
    text: &str,
    policy: &FormatPolicy,
) -> (Vec<XmlEvent>, usize) {
    let original = read_runs(events, span);
    let mut new_runs: Vec<XmlEvent> = Vec::new();
    let mut skipped = 0usize;
    for run in format_runs(&original, text, policy) {
        let (ev, outcome) = run_events(&run);
        skipped += outcome.skipped.len();
        new_runs.extend(ev);
    }

    let open = &events[span.start];
    if let XmlEvent::Empty { name, attrs } = open {
        if new_runs.is_empty() {
            return (vec![open.clone()], skipped);
        }
        let mut out = vec![XmlEvent::start(name, attrs.clone())];
        out.extend(new_runs);
        out.push(XmlEvent::end(name));
        return (out, skipped);
    }

    let removed = text_bearing_children(events, span);
    let insert_at = removed.first().map(|r| r.start).unwrap_or(span.end - 1);
    let mut out = Vec::with_capacity(span.len() + new_runs.len());
    let mut idx = span.start;
    while idx < span.end {
        if idx == insert_at {
            out.append(&mut new_runs);
        }
        if let Some(r) = removed.iter().find(|r| r.start == idx) {
            idx = r.end;
            continue;
        }
        out.push(events[idx].clone());
        idx += 1;
    }
    (out, skipped)
}

/// Replaces a cell's content with one plain paragraph holding `text`.
///
/// The cell keeps its `w:tcPr` and the first paragraph's `w:pPr`.
fn rewrite_cell(events: &[XmlEvent], tc: &Range<usize>, text: &str) -> Vec<XmlEvent> {
    let (tc_name, tc_attrs) = match &events[tc.start] {
        XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => (name.as_str(), attrs.clone()),
        _ => ("w:tc", Vec::new()),
    };
    let mut out = vec![XmlEvent::start(tc_name, tc_attrs)];
    if let Some(tc_pr) = first_child(events, tc, "w:tcPr") {
        out.extend_from_slice(&events[tc_pr]);
    }

    let first_p = first_child(events, tc, "w:p");
    let p_attrs = first_p
        .as_ref()
        .map(|p| events[p.start].attrs().to_vec())
        .unwrap_or_default();
    out.push(XmlEvent::start("w:p", p_attrs));
    if let Some(ppr) = first_p.as_ref().and_then(|p| first_child(events, p, "w:pPr")) {
        out.extend_from_slice(&events[ppr]);
    }
    if !text.is_empty() {
        out.extend(run_events(&Run::new(text, RunFormat::default())).0);
    }
    out.push(XmlEvent::end("w:p"));
    out.push(XmlEvent::end(tc_name));
    out
}
