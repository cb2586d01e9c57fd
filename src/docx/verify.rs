use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;

use crate::docx::document::DocxDocument;
use crate::docx::ids::ElementId;
use crate::docx::xml::events_hash;
use crate::error::{Error, Result};
use crate::patch::PatchMap;

/// SHA-256 of every addressable element's events, keyed by id.
pub fn element_fingerprints(doc: &DocxDocument) -> BTreeMap<String, String> {
    doc.body
        .addressable()
        .into_iter()
        .map(|(id, span)| (id.to_string(), events_hash(&doc.events()[span])))
        .collect()
}

/// Checks that every element the patch set could not have changed is identical in
/// `patched`.
///
/// Elements enclosing or sharing the span of a patched paragraph or cell (its table,
/// merged grid positions of the same cell) are exempt.
pub fn verify_untouched(original: &[u8], patched: &[u8], map: &PatchMap) -> Result<()> {
    let before = DocxDocument::from_bytes(original)?;
    let after = DocxDocument::from_bytes(patched)?;
    let after_prints = element_fingerprints(&after);

    let addressable = before.body.addressable();
    let touched: Vec<Range<usize>> = addressable
        .iter()
        .filter(|(id, _)| !matches!(id, ElementId::Table(_)) && map.contains(&id.to_string()))
        .map(|(_, span)| span.clone())
        .collect();

    let mut drifted = Vec::new();
    for (id, span) in &addressable {
        if touched
            .iter()
            .any(|t| span.start <= t.start && t.end <= span.end)
        {
            continue;
        }
        let key = id.to_string();
        let expected = events_hash(&before.events()[span.clone()]);
        if after_prints.get(&key) != Some(&expected) {
            drifted.push(key);
        }
    }
    debug!(checked = addressable.len(), drifted = drifted.len(), "verified untouched elements");
    if drifted.is_empty() {
        Ok(())
    } else {
        Err(Error::Verification(drifted))
    }
}
