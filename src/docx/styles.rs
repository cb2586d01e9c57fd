use std::collections::HashMap;

use crate::docx::package::DocxPackage;
use crate::docx::xml::{child_elements, element_span, find_attr, parse_xml_part, XmlEvent};
use crate::error::Result;

pub const STYLES_PART: &str = "word/styles.xml";
const FALLBACK_STYLE: &str = "Normal";

/// Paragraph style id → display name lookup for one document.
#[derive(Clone, Debug, Default)]
pub struct StyleSheet {
    names: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StyleSheet {
    pub fn load(pkg: &DocxPackage) -> Result<Self> {
        match pkg.entry(STYLES_PART) {
            Some(ent) if !ent.data.is_empty() => {
                let part = parse_xml_part(STYLES_PART, &ent.data)?;
                Ok(Self::from_events(&part.events))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_events(events: &[XmlEvent]) -> Self {
        let mut sheet = Self::default();
        for (idx, ev) in events.iter().enumerate() {
            if ev.open_name() != Some("w:style") {
                continue;
            }
            let attrs = ev.attrs();
            if find_attr(attrs, "w:type") != Some("paragraph") {
                continue;
            }
            let Some(style_id) = find_attr(attrs, "w:styleId") else {
                continue;
            };
            let name = element_span(events, idx)
                .and_then(|span| {
                    child_elements(events, &span)
                        .into_iter()
                        .find(|(n, _)| *n == "w:name")
                        .and_then(|(_, r)| find_attr(events[r.start].attrs(), "w:val"))
                })
                .map(ui_name)
                .unwrap_or_else(|| style_id.to_string());
            if matches!(find_attr(attrs, "w:default"), Some("1") | Some("true") | Some("on")) {
                sheet.default_paragraph = Some(name.clone());
            }
            sheet.names.insert(style_id.to_string(), name);
        }
        sheet
    }

    /// Display name for a paragraph's `w:pStyle`, falling back to the default style.
    pub fn paragraph_style_name(&self, style_id: Option<&str>) -> String {
        style_id
            .and_then(|id| self.names.get(id))
            .or(self.default_paragraph.as_ref())
            .cloned()
            .unwrap_or_else(|| FALLBACK_STYLE.to_string())
    }
}

/// Maps the lowercase names Word stores for built-in styles to their UI names.
fn ui_name(stored: &str) -> String {
    let lower = stored.to_ascii_lowercase();
    if let Some(level) = lower.strip_prefix("heading ") {
        if level.parse::<u8>().is_ok() {
            return format!("Heading {level}");
        }
    }
    let mapped = match lower.as_str() {
        "normal" => "Normal",
        "title" => "Title",
        "subtitle" => "Subtitle",
        "caption" => "Caption",
        "header" => "Header",
        "footer" => "Footer",
        "body text" => "Body Text",
        "list paragraph" => "List Paragraph",
        "list bullet" => "List Bullet",
        "list number" => "List Number",
        "toc heading" => "TOC Heading",
        _ => return stored.to_string(),
    };
    mapped.to_string()
}
