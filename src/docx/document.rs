use std::collections::HashMap;

use tracing::debug;

use crate::docx::body::{index_body, BodyIndex};
use crate::docx::package::DocxPackage;
use crate::docx::styles::StyleSheet;
use crate::docx::xml::{parse_xml_part, write_xml_part, XmlEvent, XmlPart};
use crate::error::{Error, Result};

/// A parsed package with its main document part indexed for addressing.
pub struct DocxDocument {
    pub package: DocxPackage,
    pub main: XmlPart,
    pub styles: StyleSheet,
    pub body: BodyIndex,
}

impl DocxDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let package = DocxPackage::from_bytes(bytes)?;
        let main_name = package.main_part_name()?;
        let entry = package
            .entry(&main_name)
            .ok_or_else(|| Error::malformed(format!("missing main part: {main_name}")))?;
        let main = parse_xml_part(&main_name, &entry.data)?;
        let styles = StyleSheet::load(&package)?;
        let body = index_body(&main.events)?;
        debug!(part = %main_name, events = main.events.len(), "opened document");
        Ok(Self {
            package,
            main,
            styles,
            body,
        })
    }

    pub fn events(&self) -> &[XmlEvent] {
        &self.main.events
    }

    /// Package bytes with the main part replaced by `events`; every other entry is
    /// copied unchanged.
    pub fn to_bytes_with_main(&self, events: Vec<XmlEvent>) -> Result<Vec<u8>> {
        let part = XmlPart {
            name: self.main.name.clone(),
            events,
        };
        let mut replacements = HashMap::new();
        replacements.insert(part.name.clone(), write_xml_part(&part)?);
        self.package.write_with_replacements(&replacements)
    }
}
