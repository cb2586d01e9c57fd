use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::xml::{find_attr, parse_xml_part, XmlEvent};
use crate::error::{Error, Result};

pub const DEFAULT_MAIN_PART: &str = "word/document.xml";
const PACKAGE_RELS: &str = "_rels/.rels";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::malformed(format!("read zip: {e}")))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| Error::malformed(format!("zip entry {i}: {e}")))?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::malformed(format!("read zip entry {}: {e}", file.name())))?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn entry(&self, name: &str) -> Option<&DocxEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Serializes the package, substituting entry data by name.
    ///
    /// Entries keep their original order, compression and timestamps.
    pub fn write_with_replacements(&self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)
                    .map_err(|e| Error::serialize(format!("add zip dir {}: {e}", ent.name)))?;
            } else {
                zout.start_file(ent.name.as_str(), opts)
                    .map_err(|e| Error::serialize(format!("start zip file {}: {e}", ent.name)))?;
                zout.write_all(data)
                    .map_err(|e| Error::serialize(format!("write zip file {}: {e}", ent.name)))?;
            }
        }
        let cursor = zout
            .finish()
            .map_err(|e| Error::serialize(format!("finish zip: {e}")))?;
        Ok(cursor.into_inner())
    }

    pub fn xml_entries(&self) -> Vec<&DocxEntry> {
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().ends_with(".xml") || e.name.ends_with(".rels"))
            .collect()
    }

    /// Name of the main document part, as declared by the package relationships.
    pub fn main_part_name(&self) -> Result<String> {
        let Some(rels) = self.entry(PACKAGE_RELS) else {
            return Ok(DEFAULT_MAIN_PART.to_string());
        };
        let part = parse_xml_part(PACKAGE_RELS, &rels.data)?;
        for ev in &part.events {
            let (XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs }) = ev else {
                continue;
            };
            if name != "Relationship" {
                continue;
            }
            let is_main = find_attr(attrs, "Type")
                .map(|t| t.ends_with(OFFICE_DOCUMENT_REL))
                .unwrap_or(false);
            if let (true, Some(target)) = (is_main, find_attr(attrs, "Target")) {
                return Ok(target.trim_start_matches('/').to_string());
            }
        }
        Ok(DEFAULT_MAIN_PART.to_string())
    }
}
