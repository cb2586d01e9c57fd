use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::docx::body::{cell_text, paragraph_style_id, BodyElement, TableLayout};
use crate::docx::document::DocxDocument;
use crate::docx::runs::paragraph_text;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub elements: Vec<StructureElement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureElement {
    Paragraph {
        id: String,
        text: String,
        style: String,
    },
    Table {
        id: String,
        rows: Vec<StructureRow>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRow {
    pub cells: Vec<StructureCell>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCell {
    pub id: String,
    pub text: String,
}

pub struct StructureOutputs {
    pub structure_json_path: PathBuf,
}

pub fn extract_structure(bytes: &[u8]) -> Result<DocumentStructure> {
    let doc = DocxDocument::from_bytes(bytes)?;
    Ok(build_structure(&doc))
}

pub fn build_structure(doc: &DocxDocument) -> DocumentStructure {
    let events = doc.events();
    let elements = doc
        .body
        .elements
        .iter()
        .map(|el| match el {
            BodyElement::Paragraph { id, span } => StructureElement::Paragraph {
                id: id.to_string(),
                text: paragraph_text(events, span),
                style: doc
                    .styles
                    .paragraph_style_name(paragraph_style_id(events, span)),
            },
            BodyElement::Table(table) => table_structure(doc, table),
        })
        .collect();
    DocumentStructure { elements }
}

fn table_structure(doc: &DocxDocument, table: &TableLayout) -> StructureElement {
    let rows = table
        .rows
        .iter()
        .map(|row| StructureRow {
            cells: row
                .cells
                .iter()
                .map(|cell| StructureCell {
                    id: cell.id.to_string(),
                    text: cell_text(doc.events(), &cell.span),
                })
                .collect(),
        })
        .collect();
    StructureElement::Table {
        id: table.id.to_string(),
        rows,
    }
}

pub fn extract_structure_json(input_docx: &Path, output_json: &Path, pretty: bool) -> Result<()> {
    let bytes = fs::read(input_docx)?;
    let out = extract_structure(&bytes)?;
    let json = if pretty {
        serde_json::to_vec_pretty(&out)
    } else {
        serde_json::to_vec(&out)
    }
    .map_err(|e| Error::serialize(format!("structure json: {e}")))?;
    fs::write(output_json, json)?;
    info!(
        elements = out.elements.len(),
        output = %output_json.display(),
        "wrote structure"
    );
    Ok(())
}

pub fn default_structure_output_for(input_docx: &Path) -> StructureOutputs {
    let stem = input_docx
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("docx");
    let dir = input_docx.parent().unwrap_or_else(|| Path::new("."));
    StructureOutputs {
        structure_json_path: dir.join(format!("{stem}.structure.json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tags() {
        let s = DocumentStructure {
            elements: vec![
                StructureElement::Paragraph {
                    id: "p_0".into(),
                    text: "Hi".into(),
                    style: "Normal".into(),
                },
                StructureElement::Table {
                    id: "tbl_1".into(),
                    rows: vec![StructureRow {
                        cells: vec![StructureCell {
                            id: "tbl_1_r0c0".into(),
                            text: "c".into(),
                        }],
                    }],
                },
            ],
        };
        let v = serde_json::to_value(&s).expect("json");
        assert_eq!(
            v,
            serde_json::json!({
                "elements": [
                    {"type": "paragraph", "id": "p_0", "text": "Hi", "style": "Normal"},
                    {"type": "table", "id": "tbl_1", "rows": [{"cells": [{"id": "tbl_1_r0c0", "text": "c"}]}]}
                ]
            })
        );
    }

    #[test]
    fn default_output_sits_next_to_input() {
        let out = default_structure_output_for(Path::new("/tmp/report.docx"));
        assert_eq!(out.structure_json_path, PathBuf::from("/tmp/report.structure.json"));
    }
}
