use std::io::{Cursor, Write};

use docx_patcher::docx::document::DocxDocument;
use docx_patcher::docx::runs::{read_runs, Run, RunFormat};
use docx_patcher::{
    apply_patches_with, element_fingerprints, extract_structure, parse_patches, verify_untouched,
    DocumentStructure, Error, FormatPolicy, Patch, PatchMap, StructureElement,
};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const PACKAGE_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>"#,
    r#"</w:styles>"#
);

const BODY: &str = concat!(
    r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Quarterly Report</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Revenue grew </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>strongly</w:t></w:r></w:p>"#,
    r#"<w:tbl><w:tblPr/><w:tblGrid><w:gridCol w:w="2000"/><w:gridCol w:w="2000"/></w:tblGrid>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p><w:r><w:t>Merged</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"</w:tbl>"#,
    r#"<w:p/>"#,
    r#"<w:sectPr/>"#
);

fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    )
}

fn build_docx(body: &str) -> Vec<u8> {
    let document = document_xml(body);
    let files = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", document.as_str()),
        ("word/styles.xml", STYLES),
    ];
    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        zw.start_file(name, SimpleFileOptions::default())
            .expect("start file");
        zw.write_all(data.as_bytes()).expect("write file");
    }
    zw.finish().expect("finish zip").into_inner()
}

fn sample() -> Vec<u8> {
    build_docx(BODY)
}

fn texts(structure: &DocumentStructure) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for el in &structure.elements {
        match el {
            StructureElement::Paragraph { id, text, .. } => out.push((id.clone(), text.clone())),
            StructureElement::Table { rows, .. } => {
                for cell in rows.iter().flat_map(|r| r.cells.iter()) {
                    out.push((cell.id.clone(), cell.text.clone()));
                }
            }
        }
    }
    out
}

fn text_of(structure: &DocumentStructure, id: &str) -> String {
    texts(structure)
        .into_iter()
        .find(|(i, _)| i == id)
        .map(|(_, t)| t)
        .unwrap_or_else(|| panic!("no element {id}"))
}

fn runs_of(docx: &[u8], index: usize) -> Vec<Run> {
    let doc = DocxDocument::from_bytes(docx).expect("open");
    let span = doc.body.elements[index].span().clone();
    read_runs(doc.events(), &span)
}

fn apply(docx: &[u8], patches: &[Patch]) -> (Vec<u8>, docx_patcher::ApplyReport) {
    apply_patches_with(docx, patches, &FormatPolicy::default()).expect("apply")
}

#[test]
fn structure_lists_paragraphs_and_tables_in_order() {
    let structure = extract_structure(&sample()).expect("extract");
    let value = serde_json::to_value(&structure).expect("json");
    assert_eq!(
        value,
        serde_json::json!({
            "elements": [
                {"type": "paragraph", "id": "p_0", "text": "Quarterly Report", "style": "Heading 1"},
                {"type": "paragraph", "id": "p_1", "text": "Revenue grew strongly", "style": "Normal"},
                {"type": "table", "id": "tbl_2", "rows": [
                    {"cells": [
                        {"id": "tbl_2_r0c0", "text": "A1"},
                        {"id": "tbl_2_r0c1", "text": "B1"}
                    ]},
                    {"cells": [
                        {"id": "tbl_2_r1c0", "text": "Merged"},
                        {"id": "tbl_2_r1c1", "text": "Merged"}
                    ]}
                ]},
                {"type": "paragraph", "id": "p_3", "text": "", "style": "Normal"}
            ]
        })
    );
}

#[test]
fn empty_patch_list_keeps_ids_and_content() {
    let original = sample();
    let (patched, report) = apply(&original, &[]);
    assert!(report.applied.is_empty());
    assert!(report.unmatched.is_empty());

    assert_eq!(
        extract_structure(&original).expect("before"),
        extract_structure(&patched).expect("after")
    );
    let before = element_fingerprints(&DocxDocument::from_bytes(&original).expect("open"));
    let after = element_fingerprints(&DocxDocument::from_bytes(&patched).expect("open"));
    assert_eq!(before, after);
}

#[test]
fn single_run_paragraph_keeps_its_formatting() {
    let original = sample();
    let (patched, report) = apply(&original, &[Patch::text("p_0", "Annual Report")]);
    assert_eq!(report.applied, vec!["p_0".to_string()]);

    let bold = RunFormat {
        bold: Some(true),
        ..RunFormat::default()
    };
    assert_eq!(runs_of(&patched, 0), vec![Run::new("Annual Report", bold)]);

    let structure = extract_structure(&patched).expect("extract");
    assert_eq!(text_of(&structure, "p_0"), "Annual Report");
    match &structure.elements[0] {
        StructureElement::Paragraph { style, .. } => assert_eq!(style, "Heading 1"),
        other => panic!("unexpected {other:?}"),
    }
    verify_untouched(&original, &patched, &PatchMap::from_patches(&[Patch::text("p_0", "x")]))
        .expect("other elements unchanged");
}

#[test]
fn long_replacement_spreads_formatting_over_the_text() {
    let replacement = "Revenue grew considerably over the last four quarters overall";
    assert!(replacement.chars().count() > 50);
    let (patched, _) = apply(&sample(), &[Patch::text("p_1", replacement)]);

    let runs = runs_of(&patched, 1);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].format, RunFormat::default());
    assert_eq!(runs[1].format.italic, Some(true));
    let joined: String = runs.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(joined, replacement);
}

#[test]
fn blank_replacement_leaves_an_empty_paragraph() {
    let original = sample();
    let (patched, _) = apply(&original, &[Patch::text("p_1", "")]);
    assert!(runs_of(&patched, 1).is_empty());

    let structure = extract_structure(&patched).expect("extract");
    assert_eq!(text_of(&structure, "p_1"), "");
    assert_eq!(text_of(&structure, "p_0"), "Quarterly Report");
    assert_eq!(structure.elements.len(), 4);
}

#[test]
fn unknown_and_table_ids_are_reported_not_fatal() {
    let original = sample();
    let patches = vec![
        Patch::text("p_99", "nowhere"),
        Patch::text("tbl_2", "whole table"),
        Patch::text("bogus", "?"),
    ];
    let (patched, report) = apply(&original, &patches);
    assert!(report.applied.is_empty());
    assert_eq!(report.unmatched, vec!["p_99", "tbl_2"]);
    assert_eq!(report.malformed_ids, vec!["bogus"]);
    assert_eq!(
        extract_structure(&original).expect("before"),
        extract_structure(&patched).expect("after")
    );
    verify_untouched(&original, &patched, &PatchMap::from_patches(&patches)).expect("unchanged");
}

#[test]
fn cell_patch_changes_only_that_cell() {
    let original = sample();
    let patches = vec![Patch::text("tbl_2_r0c1", "Beta")];
    let (patched, report) = apply(&original, &patches);
    assert_eq!(report.applied, vec!["tbl_2_r0c1".to_string()]);

    let structure = extract_structure(&patched).expect("extract");
    assert_eq!(
        texts(&structure),
        vec![
            ("p_0".to_string(), "Quarterly Report".to_string()),
            ("p_1".to_string(), "Revenue grew strongly".to_string()),
            ("tbl_2_r0c0".to_string(), "A1".to_string()),
            ("tbl_2_r0c1".to_string(), "Beta".to_string()),
            ("tbl_2_r1c0".to_string(), "Merged".to_string()),
            ("tbl_2_r1c1".to_string(), "Merged".to_string()),
            ("p_3".to_string(), String::new()),
        ]
    );
    verify_untouched(&original, &patched, &PatchMap::from_patches(&patches)).expect("unchanged");
}

#[test]
fn spanned_cell_is_one_cell_under_two_ids() {
    let (patched, _) = apply(&sample(), &[Patch::text("tbl_2_r1c1", "Wide")]);
    let structure = extract_structure(&patched).expect("extract");
    assert_eq!(text_of(&structure, "tbl_2_r1c0"), "Wide");
    assert_eq!(text_of(&structure, "tbl_2_r1c1"), "Wide");
}

#[test]
fn vertically_merged_cell_is_written_through_its_continuation() {
    let body = concat!(
        r#"<w:tbl><w:tblGrid><w:gridCol w:w="2000"/><w:gridCol w:w="2000"/></w:tblGrid>"#,
        r#"<w:tr><w:tc><w:tcPr><w:vMerge w:val="restart"/></w:tcPr><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc>"#,
        r#"<w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc></w:tr>"#,
        r#"<w:tr><w:tc><w:tcPr><w:vMerge/></w:tcPr><w:p/></w:tc>"#,
        r#"<w:tc><w:p><w:r><w:t>South</w:t></w:r></w:p></w:tc></w:tr>"#,
        r#"</w:tbl><w:p><w:r><w:t>after</w:t></w:r></w:p>"#
    );
    let original = build_docx(body);
    let before = extract_structure(&original).expect("before");
    assert_eq!(text_of(&before, "tbl_0_r1c0"), "Region");

    let patches = vec![Patch::text("tbl_0_r1c0", "Area")];
    let (patched, report) = apply(&original, &patches);
    assert_eq!(report.applied, vec!["tbl_0_r1c0".to_string()]);

    let after = extract_structure(&patched).expect("after");
    assert_eq!(
        texts(&after),
        vec![
            ("tbl_0_r0c0".to_string(), "Area".to_string()),
            ("tbl_0_r0c1".to_string(), "North".to_string()),
            ("tbl_0_r1c0".to_string(), "Area".to_string()),
            ("tbl_0_r1c1".to_string(), "South".to_string()),
            ("p_1".to_string(), "after".to_string()),
        ]
    );
    verify_untouched(&original, &patched, &PatchMap::from_patches(&patches)).expect("unchanged");
}

#[test]
fn text_xml_cannot_carry_is_refused() {
    let err = apply_patches_with(
        &sample(),
        &[Patch::text("p_0", "bad\u{1}char\u{0}x")],
        &FormatPolicy::default(),
    )
    .expect_err("control characters");
    assert_eq!(err.kind(), "serialize");
    assert!(err.to_string().contains("p_0"), "{err}");

    let err = apply_patches_with(&sample(), &[Patch::text("tbl_2_r0c0", "\u{FFFF}")], &FormatPolicy::default())
        .expect_err("noncharacter");
    assert_eq!(err.kind(), "serialize");
    assert!(err.to_string().contains("tbl_2_r0c0"), "{err}");

    // Tabs and line breaks are encoded as elements and stay accepted.
    let (patched, _) = apply(&sample(), &[Patch::text("p_3", "a\tb\nc")]);
    assert_eq!(text_of(&extract_structure(&patched).expect("extract"), "p_3"), "a\tb\nc");
}

#[test]
fn padded_ids_still_match() {
    let (patched, report) = apply(&sample(), &[Patch::text("  p_0\n", "Padded")]);
    assert_eq!(report.applied, vec!["p_0".to_string()]);
    assert_eq!(text_of(&extract_structure(&patched).expect("extract"), "p_0"), "Padded");
}

#[test]
fn duplicate_ids_keep_the_last_patch() {
    let patches = parse_patches(
        br#"[{"element_id": "p_3", "new_content": "first"}, {"element_id": "p_3", "new_content": "second"}]"#,
    )
    .expect("patches");
    let (patched, report) = apply(&sample(), &patches);
    assert_eq!(report.applied, vec!["p_3".to_string()]);
    assert_eq!(text_of(&extract_structure(&patched).expect("extract"), "p_3"), "second");
}

#[test]
fn verification_reports_drift_outside_the_patch_set() {
    let original = sample();
    let (patched, _) = apply(&original, &[Patch::text("p_1", "changed")]);
    let err = verify_untouched(&original, &patched, &PatchMap::default()).expect_err("drift");
    assert_eq!(err.kind(), "verification");
    match err {
        Error::Verification(ids) => assert_eq!(ids, vec!["p_1".to_string()]),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn not_a_zip_is_a_malformed_document() {
    let err = extract_structure(b"definitely not a zip").expect_err("malformed");
    assert_eq!(err.kind(), "malformed_document");
    let err = apply_patches_with(b"PK\x03\x04broken", &[], &FormatPolicy::default())
        .expect_err("malformed");
    assert_eq!(err.kind(), "malformed_document");
}

#[test]
fn empty_body_has_no_elements() {
    let structure = extract_structure(&build_docx("")).expect("extract");
    assert!(structure.elements.is_empty());
    assert_eq!(
        serde_json::to_value(&structure).expect("json"),
        serde_json::json!({"elements": []})
    );
}

#[test]
fn other_package_entries_are_copied_verbatim() {
    let original = sample();
    let (patched, _) = apply(&original, &[Patch::text("p_0", "Annual Report")]);
    let before = DocxDocument::from_bytes(&original).expect("open");
    let after = DocxDocument::from_bytes(&patched).expect("open");
    let names = |d: &DocxDocument| d.package.entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&before), names(&after));
    for name in ["[Content_Types].xml", "_rels/.rels", "word/styles.xml"] {
        assert_eq!(
            before.package.entry(name).map(|e| &e.data),
            after.package.entry(name).map(|e| &e.data),
            "{name}"
        );
    }
}
