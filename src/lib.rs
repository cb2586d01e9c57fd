pub mod config;
pub mod docx;
pub mod error;
pub mod patch;

pub use docx::apply::{apply_patch_map, apply_patches, apply_patches_with, ApplyReport};
pub use docx::format::{format_runs, FormatPolicy};
pub use docx::ids::ElementId;
pub use docx::runs::{Run, RunFormat};
pub use docx::structure::{extract_structure, DocumentStructure, StructureElement};
pub use docx::verify::{element_fingerprints, verify_untouched};
pub use error::{Error, Result};
pub use patch::{parse_patches, Patch, PatchMap};
