pub mod apply;
pub mod body;
pub mod document;
pub mod format;
pub mod ids;
pub mod package;
pub mod runs;
pub mod structure;
pub mod styles;
pub mod verify;
pub mod xml;
