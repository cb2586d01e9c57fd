use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The byte stream is not a readable OOXML package (bad zip, missing part, bad XML).
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A patch list could not be decoded.
    #[error("malformed patch: {0}")]
    MalformedPatch(String),

    /// Writing XML or the zip container failed.
    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    /// Elements outside the patch set changed during patching.
    #[error("untouched elements changed: {}", .0.join(", "))]
    Verification(Vec<String>),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedDocument(_) => "malformed_document",
            Error::MalformedPatch(_) => "malformed_patch",
            Error::Serialize(_) => "serialize",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::Verification(_) => "verification",
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedDocument(msg.into())
    }

    pub(crate) fn serialize(msg: impl Into<String>) -> Self {
        Error::Serialize(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedPatch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize_failures_have_distinct_kinds() {
        let parse = Error::malformed("bad zip");
        let write = Error::serialize("finish zip");
        assert_eq!(parse.kind(), "malformed_document");
        assert_eq!(write.kind(), "serialize");
        assert_ne!(parse.kind(), write.kind());
    }

    #[test]
    fn verification_lists_drifted_ids() {
        let err = Error::Verification(vec!["p_0".into(), "tbl_1_r0c0".into()]);
        assert_eq!(err.to_string(), "untouched elements changed: p_0, tbl_1_r0c0");
    }
}
