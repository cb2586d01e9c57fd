use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// One replacement instruction: `new_content` goes into the element named `element_id`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    pub element_id: String,
    pub new_content: Value,
}

impl Patch {
    pub fn text(element_id: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            new_content: Value::String(new_content.into()),
        }
    }

    /// Replacement text: strings verbatim, `null` as empty, anything else as its JSON text.
    pub fn content_text(&self) -> String {
        match &self.new_content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

pub fn parse_patches(json: &[u8]) -> Result<Vec<Patch>> {
    Ok(serde_json::from_slice(json)?)
}

/// Replacement text keyed by element id, surrounding whitespace trimmed from the id.
/// Later patches for the same id win.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchMap {
    entries: BTreeMap<String, String>,
}

impl PatchMap {
    pub fn from_patches(patches: &[Patch]) -> Self {
        let mut entries = BTreeMap::new();
        for p in patches {
            let id = p.element_id.trim();
            if entries.insert(id.to_string(), p.content_text()).is_some() {
                debug!(element_id = %id, "later patch replaces earlier one");
            }
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
