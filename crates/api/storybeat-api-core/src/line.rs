//! Authored dialogue lines and the JSON line table.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityRef;
use crate::ports::ContentTable;

/// One displayable line. Immutable once authored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    pub id: String,
    pub text: String,
    /// Entity the line should be anchored to, overriding the sequence anchor.
    #[serde(default, rename = "anchor", skip_serializing_if = "Option::is_none")]
    pub spatial_anchor: Option<EntityRef>,
}

impl LineRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            spatial_anchor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: EntityRef) -> Self {
        self.spatial_anchor = Some(anchor);
        self
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("line table json parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate line id '{0}'")]
    DuplicateId(String),
}

#[derive(Debug, Deserialize)]
struct LineTableDoc {
    #[serde(default)]
    lines: Vec<LineRecord>,
}

/// Content table backed by authored [`LineRecord`]s, usually loaded from JSON:
///
/// ```json
/// { "lines": [ { "id": "greet", "text": "Hello.", "anchor": 3 } ] }
/// ```
#[derive(Clone, Debug, Default)]
pub struct LineTable {
    lines: HashMap<String, LineRecord>,
}

impl LineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, ContentError> {
        let doc: LineTableDoc = serde_json::from_str(text)?;
        let mut table = Self::new();
        for line in doc.lines {
            if table.lines.contains_key(&line.id) {
                return Err(ContentError::DuplicateId(line.id));
            }
            table.lines.insert(line.id.clone(), line);
        }
        Ok(table)
    }

    /// Insert or replace a line.
    pub fn insert(&mut self, line: LineRecord) -> Option<LineRecord> {
        self.lines.insert(line.id.clone(), line)
    }

    pub fn get(&self, id: &str) -> Option<&LineRecord> {
        self.lines.get(id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl ContentTable for LineTable {
    fn lookup(&self, id: &str) -> Option<String> {
        self.lines.get(id).map(|l| l.text.clone())
    }

    fn anchor_of(&self, id: &str) -> Option<EntityRef> {
        self.lines.get(id).and_then(|l| l.spatial_anchor)
    }
}
