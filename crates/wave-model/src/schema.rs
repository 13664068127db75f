//! Document schemas: which elements may nest, which attributes they carry and
//! where text may appear.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Text content permitted inside an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermittedCharacters {
    Any,
    BlipText,
    #[default]
    None,
}

impl PermittedCharacters {
    /// `BlipText` allows text just like `Any`.
    pub fn allows_text(self) -> bool {
        !matches!(self, PermittedCharacters::None)
    }
}

pub trait DocumentSchema {
    /// Whether `child` may appear inside `parent`; `None` is the top level.
    fn permits_child(&self, parent: Option<&str>, child: &str) -> bool;

    fn permits_attribute(&self, tag: &str, name: &str) -> bool;

    fn permits_attribute_value(&self, tag: &str, name: &str, value: &str) -> bool;

    /// Text rules inside `tag`; `None` is the top level.
    fn permitted_characters(&self, tag: Option<&str>) -> PermittedCharacters;
}

/// The schema that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl DocumentSchema for NoSchema {
    fn permits_child(&self, _parent: Option<&str>, _child: &str) -> bool {
        true
    }

    fn permits_attribute(&self, _tag: &str, _name: &str) -> bool {
        true
    }

    fn permits_attribute_value(&self, _tag: &str, _name: &str, _value: &str) -> bool {
        true
    }

    fn permitted_characters(&self, _tag: Option<&str>) -> PermittedCharacters {
        PermittedCharacters::Any
    }
}

// ── Table-driven schema ───────────────────────────────────────────────────

/// Rules for one element type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    #[serde(default)]
    pub children: Vec<String>,
    /// Attribute name → permitted values; `None` permits any value.
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<Vec<String>>>,
    #[serde(default)]
    pub characters: PermittedCharacters,
}

/// A schema loaded from configuration, e.g.
///
/// ```json
/// { "roots": ["body"],
///   "elements": { "body": { "children": ["line"], "characters": "blip_text" },
///                 "line": { "attributes": { "t": ["h1", "h2"] } } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub elements: BTreeMap<String, ElementDefinition>,
    #[serde(default)]
    pub top_level_characters: PermittedCharacters,
}

impl SchemaDefinition {
    pub fn from_json(s: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl DocumentSchema for SchemaDefinition {
    fn permits_child(&self, parent: Option<&str>, child: &str) -> bool {
        match parent {
            None => self.roots.iter().any(|r| r == child),
            Some(p) => self
                .elements
                .get(p)
                .is_some_and(|e| e.children.iter().any(|c| c == child)),
        }
    }

    fn permits_attribute(&self, tag: &str, name: &str) -> bool {
        self.elements
            .get(tag)
            .is_some_and(|e| e.attributes.contains_key(name))
    }

    fn permits_attribute_value(&self, tag: &str, name: &str, value: &str) -> bool {
        match self.elements.get(tag).and_then(|e| e.attributes.get(name)) {
            None => false,
            Some(None) => true,
            Some(Some(values)) => values.iter().any(|v| v == value),
        }
    }

    fn permitted_characters(&self, tag: Option<&str>) -> PermittedCharacters {
        match tag {
            None => self.top_level_characters,
            Some(t) => self
                .elements
                .get(t)
                .map_or(PermittedCharacters::None, |e| e.characters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONVERSATION: &str = r#"{
        "roots": ["body"],
        "elements": {
            "body": { "children": ["line", "image"] },
            "line": { "attributes": { "t": ["h1", "h2"], "i": null } },
            "image": { "children": ["caption"], "attributes": { "attachment": null } },
            "caption": { "characters": "blip_text" }
        }
    }"#;

    #[test]
    fn loads_definition() {
        let s = SchemaDefinition::from_json(CONVERSATION).unwrap();
        assert!(s.permits_child(None, "body"));
        assert!(!s.permits_child(None, "line"));
        assert!(s.permits_child(Some("body"), "line"));
        assert!(!s.permits_child(Some("line"), "body"));
        assert!(!s.permits_child(Some("unknown"), "line"));
    }

    #[test]
    fn attributes_and_values() {
        let s = SchemaDefinition::from_json(CONVERSATION).unwrap();
        assert!(s.permits_attribute("line", "t"));
        assert!(!s.permits_attribute("line", "x"));
        assert!(s.permits_attribute_value("line", "t", "h1"));
        assert!(!s.permits_attribute_value("line", "t", "h9"));
        assert!(s.permits_attribute_value("line", "i", "anything"));
    }

    #[test]
    fn characters() {
        let s = SchemaDefinition::from_json(CONVERSATION).unwrap();
        assert!(s.permitted_characters(Some("caption")).allows_text());
        assert!(!s.permitted_characters(Some("body")).allows_text());
        assert!(!s.permitted_characters(None).allows_text());
        assert!(NoSchema.permitted_characters(None).allows_text());
    }

    #[test]
    fn rejects_malformed_definition() {
        assert!(matches!(
            SchemaDefinition::from_json(r#"{ "roots": 3 }"#),
            Err(SchemaError::Parse(_))
        ));
    }
}
