//! Tuning knobs for random mutation generation.

use serde::{Deserialize, Serialize};

/// One annotation key the generator may touch and the values it may set.
/// A `None` value clears the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationOption {
    pub key: String,
    pub values: Vec<Option<String>>,
}

impl AnnotationOption {
    pub fn new(key: &str, values: &[Option<&str>]) -> Self {
        Self {
            key: key.to_string(),
            values: values.iter().map(|v| v.map(str::to_string)).collect(),
        }
    }
}

/// Generator parameters. Missing JSON fields fall back to [`Parameters::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Parameters {
    /// Upper bound (exclusive) on components emitted before the closing phase.
    pub max_opening_components: usize,
    pub max_insert_length: usize,
    pub max_delete_length: usize,
    /// Generate mutations the validator accepts, or ones it rejects without
    /// being ill-formed.
    pub valid: bool,
    /// How far past the end of the document an invalid skip may reach.
    pub max_skip_after_end: usize,
    pub element_types: Vec<String>,
    pub attribute_names: Vec<String>,
    /// A `None` value removes the attribute and is only used by updates.
    pub attribute_values: Vec<Option<String>>,
    pub annotation_options: Vec<AnnotationOption>,
}

impl Default for Parameters {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            max_opening_components: 16,
            max_insert_length: 10,
            max_delete_length: 5,
            valid: true,
            max_skip_after_end: 5,
            element_types: strings(&["body", "line", "input", "image", "caption", "br"]),
            attribute_names: strings(&[
                "_t",
                "t",
                "i",
                "attachment",
                "style",
                "blipId",
                "state",
                "url",
                "fontWeight",
                "fontStyle",
                "invalid_dummy",
            ]),
            attribute_values: [
                None,
                Some("title"),
                Some("li"),
                Some("h1"),
                Some("h2"),
                Some("h3"),
                Some("h4"),
                Some(""),
                Some("0"),
                Some("1"),
                Some("2"),
                Some("3"),
                Some("4"),
                Some("5"),
                Some("114"),
                Some("9817"),
            ]
            .iter()
            .map(|v| v.map(str::to_string))
            .collect(),
            annotation_options: vec![
                AnnotationOption::new("a", &[None, Some("1"), Some("2")]),
                AnnotationOption::new("b", &[None, Some("1")]),
                AnnotationOption::new("c", &[None, Some("1")]),
            ],
        }
    }
}

impl Parameters {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Same parameters with the validity target flipped to `valid`.
    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn annotation_keys(&self) -> impl Iterator<Item = &str> {
        self.annotation_options.iter().map(|o| o.key.as_str())
    }
}
