//! Invertible document operations.
//!
//! # Operation format
//!
//! A [`DocOp`] is a sequence of components walked left to right over the
//! original document:
//! - `Retain(n)`: keep `n` items
//! - `Characters(s)` / `DeleteCharacters(s)`: insert / remove text
//! - `ElementStart` / `ElementEnd`: insert an element (tokens bracket its content)
//! - `DeleteElementStart` / `DeleteElementEnd`: remove an existing element
//! - `ReplaceAttributes` / `UpdateAttributes`: change the attributes of the
//!   element whose start token is at the cursor
//! - `AnnotationBoundary`: change annotation values from this position on
//!
//! The type can hold ill-formed sequences; well-formedness is decided by the
//! [`crate::automaton::NindoAutomaton`] and by application to a document.

pub mod boundary;
pub mod builder;
pub mod codec;
pub mod xml;

use std::fmt;

use thiserror::Error;

use crate::attributes::{literal, Attributes, AttributesUpdate};

pub use boundary::{AnnotationBoundaryMap, AnnotationBoundaryMapBuilder, AnnotationChange};
pub use builder::DocOpBuilder;

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocOpError {
    #[error("duplicate annotation key in boundary: {0:?}")]
    DuplicateAnnotationKey(String),
}

// ── Component ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocOpComponent {
    Retain(usize),
    Characters(String),
    ElementStart { tag: String, attrs: Attributes },
    ElementEnd,
    DeleteCharacters(String),
    DeleteElementStart { tag: String, attrs: Attributes },
    DeleteElementEnd,
    ReplaceAttributes { old: Attributes, new: Attributes },
    UpdateAttributes(AttributesUpdate),
    AnnotationBoundary(AnnotationBoundaryMap),
}

impl DocOpComponent {
    /// Number of items this component consumes from the original document.
    pub fn src_len(&self) -> usize {
        match self {
            DocOpComponent::Retain(n) => *n,
            DocOpComponent::DeleteCharacters(s) => s.chars().count(),
            DocOpComponent::DeleteElementStart { .. }
            | DocOpComponent::DeleteElementEnd
            | DocOpComponent::ReplaceAttributes { .. }
            | DocOpComponent::UpdateAttributes(_) => 1,
            DocOpComponent::Characters(_)
            | DocOpComponent::ElementStart { .. }
            | DocOpComponent::ElementEnd
            | DocOpComponent::AnnotationBoundary(_) => 0,
        }
    }

    /// Number of items this component produces in the resulting document.
    pub fn dst_len(&self) -> usize {
        match self {
            DocOpComponent::Retain(n) => *n,
            DocOpComponent::Characters(s) => s.chars().count(),
            DocOpComponent::ElementStart { .. }
            | DocOpComponent::ElementEnd
            | DocOpComponent::ReplaceAttributes { .. }
            | DocOpComponent::UpdateAttributes(_) => 1,
            DocOpComponent::DeleteCharacters(_)
            | DocOpComponent::DeleteElementStart { .. }
            | DocOpComponent::DeleteElementEnd
            | DocOpComponent::AnnotationBoundary(_) => 0,
        }
    }

    pub fn invert(&self) -> DocOpComponent {
        match self {
            DocOpComponent::Retain(n) => DocOpComponent::Retain(*n),
            DocOpComponent::Characters(s) => DocOpComponent::DeleteCharacters(s.clone()),
            DocOpComponent::DeleteCharacters(s) => DocOpComponent::Characters(s.clone()),
            DocOpComponent::ElementStart { tag, attrs } => DocOpComponent::DeleteElementStart {
                tag: tag.clone(),
                attrs: attrs.clone(),
            },
            DocOpComponent::DeleteElementStart { tag, attrs } => DocOpComponent::ElementStart {
                tag: tag.clone(),
                attrs: attrs.clone(),
            },
            DocOpComponent::ElementEnd => DocOpComponent::DeleteElementEnd,
            DocOpComponent::DeleteElementEnd => DocOpComponent::ElementEnd,
            DocOpComponent::ReplaceAttributes { old, new } => DocOpComponent::ReplaceAttributes {
                old: new.clone(),
                new: old.clone(),
            },
            DocOpComponent::UpdateAttributes(u) => DocOpComponent::UpdateAttributes(u.inverse()),
            DocOpComponent::AnnotationBoundary(m) => DocOpComponent::AnnotationBoundary(m.inverse()),
        }
    }

    fn is_initialization_component(&self) -> bool {
        matches!(
            self,
            DocOpComponent::Characters(_)
                | DocOpComponent::ElementStart { .. }
                | DocOpComponent::ElementEnd
                | DocOpComponent::AnnotationBoundary(_)
        )
    }
}

impl fmt::Display for DocOpComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocOpComponent::Retain(n) => write!(f, "__{n}; "),
            DocOpComponent::Characters(s) => write!(f, "++{}; ", literal(Some(s))),
            DocOpComponent::ElementStart { tag, attrs } => write!(f, "<< {tag} {attrs}; "),
            DocOpComponent::ElementEnd => f.write_str(">>; "),
            DocOpComponent::DeleteCharacters(s) => write!(f, "--{}; ", literal(Some(s))),
            DocOpComponent::DeleteElementStart { tag, attrs } => write!(f, "x< {tag} {attrs}; "),
            DocOpComponent::DeleteElementEnd => f.write_str("x>; "),
            DocOpComponent::ReplaceAttributes { old, new } => write!(f, "r@ {old} {new}; "),
            DocOpComponent::UpdateAttributes(u) => write!(f, "u@ {u}; "),
            DocOpComponent::AnnotationBoundary(m) => write!(f, "|| {m}; "),
        }
    }
}

// ── DocOp ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocOp {
    components: Vec<DocOpComponent>,
}

impl DocOp {
    pub fn new(components: Vec<DocOpComponent>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[DocOpComponent] {
        &self.components
    }

    pub fn into_components(self) -> Vec<DocOpComponent> {
        self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocOpComponent> {
        self.components.iter()
    }

    /// Items the operation expects in the document it applies to.
    pub fn initial_document_length(&self) -> usize {
        self.components.iter().map(DocOpComponent::src_len).sum()
    }

    /// Items in the document the operation produces.
    pub fn resulting_document_length(&self) -> usize {
        self.components.iter().map(DocOpComponent::dst_len).sum()
    }

    /// Whether the operation only builds content from nothing.
    pub fn is_initialization(&self) -> bool {
        self.components.iter().all(DocOpComponent::is_initialization_component)
    }

    /// The operation that undoes `self`.
    pub fn invert(&self) -> DocOp {
        DocOp {
            components: self.components.iter().map(DocOpComponent::invert).collect(),
        }
    }

    pub fn to_concise_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.components {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl From<Vec<DocOpComponent>> for DocOp {
    fn from(components: Vec<DocOpComponent>) -> Self {
        Self { components }
    }
}

impl<'a> IntoIterator for &'a DocOp {
    type Item = &'a DocOpComponent;
    type IntoIter = std::slice::Iter<'a, DocOpComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}
