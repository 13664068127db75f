//! Read access to a linear document, and the arena-backed [`IndexedDocument`].
//!
//! A document is a sequence of items: single characters and element
//! start/end tokens.  Position `p` is the insertion point before item `p`.

pub mod indexed;
mod nindo_consumer;

use thiserror::Error;

use crate::annotation::{AnnotationError, ReadableAnnotationSet};
use crate::attributes::{Attributes, AttributesError};
use crate::doc_op::xml::XmlError;

pub use indexed::{ElementId, IndexedDocument};

// ── Error ─────────────────────────────────────────────────────────────────

/// Why an operation could not be applied to a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("operation reads past the end of the document at {0}")]
    PastEnd(usize),
    #[error("expected {expected} at position {pos}")]
    UnexpectedItem { pos: usize, expected: &'static str },
    #[error("deleted characters {expected:?} do not match document text {actual:?}")]
    DeletedCharactersMismatch { expected: String, actual: String },
    #[error("deleted element does not match the document at position {0}")]
    DeletedElementMismatch(usize),
    #[error("old attributes do not match the document at position {0}")]
    OldAttributesMismatch(usize),
    #[error("annotation {key:?} at position {pos} does not hold the old value {expected:?}")]
    OldAnnotationMismatch { pos: usize, key: String, expected: Option<String> },
    #[error("operation covers {expected} items but the document has {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("ill-formed operation: {0}")]
    IllFormed(String),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Attributes(#[from] AttributesError),
    #[error(transparent)]
    Xml(#[from] XmlError),
}

// ── Items ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocItem<'a> {
    Character(char),
    ElementStart { tag: &'a str, attrs: &'a Attributes },
    ElementEnd { tag: &'a str },
}

/// Kind of the item at a position; `End` is the end of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocSymbol {
    Character,
    Open,
    Close,
    End,
}

pub trait ReadableDocument {
    type Annotations: ReadableAnnotationSet;

    /// Number of items.
    fn size(&self) -> usize;

    fn item_at(&self, pos: usize) -> Option<DocItem<'_>>;

    fn symbol_at(&self, pos: usize) -> DocSymbol {
        match self.item_at(pos) {
            None => DocSymbol::End,
            Some(DocItem::Character(_)) => DocSymbol::Character,
            Some(DocItem::ElementStart { .. }) => DocSymbol::Open,
            Some(DocItem::ElementEnd { .. }) => DocSymbol::Close,
        }
    }

    /// Tag of the element that contains the insertion point `pos`, or `None`
    /// at the top level.
    fn enclosing_element_tag(&self, pos: usize) -> Option<&str>;

    /// Number of consecutive characters starting at `pos`.
    fn remaining_characters_in_element(&self, pos: usize) -> usize {
        let mut n = 0;
        while let Some(DocItem::Character(_)) = self.item_at(pos + n) {
            n += 1;
        }
        n
    }

    fn annotations(&self) -> &Self::Annotations;
}
