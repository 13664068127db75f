//! wave-model: the operational-transform core of the Wave document model.
//!
//! Documents are linear token streams of characters and element start/end
//! tokens with a range-valued annotation overlay.  Edits are expressed as
//! invertible [`doc_op::DocOp`]s or builder-friendly [`nindo::Nindo`]s and are
//! checked by the [`automaton::NindoAutomaton`] against a document and a
//! [`schema::DocumentSchema`] before they are applied.

// Leaf types
pub mod attributes;
pub mod xml_name;

pub mod doc_op;
pub mod nindo;

pub mod annotation;
pub mod document;
pub mod schema;

pub mod automaton;
pub mod validator;

pub mod cost;
pub mod cli;

pub use attributes::{AttributeChange, Attributes, AttributesError, AttributesUpdate};
pub use doc_op::{AnnotationBoundaryMap, DocOp, DocOpBuilder, DocOpComponent, DocOpError};
pub use nindo::{Nindo, NindoBuilder, NindoComponent, NindoError};
