//! Core logic behind the `docop-validate` binary: validate a JSON-encoded
//! DocOp against an XML document and, when valid, apply it.

use log::info;
use thiserror::Error;

use crate::doc_op::codec::{from_json_str, CodecError};
use crate::document::{IndexedDocument, OperationError};
use crate::schema::{NoSchema, SchemaDefinition, SchemaError};
use crate::validator::validate_doc_op;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error("{0}")]
    Schema(#[from] SchemaError),
    #[error("{0}")]
    Document(#[from] OperationError),
    /// The operation was decoded but did not validate.
    #[error("{0}")]
    Rejected(String),
}

/// Validates `op_json` against the document `xml`, under `schema_json` or no
/// schema, and returns the resulting document XML.
pub fn validate_and_apply(xml: &str, op_json: &str, schema_json: Option<&str>) -> Result<String, CliError> {
    let mut doc = IndexedDocument::from_xml(xml)?;
    let op = from_json_str(op_json)?;
    let violations = match schema_json {
        Some(s) => validate_doc_op(&doc, &op, &SchemaDefinition::from_json(s)?),
        None => validate_doc_op(&doc, &op, &NoSchema),
    };
    if let Some(reason) = violations.first_description() {
        return Err(CliError::Rejected(reason));
    }
    doc.consume(&op)?;
    info!("applied {} components", op.len());
    Ok(doc.to_xml_string())
}
