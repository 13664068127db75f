//! JSON codec for document operations.
//!
//! A DocOp encodes as an array with one single-key object per component,
//! e.g. `[{"retain":2},{"characters":"ab"},{"elementEnd":true}]`.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::attributes::{AttributeChange, Attributes, AttributesUpdate};

use super::{AnnotationBoundaryMap, DocOp, DocOpComponent};

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid component: {0}")]
    InvalidComponent(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, CodecError> {
    Err(CodecError::InvalidComponent(msg.into()))
}

// ── Value helpers ─────────────────────────────────────────────────────────

fn encode_attributes(attrs: &Attributes) -> Value {
    let mut map = Map::new();
    for (k, v) in attrs.iter() {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    Value::Object(map)
}

fn decode_attributes(v: &Value) -> Result<Attributes, CodecError> {
    let obj = match v.as_object() {
        Some(obj) => obj,
        None => return invalid("attributes must be an object"),
    };
    let mut pairs = Vec::with_capacity(obj.len());
    for (k, v) in obj {
        match v.as_str() {
            Some(s) => pairs.push((k.clone(), s.to_string())),
            None => return invalid(format!("attribute {k} must be a string")),
        }
    }
    Attributes::from_pairs(pairs).map_err(|e| CodecError::InvalidComponent(e.to_string()))
}

fn encode_opt(v: Option<&str>) -> Value {
    v.map_or(Value::Null, |s| Value::String(s.to_string()))
}

fn decode_opt(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, CodecError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => invalid(format!("{key} must be a string or null")),
    }
}

fn decode_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, CodecError> {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) => Ok(s),
        None => invalid(format!("missing string field {key}")),
    }
}

fn encode_element(tag: &str, attrs: &Attributes) -> Value {
    json!({ "type": tag, "attributes": encode_attributes(attrs) })
}

fn decode_element(v: &Value) -> Result<(String, Attributes), CodecError> {
    let obj = match v.as_object() {
        Some(obj) => obj,
        None => return invalid("element must be an object"),
    };
    let tag = decode_str(obj, "type")?.to_string();
    let attrs = match obj.get("attributes") {
        Some(a) => decode_attributes(a)?,
        None => Attributes::new(),
    };
    Ok((tag, attrs))
}

fn encode_change(key: &str, old: Option<&str>, new: Option<&str>) -> Value {
    json!({ "key": key, "oldValue": encode_opt(old), "newValue": encode_opt(new) })
}

fn decode_changes(v: &Value) -> Result<Vec<AttributeChange>, CodecError> {
    let arr = match v.as_array() {
        Some(arr) => arr,
        None => return invalid("changes must be an array"),
    };
    arr.iter()
        .map(|item| {
            let obj = match item.as_object() {
                Some(obj) => obj,
                None => return invalid("change must be an object"),
            };
            Ok(AttributeChange {
                key: decode_str(obj, "key")?.to_string(),
                old: decode_opt(obj, "oldValue")?,
                new: decode_opt(obj, "newValue")?,
            })
        })
        .collect()
}

// ── Serialization ─────────────────────────────────────────────────────────

pub fn component_to_json(c: &DocOpComponent) -> Value {
    match c {
        DocOpComponent::Retain(n) => json!({ "retain": n }),
        DocOpComponent::Characters(s) => json!({ "characters": s }),
        DocOpComponent::ElementStart { tag, attrs } => {
            json!({ "elementStart": encode_element(tag, attrs) })
        }
        DocOpComponent::ElementEnd => json!({ "elementEnd": true }),
        DocOpComponent::DeleteCharacters(s) => json!({ "deleteCharacters": s }),
        DocOpComponent::DeleteElementStart { tag, attrs } => {
            json!({ "deleteElementStart": encode_element(tag, attrs) })
        }
        DocOpComponent::DeleteElementEnd => json!({ "deleteElementEnd": true }),
        DocOpComponent::ReplaceAttributes { old, new } => json!({
            "replaceAttributes": {
                "oldAttributes": encode_attributes(old),
                "newAttributes": encode_attributes(new),
            }
        }),
        DocOpComponent::UpdateAttributes(u) => {
            let changes: Vec<Value> = u
                .iter()
                .map(|c| encode_change(&c.key, c.old.as_deref(), c.new.as_deref()))
                .collect();
            json!({ "updateAttributes": changes })
        }
        DocOpComponent::AnnotationBoundary(m) => {
            let changes: Vec<Value> = m
                .changes()
                .iter()
                .map(|c| encode_change(&c.key, c.old.as_deref(), c.new.as_deref()))
                .collect();
            json!({ "annotationBoundary": { "end": m.ends(), "change": changes } })
        }
    }
}

/// Serialize a [`DocOp`] to a JSON array.
pub fn to_json(op: &DocOp) -> Value {
    Value::Array(op.iter().map(component_to_json).collect())
}

pub fn to_json_string(op: &DocOp) -> String {
    to_json(op).to_string()
}

// ── Deserialization ───────────────────────────────────────────────────────

pub fn component_from_json(v: &Value) -> Result<DocOpComponent, CodecError> {
    let obj = match v.as_object() {
        Some(obj) if obj.len() == 1 => obj,
        _ => return invalid("component must be an object with exactly one field"),
    };
    let (name, body) = match obj.iter().next() {
        Some(entry) => entry,
        None => return invalid("empty component"),
    };
    match name.as_str() {
        "retain" => match body.as_u64() {
            Some(n) => Ok(DocOpComponent::Retain(n as usize)),
            None => invalid("retain must be a non-negative integer"),
        },
        "characters" => match body.as_str() {
            Some(s) => Ok(DocOpComponent::Characters(s.to_string())),
            None => invalid("characters must be a string"),
        },
        "deleteCharacters" => match body.as_str() {
            Some(s) => Ok(DocOpComponent::DeleteCharacters(s.to_string())),
            None => invalid("deleteCharacters must be a string"),
        },
        "elementStart" => {
            let (tag, attrs) = decode_element(body)?;
            Ok(DocOpComponent::ElementStart { tag, attrs })
        }
        "deleteElementStart" => {
            let (tag, attrs) = decode_element(body)?;
            Ok(DocOpComponent::DeleteElementStart { tag, attrs })
        }
        "elementEnd" => Ok(DocOpComponent::ElementEnd),
        "deleteElementEnd" => Ok(DocOpComponent::DeleteElementEnd),
        "replaceAttributes" => {
            let obj = match body.as_object() {
                Some(obj) => obj,
                None => return invalid("replaceAttributes must be an object"),
            };
            let empty = Value::Object(Map::new());
            Ok(DocOpComponent::ReplaceAttributes {
                old: decode_attributes(obj.get("oldAttributes").unwrap_or(&empty))?,
                new: decode_attributes(obj.get("newAttributes").unwrap_or(&empty))?,
            })
        }
        "updateAttributes" => {
            let update = AttributesUpdate::from_changes(decode_changes(body)?)
                .map_err(|e| CodecError::InvalidComponent(e.to_string()))?;
            Ok(DocOpComponent::UpdateAttributes(update))
        }
        "annotationBoundary" => {
            let obj = match body.as_object() {
                Some(obj) => obj,
                None => return invalid("annotationBoundary must be an object"),
            };
            let mut builder = AnnotationBoundaryMap::builder();
            if let Some(ends) = obj.get("end") {
                let ends = match ends.as_array() {
                    Some(ends) => ends,
                    None => return invalid("end must be an array"),
                };
                for key in ends {
                    match key.as_str() {
                        Some(k) => builder = builder.end(k),
                        None => return invalid("end keys must be strings"),
                    }
                }
            }
            if let Some(changes) = obj.get("change") {
                for c in decode_changes(changes)? {
                    builder = builder.change(c.key, c.old.as_deref(), c.new.as_deref());
                }
            }
            let map = builder
                .build()
                .map_err(|e| CodecError::InvalidComponent(e.to_string()))?;
            Ok(DocOpComponent::AnnotationBoundary(map))
        }
        other => invalid(format!("unknown component type {other}")),
    }
}

/// Deserialize a JSON array into a [`DocOp`].
pub fn from_json(v: &Value) -> Result<DocOp, CodecError> {
    let arr = match v.as_array() {
        Some(arr) => arr,
        None => return invalid("operation must be an array"),
    };
    let components = arr
        .iter()
        .map(component_from_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DocOp::new(components))
}

pub fn from_json_str(s: &str) -> Result<DocOp, CodecError> {
    let value: Value = serde_json::from_str(s)?;
    from_json(&value)
}
