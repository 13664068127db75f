//! XML form of document initializations.
//!
//! A document initialization renders as compact XML.  Annotation changes are
//! written as `<?a "key"="value" "ended"?>` processing instructions at the
//! position where they take effect.  Inside the instruction, keys and values
//! escape `\` as `\\`, `"` as `\"` and `?` as `\q` before ordinary XML text
//! escaping, so `?>` can never appear in a key or value.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::attributes::Attributes;

use super::{AnnotationBoundaryMap, DocOp, DocOpBuilder, DocOpComponent};

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum XmlError {
    #[error("operation is not a document initialization")]
    NotInitialization,
    #[error("element end with no open element")]
    UnmatchedElementEnd,
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("end tag </{found}> does not match <{expected}>")]
    MismatchedEndTag { expected: String, found: String },
    #[error("unknown entity &{0};")]
    UnknownEntity(String),
    #[error("annotation {0:?} ended but never started")]
    AnnotationNotOpen(String),
    #[error("malformed XML at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

// ── Escaping ──────────────────────────────────────────────────────────────

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

fn escape_annotation(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('?', "\\q")
}

// ── Serializer ────────────────────────────────────────────────────────────

/// Renders a document initialization as XML.
pub fn to_xml_string(op: &DocOp) -> Result<String, XmlError> {
    let mut out = String::new();
    let mut tags: Vec<&str> = Vec::new();
    // `<tag attrs` written, `>` or `/>` still pending.
    let mut open_pending = false;
    let mut annotations: BTreeMap<&str, &str> = BTreeMap::new();

    fn flush(out: &mut String, open_pending: &mut bool) {
        if *open_pending {
            out.push('>');
            *open_pending = false;
        }
    }

    for component in op {
        match component {
            DocOpComponent::Characters(s) => {
                flush(&mut out, &mut open_pending);
                out.push_str(&escape_text(s));
            }
            DocOpComponent::ElementStart { tag, attrs } => {
                flush(&mut out, &mut open_pending);
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs.iter() {
                    out.push_str(&format!(" {}=\"{}\"", k, escape_attr(v)));
                }
                open_pending = true;
                tags.push(tag);
            }
            DocOpComponent::ElementEnd => {
                let tag = tags.pop().ok_or(XmlError::UnmatchedElementEnd)?;
                if open_pending {
                    out.push_str("/>");
                    open_pending = false;
                } else {
                    out.push_str(&format!("</{tag}>"));
                }
            }
            DocOpComponent::AnnotationBoundary(map) => {
                let mut changed: BTreeMap<&str, Option<&str>> = BTreeMap::new();
                for key in map.ends() {
                    if annotations.remove(key.as_str()).is_some() {
                        changed.insert(key.as_str(), None);
                    }
                }
                for change in map.changes() {
                    let current = annotations.get(change.key.as_str()).copied();
                    let new = change.new.as_deref();
                    if current != new {
                        changed.insert(change.key.as_str(), new);
                        match new {
                            Some(v) => annotations.insert(change.key.as_str(), v),
                            None => annotations.remove(change.key.as_str()),
                        };
                    }
                }
                if changed.is_empty() {
                    continue;
                }
                flush(&mut out, &mut open_pending);
                out.push_str("<?a");
                for (key, value) in changed {
                    out.push_str(&format!(" \"{}\"", escape_text(&escape_annotation(key))));
                    if let Some(v) = value {
                        out.push_str(&format!("=\"{}\"", escape_text(&escape_annotation(v))));
                    }
                }
                out.push_str("?>");
            }
            _ => return Err(XmlError::NotInitialization),
        }
    }
    if let Some(tag) = tags.pop() {
        return Err(XmlError::UnclosedElement(tag.to_string()));
    }
    Ok(out)
}

// ── Parser ────────────────────────────────────────────────────────────────

/// Parses the XML form back into a document initialization.
///
/// Annotations still open at the end of the input are ended by a final
/// boundary, so the result always closes every key it opens.
pub fn parse_initialization(xml: &str) -> Result<DocOp, XmlError> {
    XmlParser::new(xml).parse()
}

struct XmlParser<'a> {
    src: &'a str,
    pos: usize,
    builder: DocOpBuilder,
    tags: Vec<String>,
    text: String,
    annotations: BTreeMap<String, String>,
}

impl<'a> XmlParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            builder: DocOpBuilder::new(),
            tags: Vec::new(),
            text: String::new(),
            annotations: BTreeMap::new(),
        }
    }

    fn malformed<T>(&self, reason: &str) -> Result<T, XmlError> {
        Err(XmlError::Malformed {
            offset: self.pos,
            reason: reason.to_string(),
        })
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_ascii_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.builder.characters(text);
        }
    }

    fn parse(mut self) -> Result<DocOp, XmlError> {
        while let Some(c) = self.peek() {
            if c == '<' {
                self.flush_text();
                if self.eat("<?a") {
                    self.parse_annotations()?;
                } else if self.eat("</") {
                    self.parse_end_tag()?;
                } else {
                    self.pos += 1;
                    self.parse_start_tag()?;
                }
            } else if c == '&' {
                let decoded = self.parse_entity()?;
                self.text.push(decoded);
            } else if c == '>' {
                return self.malformed("unescaped '>' in text");
            } else {
                self.text.push(c);
                self.pos += c.len_utf8();
            }
        }
        self.flush_text();
        if let Some(tag) = self.tags.pop() {
            return Err(XmlError::UnclosedElement(tag));
        }
        if !self.annotations.is_empty() {
            let map = self
                .annotations
                .keys()
                .fold(AnnotationBoundaryMap::builder(), |b, k| b.end(k.clone()))
                .build()
                .map_err(|e| XmlError::Malformed {
                    offset: self.pos,
                    reason: e.to_string(),
                })?;
            self.builder.annotation_boundary(map);
        }
        Ok(self.builder.build())
    }

    fn parse_name(&mut self) -> Result<String, XmlError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<' | '"' | '\'') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return self.malformed("expected a name");
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_start_tag(&mut self) -> Result<(), XmlError> {
        let tag = self.parse_name()?;
        let mut pairs = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                let attrs = self.attributes(pairs)?;
                self.builder.element_start(tag, attrs).element_end();
                return Ok(());
            }
            if self.eat(">") {
                let attrs = self.attributes(pairs)?;
                self.builder.element_start(tag.clone(), attrs);
                self.tags.push(tag);
                return Ok(());
            }
            if self.peek().is_none() {
                return self.malformed("unterminated start tag");
            }
            let name = self.parse_name()?;
            self.skip_whitespace();
            if !self.eat("=") {
                return self.malformed("expected '=' after attribute name");
            }
            self.skip_whitespace();
            let value = self.parse_attribute_value()?;
            pairs.push((name, value));
        }
    }

    fn attributes(&self, pairs: Vec<(String, String)>) -> Result<Attributes, XmlError> {
        Attributes::from_pairs(pairs).map_err(|e| XmlError::Malformed {
            offset: self.pos,
            reason: e.to_string(),
        })
    }

    fn parse_attribute_value(&mut self) -> Result<String, XmlError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return self.malformed("expected quoted attribute value"),
        };
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('<') => return self.malformed("unterminated attribute value"),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('&') => value.push(self.parse_entity()?),
                Some(c) => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn parse_end_tag(&mut self) -> Result<(), XmlError> {
        let found = self.parse_name()?;
        self.skip_whitespace();
        if !self.eat(">") {
            return self.malformed("unterminated end tag");
        }
        match self.tags.pop() {
            None => Err(XmlError::UnmatchedElementEnd),
            Some(expected) if expected != found => Err(XmlError::MismatchedEndTag { expected, found }),
            Some(_) => {
                self.builder.element_end();
                Ok(())
            }
        }
    }

    fn parse_entity(&mut self) -> Result<char, XmlError> {
        let rest = self.rest();
        let end = match rest.find(';') {
            Some(end) => end,
            None => return self.malformed("unterminated entity"),
        };
        let name = &rest[1..end];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
            }
        };
        match decoded {
            Some(c) => {
                self.pos += end + 1;
                Ok(c)
            }
            None => Err(XmlError::UnknownEntity(name.to_string())),
        }
    }

    fn parse_annotations(&mut self) -> Result<(), XmlError> {
        let body_len = match self.rest().find("?>") {
            Some(n) => n,
            None => return self.malformed("unterminated annotation instruction"),
        };
        let body_start = self.pos;
        let body = self.unescape_text(&self.src[body_start..body_start + body_len])?;
        self.pos = body_start + body_len + 2;

        let mut tokens = AnnotationTokens { chars: body.chars().peekable() };
        let mut builder = AnnotationBoundaryMap::builder();
        while let Some(key) = tokens.next_quoted().map_err(|reason| XmlError::Malformed {
            offset: body_start,
            reason,
        })? {
            let value = if tokens.eat('=') {
                match tokens.next_quoted() {
                    Ok(Some(v)) => Some(v),
                    Ok(None) => return self.malformed("expected annotation value after '='"),
                    Err(reason) => return Err(XmlError::Malformed { offset: body_start, reason }),
                }
            } else {
                None
            };
            match value {
                Some(v) => {
                    builder = builder.change(key.clone(), None, Some(&v));
                    self.annotations.insert(key, v);
                }
                None => {
                    if self.annotations.remove(&key).is_none() {
                        return Err(XmlError::AnnotationNotOpen(key));
                    }
                    builder = builder.end(key);
                }
            }
        }
        let map = builder.build().map_err(|e| XmlError::Malformed {
            offset: body_start,
            reason: e.to_string(),
        })?;
        self.builder.annotation_boundary(map);
        Ok(())
    }

    fn unescape_text(&self, s: &str) -> Result<String, XmlError> {
        let mut inner = XmlParser::new(s);
        let mut out = String::new();
        while let Some(c) = inner.peek() {
            if c == '&' {
                out.push(inner.parse_entity()?);
            } else {
                out.push(c);
                inner.pos += c.len_utf8();
            }
        }
        Ok(out)
    }
}

struct AnnotationTokens<I: Iterator<Item = char>> {
    chars: std::iter::Peekable<I>,
}

impl<I: Iterator<Item = char>> AnnotationTokens<I> {
    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.chars.peek() == Some(&expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    /// Reads the next `"..."` token, or `None` at the end of the body.
    fn next_quoted(&mut self) -> Result<Option<String>, String> {
        self.skip_whitespace();
        match self.chars.next() {
            None => return Ok(None),
            Some('"') => {}
            Some(c) => return Err(format!("unexpected {c:?} in annotation instruction")),
        }
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unterminated annotation string".to_string()),
                Some('"') => return Ok(Some(out)),
                Some('\\') => match self.chars.next() {
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some('q') => out.push('?'),
                    other => return Err(format!("bad annotation escape {other:?}")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}
