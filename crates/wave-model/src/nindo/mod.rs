//! Nindo: non-invertible, builder-friendly document mutations.
//!
//! A [`Nindo`] says *what* to do at each point of the document without
//! restating the content it removes or replaces: deletions carry only a
//! length, attribute changes only the new values, and annotations are opened
//! and closed with explicit start/end markers instead of boundary maps.
//! The target document fills in the rest when the Nindo is resolved into a
//! [`DocOp`].

pub mod annotation_builder;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::attributes::{literal, Attributes};
use crate::doc_op::{DocOp, DocOpComponent};

pub use annotation_builder::AnnotationBuilder;

/// Attribute name → new value; `None` removes the attribute.
pub type AttributeUpdates = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NindoError {
    #[error("cannot shift by {distance}: only {available} leading skip available")]
    NotEnoughInitialSkips { distance: usize, available: usize },
}

// ── Component ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NindoComponent {
    Skip(usize),
    Characters(String),
    ElementStart { tag: String, attrs: Attributes },
    ElementEnd,
    DeleteCharacters(usize),
    DeleteElementStart,
    DeleteElementEnd,
    ReplaceAttributes(Attributes),
    UpdateAttributes(AttributeUpdates),
    StartAnnotation { key: String, value: Option<String> },
    EndAnnotation(String),
}

impl fmt::Display for NindoComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NindoComponent::Skip(n) => write!(f, "__{n}; "),
            NindoComponent::Characters(s) => write!(f, "++{}; ", literal(Some(s))),
            NindoComponent::ElementStart { tag, attrs } => write!(f, "<< {tag} {attrs}; "),
            NindoComponent::ElementEnd => f.write_str(">>; "),
            NindoComponent::DeleteCharacters(n) => write!(f, "-- {n}; "),
            NindoComponent::DeleteElementStart => f.write_str("x<; "),
            NindoComponent::DeleteElementEnd => f.write_str("x>; "),
            NindoComponent::ReplaceAttributes(attrs) => write!(f, "s@ {attrs}; "),
            NindoComponent::UpdateAttributes(map) => {
                f.write_str("u@ ")?;
                if map.is_empty() {
                    f.write_str("{}")?;
                } else {
                    let entries: Vec<String> = map
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, literal(v.as_deref())))
                        .collect();
                    write!(f, "{{ {} }}", entries.join(", "))?;
                }
                f.write_str("; ")
            }
            NindoComponent::StartAnnotation { key, value } => {
                write!(f, "(( {}={}; ", key, literal(value.as_deref()))
            }
            NindoComponent::EndAnnotation(key) => write!(f, ")) {key}; "),
        }
    }
}

// ── Nindo ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Nindo {
    components: Vec<NindoComponent>,
}

impl Nindo {
    pub fn new(components: Vec<NindoComponent>) -> Self {
        Self { components }
    }

    pub fn builder() -> NindoBuilder {
        NindoBuilder::new()
    }

    pub fn components(&self) -> &[NindoComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NindoComponent> {
        self.components.iter()
    }

    /// Replays `op` as Nindo components.
    pub fn from_doc_op(op: &DocOp, remove_trailing_skip: bool) -> Nindo {
        let mut b = NindoBuilder::new();
        for component in op {
            b.doc_op_component(component);
        }
        if remove_trailing_skip {
            b.build_without_trailing_skip()
        } else {
            b.build()
        }
    }

    /// Moves the mutation `distance` items to the right (left if negative).
    pub fn shift(&self, distance: isize) -> Result<Nindo, NindoError> {
        if distance == 0 {
            return Ok(self.clone());
        }
        if distance > 0 {
            let mut components = Vec::with_capacity(self.components.len() + 1);
            components.push(NindoComponent::Skip(distance as usize));
            components.extend(self.components.iter().cloned());
            return Ok(Nindo { components });
        }

        let distance = distance.unsigned_abs();
        let mut remaining = distance;
        let mut components = self.components.iter().peekable();
        while remaining > 0 {
            match components.peek() {
                Some(NindoComponent::Skip(n)) if *n <= remaining => {
                    remaining -= n;
                    components.next();
                }
                Some(NindoComponent::Skip(n)) => {
                    let rest = n - remaining;
                    components.next();
                    let mut out = vec![NindoComponent::Skip(rest)];
                    out.extend(components.cloned());
                    return Ok(Nindo { components: out });
                }
                _ => {
                    return Err(NindoError::NotEnoughInitialSkips {
                        distance,
                        available: distance - remaining,
                    })
                }
            }
        }
        Ok(Nindo {
            components: components.cloned().collect(),
        })
    }

    // ── Factories ─────────────────────────────────────────────────────────

    fn at(location: usize, f: impl FnOnce(&mut NindoBuilder)) -> Nindo {
        let mut b = NindoBuilder::new();
        if location > 0 {
            b.skip(location);
        }
        f(&mut b);
        b.build()
    }

    pub fn insert_characters(location: usize, s: &str) -> Nindo {
        Self::at(location, |b| {
            b.characters(s);
        })
    }

    pub fn insert_element(location: usize, tag: &str, attrs: Attributes) -> Nindo {
        Self::at(location, |b| {
            b.element_start(tag, attrs).element_end();
        })
    }

    pub fn delete_characters(start: usize, end: usize) -> Nindo {
        Self::at(start, |b| {
            if end > start {
                b.delete_characters(end - start);
            }
        })
    }

    /// Deletes an element with no content.
    pub fn delete_element(location: usize) -> Nindo {
        Self::at(location, |b| {
            b.delete_element_start().delete_element_end();
        })
    }

    pub fn replace_attributes(location: usize, attrs: Attributes) -> Nindo {
        Self::at(location, |b| {
            b.replace_attributes(attrs);
        })
    }

    pub fn set_attribute(location: usize, name: &str, value: &str) -> Nindo {
        Self::at(location, |b| {
            b.update_attributes(BTreeMap::from([(name.to_string(), Some(value.to_string()))]));
        })
    }

    pub fn remove_attribute(location: usize, name: &str) -> Nindo {
        Self::at(location, |b| {
            b.update_attributes(BTreeMap::from([(name.to_string(), None)]));
        })
    }

    /// Sets `key` to `value` over `[start, end)`; empty when the range is.
    pub fn set_annotation(start: usize, end: usize, key: &str, value: Option<&str>) -> Nindo {
        if start == end {
            return Nindo::default();
        }
        Self::at(start, |b| {
            b.start_annotation(key, value.map(str::to_owned))
                .skip(end - start)
                .end_annotation(key);
        })
    }
}

impl fmt::Display for Nindo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for c in &self.components {
            write!(f, "{c}")?;
        }
        f.write_str("}")
    }
}

impl<'a> IntoIterator for &'a Nindo {
    type Item = &'a NindoComponent;
    type IntoIter = std::slice::Iter<'a, NindoComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct NindoBuilder {
    components: Vec<NindoComponent>,
}

impl NindoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, component: NindoComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// # Panics
    ///
    /// If `n` is zero.
    pub fn skip(&mut self, n: usize) -> &mut Self {
        assert!(n > 0, "skip distance must be positive");
        self.push(NindoComponent::Skip(n))
    }

    /// Appends text; an empty string is dropped.
    pub fn characters(&mut self, s: impl Into<String>) -> &mut Self {
        let s = s.into();
        if s.is_empty() {
            return self;
        }
        self.push(NindoComponent::Characters(s))
    }

    pub fn element_start(&mut self, tag: impl Into<String>, attrs: Attributes) -> &mut Self {
        self.push(NindoComponent::ElementStart { tag: tag.into(), attrs })
    }

    pub fn element_end(&mut self) -> &mut Self {
        self.push(NindoComponent::ElementEnd)
    }

    /// # Panics
    ///
    /// If `n` is zero.
    pub fn delete_characters(&mut self, n: usize) -> &mut Self {
        assert!(n > 0, "delete length must be positive");
        self.push(NindoComponent::DeleteCharacters(n))
    }

    pub fn delete_element_start(&mut self) -> &mut Self {
        self.push(NindoComponent::DeleteElementStart)
    }

    pub fn delete_element_end(&mut self) -> &mut Self {
        self.push(NindoComponent::DeleteElementEnd)
    }

    pub fn replace_attributes(&mut self, attrs: Attributes) -> &mut Self {
        self.push(NindoComponent::ReplaceAttributes(attrs))
    }

    pub fn update_attributes(&mut self, updates: AttributeUpdates) -> &mut Self {
        self.push(NindoComponent::UpdateAttributes(updates))
    }

    pub fn start_annotation(&mut self, key: impl Into<String>, value: Option<String>) -> &mut Self {
        self.push(NindoComponent::StartAnnotation { key: key.into(), value })
    }

    pub fn end_annotation(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(NindoComponent::EndAnnotation(key.into()))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn build(&self) -> Nindo {
        Nindo::new(self.components.clone())
    }

    /// Appends the mutation form of one DocOp component, dropping what it
    /// restates about the document.
    pub fn doc_op_component(&mut self, component: &DocOpComponent) -> &mut Self {
        match component {
            DocOpComponent::Retain(0) => self,
            DocOpComponent::Retain(n) => self.skip(*n),
            DocOpComponent::Characters(s) => self.characters(s.clone()),
            DocOpComponent::ElementStart { tag, attrs } => self.element_start(tag.clone(), attrs.clone()),
            DocOpComponent::ElementEnd => self.element_end(),
            DocOpComponent::DeleteCharacters(s) if s.is_empty() => self,
            DocOpComponent::DeleteCharacters(s) => self.delete_characters(s.chars().count()),
            DocOpComponent::DeleteElementStart { .. } => self.delete_element_start(),
            DocOpComponent::DeleteElementEnd => self.delete_element_end(),
            DocOpComponent::ReplaceAttributes { new, .. } => self.replace_attributes(new.clone()),
            DocOpComponent::UpdateAttributes(update) => {
                self.update_attributes(update.iter().map(|c| (c.key.clone(), c.new.clone())).collect())
            }
            DocOpComponent::AnnotationBoundary(map) => {
                for key in map.ends() {
                    self.end_annotation(key.clone());
                }
                for change in map.changes() {
                    self.start_annotation(change.key.clone(), change.new.clone());
                }
                self
            }
        }
    }

    /// Like [`build`](Self::build) but drops a final skip.
    pub fn build_without_trailing_skip(&self) -> Nindo {
        let mut components = self.components.clone();
        if matches!(components.last(), Some(NindoComponent::Skip(_))) {
            components.pop();
        }
        Nindo::new(components)
    }
}
