//! [`AnnotationBoundaryMap`]: the annotation component of a DocOp.
//!
//! At one document position a boundary lists the keys whose annotation ends
//! there and the keys that change from an asserted old value to a new one.
//! Both lists are sorted and their key sets are disjoint.

use std::fmt;

use crate::attributes::literal;

use super::DocOpError;

/// One `key: old -> new` entry of a boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationChange {
    pub key: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AnnotationBoundaryMap {
    ends: Vec<String>,
    changes: Vec<AnnotationChange>,
}

impl AnnotationBoundaryMap {
    /// A boundary that neither ends nor changes anything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> AnnotationBoundaryMapBuilder {
        AnnotationBoundaryMapBuilder::default()
    }

    pub fn ends(&self) -> &[String] {
        &self.ends
    }

    pub fn changes(&self) -> &[AnnotationChange] {
        &self.changes
    }

    pub fn end_size(&self) -> usize {
        self.ends.len()
    }

    pub fn change_size(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty() && self.changes.is_empty()
    }

    /// Swaps old and new values of every change; ends stay ends.
    pub fn inverse(&self) -> AnnotationBoundaryMap {
        AnnotationBoundaryMap {
            ends: self.ends.clone(),
            changes: self
                .changes
                .iter()
                .map(|c| AnnotationChange {
                    key: c.key.clone(),
                    old: c.new.clone(),
                    new: c.old.clone(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for AnnotationBoundaryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let entries = self
            .ends
            .iter()
            .map(|k| literal(Some(k)))
            .chain(self.changes.iter().map(|c| {
                format!(
                    "{}: {} -> {}",
                    literal(Some(&c.key)),
                    literal(c.old.as_deref()),
                    literal(c.new.as_deref())
                )
            }))
            .collect::<Vec<_>>();
        write!(f, "{{ {} }}", entries.join(", "))
    }
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Collects ends and changes in any order; [`build`](Self::build) sorts them
/// and rejects a key that appears twice.
#[derive(Debug, Default)]
pub struct AnnotationBoundaryMapBuilder {
    ends: Vec<String>,
    changes: Vec<AnnotationChange>,
}

impl AnnotationBoundaryMapBuilder {
    pub fn end(mut self, key: impl Into<String>) -> Self {
        self.ends.push(key.into());
        self
    }

    pub fn change(mut self, key: impl Into<String>, old: Option<&str>, new: Option<&str>) -> Self {
        self.changes.push(AnnotationChange {
            key: key.into(),
            old: old.map(str::to_owned),
            new: new.map(str::to_owned),
        });
        self
    }

    pub fn build(self) -> Result<AnnotationBoundaryMap, DocOpError> {
        let AnnotationBoundaryMapBuilder { mut ends, mut changes } = self;
        ends.sort();
        changes.sort_by(|a, b| a.key.cmp(&b.key));

        let mut keys: Vec<&str> = ends
            .iter()
            .map(String::as_str)
            .chain(changes.iter().map(|c| c.key.as_str()))
            .collect();
        keys.sort_unstable();
        if let Some(w) = keys.windows(2).find(|w| w[0] == w[1]) {
            return Err(DocOpError::DuplicateAnnotationKey(w[0].to_string()));
        }
        Ok(AnnotationBoundaryMap { ends, changes })
    }
}
