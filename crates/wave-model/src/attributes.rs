//! Element attributes and attribute deltas.
//!
//! [`Attributes`] is an immutable name → value map kept in sorted key order.
//! [`AttributesUpdate`] is an immutable name → (old, new) map where `None`
//! stands for "attribute absent".  Both are small, so they are stored as
//! sorted vectors and searched with binary search.

use std::fmt;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributesError {
    #[error("duplicate attribute key: {0}")]
    DuplicateKey(String),
    #[error("mismatched old value for attribute {key}: expected {expected:?}, found {actual:?}")]
    MismatchedOldValue {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },
}

// ── Attributes ────────────────────────────────────────────────────────────

/// Immutable sorted attribute map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// The empty attribute map.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// A map holding exactly one attribute.
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entries: vec![(key.into(), value.into())],
        }
    }

    /// Builds a map from `(name, value)` pairs in any order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, AttributesError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(AttributesError::DuplicateKey(w[0].0.clone()));
        }
        Ok(Self { entries })
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).ok().map(|i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Applies `update`, checking that each change's old value matches the
    /// current value of the attribute.
    pub fn update_with(&self, update: &AttributesUpdate) -> Result<Attributes, AttributesError> {
        for change in update.iter() {
            let actual = self.get(&change.key);
            if actual != change.old.as_deref() {
                return Err(AttributesError::MismatchedOldValue {
                    key: change.key.clone(),
                    expected: change.old.clone(),
                    actual: actual.map(str::to_owned),
                });
            }
        }
        Ok(self.update_with_no_compatibility_check(update))
    }

    /// Applies `update` ignoring the asserted old values.
    pub fn update_with_no_compatibility_check(&self, update: &AttributesUpdate) -> Attributes {
        // Both sides are sorted, so a single merge pass suffices.
        let mut entries = Vec::with_capacity(self.entries.len() + update.len());
        let mut mine = self.entries.iter().peekable();
        let mut theirs = update.iter().peekable();
        loop {
            match (mine.peek(), theirs.peek()) {
                (None, None) => break,
                (Some(_), None) => entries.extend(mine.by_ref().cloned()),
                (None, Some(_)) => {
                    for change in theirs.by_ref() {
                        if let Some(new) = &change.new {
                            entries.push((change.key.clone(), new.clone()));
                        }
                    }
                }
                (Some((k, _)), Some(change)) => {
                    if k.as_str() < change.key.as_str() {
                        entries.extend(mine.next().cloned());
                    } else {
                        if k.as_str() == change.key.as_str() {
                            mine.next();
                        }
                        if let Some(new) = &change.new {
                            entries.push((change.key.clone(), new.clone()));
                        }
                        theirs.next();
                    }
                }
            }
        }
        Attributes { entries }
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", k, literal(Some(v)))?;
        }
        f.write_str(" }")
    }
}

// ── AttributesUpdate ──────────────────────────────────────────────────────

/// A single attribute change inside an [`AttributesUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeChange {
    pub key: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Immutable sorted map of attribute changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributesUpdate {
    changes: Vec<AttributeChange>,
}

impl AttributesUpdate {
    pub fn new() -> Self {
        Self { changes: Vec::new() }
    }

    pub fn from_changes<I>(changes: I) -> Result<Self, AttributesError>
    where
        I: IntoIterator<Item = AttributeChange>,
    {
        let mut changes: Vec<AttributeChange> = changes.into_iter().collect();
        changes.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(w) = changes.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(AttributesError::DuplicateKey(w[0].key.clone()));
        }
        Ok(Self { changes })
    }

    /// Returns a copy with one more change.
    pub fn with(
        &self,
        key: impl Into<String>,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<Self, AttributesError> {
        let key = key.into();
        match self.position(&key) {
            Ok(_) => Err(AttributesError::DuplicateKey(key)),
            Err(at) => {
                let mut changes = self.changes.clone();
                changes.insert(
                    at,
                    AttributeChange {
                        key,
                        old: old.map(str::to_owned),
                        new: new.map(str::to_owned),
                    },
                );
                Ok(Self { changes })
            }
        }
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.changes.binary_search_by(|c| c.key.as_str().cmp(key))
    }

    pub fn get(&self, key: &str) -> Option<&AttributeChange> {
        self.position(key).ok().map(|i| &self.changes[i])
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeChange> {
        self.changes.iter()
    }

    /// Composes `self` followed by `other` into a single update.
    ///
    /// For keys changed by both, the old value comes from `self` and the new
    /// value from `other`.
    pub fn compose_with(&self, other: &AttributesUpdate) -> AttributesUpdate {
        let mut changes = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.changes.len() || j < other.changes.len() {
            let a = self.changes.get(i);
            let b = other.changes.get(j);
            match (a, b) {
                (Some(a), Some(b)) if a.key == b.key => {
                    changes.push(AttributeChange {
                        key: a.key.clone(),
                        old: a.old.clone(),
                        new: b.new.clone(),
                    });
                    i += 1;
                    j += 1;
                }
                (Some(a), Some(b)) if a.key < b.key => {
                    changes.push(a.clone());
                    i += 1;
                }
                (Some(_), Some(b)) | (None, Some(b)) => {
                    changes.push(b.clone());
                    j += 1;
                }
                (Some(a), None) => {
                    changes.push(a.clone());
                    i += 1;
                }
                (None, None) => break,
            }
        }
        AttributesUpdate { changes }
    }

    /// Drops the changes for every key in `keys`.
    pub fn exclude<'a, I>(&self, keys: I) -> AttributesUpdate
    where
        I: IntoIterator<Item = &'a str>,
    {
        let excluded: Vec<&str> = keys.into_iter().collect();
        AttributesUpdate {
            changes: self
                .changes
                .iter()
                .filter(|c| !excluded.contains(&c.key.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Swaps old and new values of every change.
    pub fn inverse(&self) -> AttributesUpdate {
        AttributesUpdate {
            changes: self
                .changes
                .iter()
                .map(|c| AttributeChange {
                    key: c.key.clone(),
                    old: c.new.clone(),
                    new: c.old.clone(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for AttributesUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, c) in self.changes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{}: {} -> {}",
                c.key,
                literal(c.old.as_deref()),
                literal(c.new.as_deref())
            )?;
        }
        f.write_str(" }")
    }
}

/// Quotes a value for the concise textual forms; `None` renders as `null`.
pub(crate) fn literal(value: Option<&str>) -> String {
    match value {
        None => "null".to_string(),
        Some(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}
