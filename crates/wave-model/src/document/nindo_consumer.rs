//! Resolving a [`Nindo`] against an [`IndexedDocument`] into an invertible
//! [`DocOp`].
//!
//! The Nindo only names what happens; the document supplies deleted text,
//! deleted element payloads, old attribute values and old annotation values.
//! Annotation boundaries are chosen so that inserted items end up with the
//! requested values and so that applying the inverse restores every value,
//! including those of deleted items.

use std::collections::BTreeMap;

use log::debug;

use crate::annotation::{AnnotationSetListener, ReadableAnnotationSet};
use crate::attributes::{Attributes, AttributesUpdate};
use crate::doc_op::{AnnotationBoundaryMap, DocOp, DocOpBuilder};
use crate::nindo::{AttributeUpdates, Nindo, NindoComponent};

use super::{DocItem, IndexedDocument, OperationError, ReadableDocument};

type Values = BTreeMap<String, String>;

/// Key → (old, new) for every key the boundary currently holds open.
type OpenChanges = BTreeMap<String, (Option<String>, Option<String>)>;

impl<L: AnnotationSetListener> IndexedDocument<L> {
    /// The DocOp that performs `nindo` on this document, without applying it.
    pub fn resolve_nindo(&self, nindo: &Nindo) -> Result<DocOp, OperationError> {
        let mut resolver = Resolver::new(self);
        for component in nindo {
            resolver.component(component)?;
        }
        resolver.finish()
    }

    /// Resolves `nindo`, applies the result and returns it.
    pub fn consume_nindo(&mut self, nindo: &Nindo) -> Result<DocOp, OperationError> {
        let op = self.resolve_nindo(nindo)?;
        self.consume(&op)?;
        debug!("consumed nindo as {} components", op.len());
        Ok(op)
    }
}

struct Resolver<'a, L: AnnotationSetListener> {
    doc: &'a IndexedDocument<L>,
    pos: usize,
    /// Annotations opened by the Nindo and not yet ended.
    requested: BTreeMap<String, Option<String>>,
    /// Annotations open in the emitted DocOp.
    open: OpenChanges,
    /// Values of the last retained or deleted item.
    last_original: Values,
    /// Values of the last item written to the result.
    last_result: Values,
    pending_retain: usize,
    builder: DocOpBuilder,
}

impl<'a, L: AnnotationSetListener> Resolver<'a, L> {
    fn new(doc: &'a IndexedDocument<L>) -> Self {
        Self {
            doc,
            pos: 0,
            requested: BTreeMap::new(),
            open: OpenChanges::new(),
            last_original: Values::new(),
            last_result: Values::new(),
            pending_retain: 0,
            builder: DocOpBuilder::new(),
        }
    }

    fn component(&mut self, component: &NindoComponent) -> Result<(), OperationError> {
        match component {
            NindoComponent::Skip(n) => self.skip(*n),
            NindoComponent::Characters(s) => {
                self.before_insert()?;
                self.builder.characters(s.clone());
                Ok(())
            }
            NindoComponent::ElementStart { tag, attrs } => {
                self.before_insert()?;
                self.builder.element_start(tag.clone(), attrs.clone());
                Ok(())
            }
            NindoComponent::ElementEnd => {
                self.before_insert()?;
                self.builder.element_end();
                Ok(())
            }
            NindoComponent::DeleteCharacters(n) => self.delete_characters(*n),
            NindoComponent::DeleteElementStart => {
                let (tag, attrs) = self.element_start_here()?;
                self.before_delete(self.pos)?;
                self.builder.delete_element_start(tag, attrs);
                self.pos += 1;
                Ok(())
            }
            NindoComponent::DeleteElementEnd => {
                match self.doc.item_at(self.pos) {
                    Some(DocItem::ElementEnd { .. }) => {}
                    Some(_) => {
                        return Err(OperationError::UnexpectedItem {
                            pos: self.pos,
                            expected: "element end",
                        })
                    }
                    None => return Err(OperationError::PastEnd(self.pos)),
                }
                self.before_delete(self.pos)?;
                self.builder.delete_element_end();
                self.pos += 1;
                Ok(())
            }
            NindoComponent::ReplaceAttributes(new) => {
                let (_, old) = self.element_start_here()?;
                self.before_retain(self.pos)?;
                self.flush_retain();
                self.builder.replace_attributes(old, new.clone());
                self.pos += 1;
                Ok(())
            }
            NindoComponent::UpdateAttributes(updates) => {
                let (_, old) = self.element_start_here()?;
                let update = attributes_update(&old, updates)?;
                self.before_retain(self.pos)?;
                self.flush_retain();
                self.builder.update_attributes(update);
                self.pos += 1;
                Ok(())
            }
            NindoComponent::StartAnnotation { key, value } => {
                self.requested.insert(key.clone(), value.clone());
                Ok(())
            }
            NindoComponent::EndAnnotation(key) => match self.requested.remove(key) {
                Some(_) => Ok(()),
                None => Err(OperationError::IllFormed(format!(
                    "endAnnotation of key {key} with no startAnnotation"
                ))),
            },
        }
    }

    fn finish(mut self) -> Result<DocOp, OperationError> {
        if let Some(key) = self.requested.keys().next() {
            return Err(OperationError::IllFormed(format!(
                "startAnnotation of key {key} with no endAnnotation"
            )));
        }
        let rest = self.doc.size().saturating_sub(self.pos);
        if rest > 0 {
            self.skip(rest)?;
        }
        self.transition(OpenChanges::new())?;
        self.flush_retain();
        Ok(self.builder.build())
    }

    // ── Content ───────────────────────────────────────────────────────────

    fn skip(&mut self, n: usize) -> Result<(), OperationError> {
        let end = self.pos + n;
        if end > self.doc.size() {
            return Err(OperationError::PastEnd(self.doc.size()));
        }
        for (start, end) in self.runs(self.pos, end)? {
            self.before_retain(start)?;
            self.pending_retain += end - start;
        }
        self.pos = end;
        Ok(())
    }

    fn delete_characters(&mut self, n: usize) -> Result<(), OperationError> {
        let end = self.pos + n;
        let mut text = String::with_capacity(n);
        for at in self.pos..end {
            match self.doc.item_at(at) {
                Some(DocItem::Character(ch)) => text.push(ch),
                Some(_) => return Err(OperationError::UnexpectedItem { pos: at, expected: "character" }),
                None => return Err(OperationError::PastEnd(at)),
            }
        }
        let mut chars = text.chars();
        for (start, end) in self.runs(self.pos, end)? {
            self.before_delete(start)?;
            let piece: String = chars.by_ref().take(end - start).collect();
            self.builder.delete_characters(piece);
        }
        self.pos = end;
        Ok(())
    }

    fn element_start_here(&self) -> Result<(String, Attributes), OperationError> {
        match self.doc.item_at(self.pos) {
            Some(DocItem::ElementStart { tag, attrs }) => Ok((tag.to_string(), attrs.clone())),
            Some(_) => Err(OperationError::UnexpectedItem {
                pos: self.pos,
                expected: "element start",
            }),
            None => Err(OperationError::PastEnd(self.pos)),
        }
    }

    /// Maximal runs of `[start, end)` with constant annotations.
    fn runs(&self, start: usize, end: usize) -> Result<Vec<(usize, usize)>, OperationError> {
        Ok(self
            .doc
            .annotations
            .annotation_intervals(start, end, None)?
            .map(|interval| (interval.start, interval.end))
            .collect())
    }

    fn values_at(&self, pos: usize) -> Result<Values, OperationError> {
        Ok(self.doc.annotations.values_at(pos)?.clone())
    }

    // ── Annotation boundaries ─────────────────────────────────────────────

    /// Prepares to retain the item at `pos`: requested keys that differ from
    /// its current value are changed.
    fn before_retain(&mut self, pos: usize) -> Result<(), OperationError> {
        let original = self.values_at(pos)?;
        let desired = self.requested_over(&original);
        self.transition(desired)?;
        self.last_result = self.painted(&original);
        self.last_original = original;
        Ok(())
    }

    /// Prepares to insert an item, which inherits the last retained or
    /// deleted item's values.
    fn before_insert(&mut self) -> Result<(), OperationError> {
        self.flush_retain();
        let desired = self.requested_over(&self.last_original);
        self.transition(desired)?;
        self.last_result = self.painted(&self.last_original);
        Ok(())
    }

    /// Prepares to delete the item at `pos`; the boundary records how its
    /// values differ from the result so the inverse can restore them.
    fn before_delete(&mut self, pos: usize) -> Result<(), OperationError> {
        self.flush_retain();
        let original = self.values_at(pos)?;
        let mut desired = OpenChanges::new();
        for key in original.keys().chain(self.last_result.keys()) {
            let old = original.get(key);
            let new = self.last_result.get(key);
            if old != new {
                desired.insert(key.clone(), (old.cloned(), new.cloned()));
            }
        }
        self.transition(desired)?;
        self.last_original = original;
        Ok(())
    }

    fn requested_over(&self, base: &Values) -> OpenChanges {
        self.requested
            .iter()
            .filter(|(key, value)| base.get(*key) != value.as_ref())
            .map(|(key, value)| (key.clone(), (base.get(key).cloned(), value.clone())))
            .collect()
    }

    fn painted(&self, base: &Values) -> Values {
        let mut values = base.clone();
        for (key, value) in &self.requested {
            match value {
                Some(v) => values.insert(key.clone(), v.clone()),
                None => values.remove(key),
            };
        }
        values
    }

    /// Emits the boundary that turns the open set into `desired`, if any.
    fn transition(&mut self, desired: OpenChanges) -> Result<(), OperationError> {
        let ends: Vec<&String> = self.open.keys().filter(|k| !desired.contains_key(*k)).collect();
        let changes: Vec<(&String, &(Option<String>, Option<String>))> = desired
            .iter()
            .filter(|(key, change)| self.open.get(*key) != Some(*change))
            .collect();
        if ends.is_empty() && changes.is_empty() {
            return Ok(());
        }
        let mut map = AnnotationBoundaryMap::builder();
        for key in ends {
            map = map.end(key.clone());
        }
        for (key, (old, new)) in changes {
            map = map.change(key.clone(), old.as_deref(), new.as_deref());
        }
        let map = map
            .build()
            .map_err(|e| OperationError::IllFormed(e.to_string()))?;
        self.flush_retain();
        self.builder.annotation_boundary(map);
        self.open = desired;
        Ok(())
    }

    fn flush_retain(&mut self) {
        if self.pending_retain > 0 {
            self.builder.retain(self.pending_retain);
            self.pending_retain = 0;
        }
    }
}

fn attributes_update(current: &Attributes, updates: &AttributeUpdates) -> Result<AttributesUpdate, OperationError> {
    let mut update = AttributesUpdate::new();
    for (key, new) in updates {
        update = update.with(key.clone(), current.get(key), new.as_deref())?;
    }
    Ok(update)
}
