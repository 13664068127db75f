//! [`IndexedDocument`]: an in-memory document with an element arena and an
//! annotation set, able to apply DocOps and resolve Nindos.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};

use crate::annotation::{AnnotationSetListener, NoopListener, RawAnnotationSet, ReadableAnnotationSet};
use crate::attributes::Attributes;
use crate::doc_op::xml::{parse_initialization, to_xml_string};
use crate::doc_op::{AnnotationBoundaryMap, DocOp, DocOpBuilder, DocOpComponent};

use super::{DocItem, OperationError, ReadableDocument};

/// Index of an element in the document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attrs: Attributes,
    pub(crate) parent: Option<ElementId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Item {
    Char { ch: char, parent: Option<ElementId> },
    Start(ElementId),
    End(ElementId),
}

#[derive(Debug)]
pub struct IndexedDocument<L: AnnotationSetListener = NoopListener> {
    pub(crate) items: Vec<Item>,
    elements: Vec<ElementData>,
    pub(crate) annotations: RawAnnotationSet<L>,
}

impl<L: AnnotationSetListener + Clone> Clone for IndexedDocument<L> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            elements: self.elements.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

impl IndexedDocument<NoopListener> {
    /// The empty document.
    pub fn new() -> Self {
        Self::with_listener(NoopListener)
    }

    pub fn from_initialization(op: &DocOp) -> Result<Self, OperationError> {
        let mut doc = Self::new();
        doc.consume(op)?;
        Ok(doc)
    }

    pub fn from_xml(xml: &str) -> Result<Self, OperationError> {
        Self::from_initialization(&parse_initialization(xml)?)
    }
}

impl Default for IndexedDocument<NoopListener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: AnnotationSetListener> IndexedDocument<L> {
    /// An empty document whose annotation set reports to `listener`.
    pub fn with_listener(listener: L) -> Self {
        Self {
            items: Vec::new(),
            elements: Vec::new(),
            annotations: RawAnnotationSet::with_listener(listener),
        }
    }

    pub fn raw_annotations(&self) -> &RawAnnotationSet<L> {
        &self.annotations
    }

    pub fn raw_annotations_mut(&mut self) -> &mut RawAnnotationSet<L> {
        &mut self.annotations
    }

    pub(crate) fn element(&self, id: ElementId) -> &ElementData {
        &self.elements[id.0 as usize]
    }

    fn container_at(&self, pos: usize) -> Option<ElementId> {
        match self.items.get(pos)? {
            Item::Char { parent, .. } => *parent,
            Item::Start(e) => self.element(*e).parent,
            Item::End(e) => Some(*e),
        }
    }

    /// Applies `op`; on error the document is left unchanged.
    pub fn consume(&mut self, op: &DocOp) -> Result<(), OperationError> {
        self.annotations.begin();
        match self.apply(op) {
            Ok((items, elements)) => {
                if let Err(e) = self.annotations.finish() {
                    warn!("rejected operation {op}: {e}");
                    return Err(e.into());
                }
                self.items = items;
                self.elements = elements;
                debug!("applied operation, document size now {}", self.items.len());
                Ok(())
            }
            Err(e) => {
                self.annotations.abort();
                warn!("rejected operation {op}: {e}");
                Err(e)
            }
        }
    }

    /// Builds the new item list and arena, driving the annotation
    /// transaction alongside.
    fn apply(&mut self, op: &DocOp) -> Result<(Vec<Item>, Vec<ElementData>), OperationError> {
        let mut out = Rebuild::default();
        // Old ids of elements whose start was deleted and end not yet reached.
        let mut deleting: Vec<ElementId> = Vec::new();
        // Old value each changing annotation must hold over retained and
        // deleted items.
        let mut old_values: BTreeMap<String, Option<String>> = BTreeMap::new();
        let mut pos = 0usize;

        for component in op {
            match component {
                DocOpComponent::Retain(n) => {
                    if !deleting.is_empty() || out.inside_insertion() {
                        return Err(OperationError::IllFormed("retain inside insertion or deletion".into()));
                    }
                    self.check_old_annotations(&old_values, pos, *n)?;
                    for _ in 0..*n {
                        let item = *self.items.get(pos).ok_or(OperationError::PastEnd(pos))?;
                        match item {
                            Item::Char { ch, .. } => out.push_char(ch),
                            Item::Start(e) => {
                                let data = self.element(e);
                                out.open(Some(e), data.tag.clone(), data.attrs.clone());
                            }
                            Item::End(e) => out.close_retained(e, pos)?,
                        }
                        pos += 1;
                    }
                    self.annotations.skip(*n)?;
                }
                DocOpComponent::Characters(s) => {
                    if !deleting.is_empty() {
                        return Err(OperationError::IllFormed("insertion inside deletion".into()));
                    }
                    let mut n = 0;
                    for ch in s.chars() {
                        out.push_char(ch);
                        n += 1;
                    }
                    self.annotations.insert(n)?;
                }
                DocOpComponent::ElementStart { tag, attrs } => {
                    if !deleting.is_empty() {
                        return Err(OperationError::IllFormed("insertion inside deletion".into()));
                    }
                    out.open(None, tag.clone(), attrs.clone());
                    self.annotations.insert(1)?;
                }
                DocOpComponent::ElementEnd => {
                    out.close_inserted()?;
                    self.annotations.insert(1)?;
                }
                DocOpComponent::DeleteCharacters(s) => {
                    if out.inside_insertion() {
                        return Err(OperationError::IllFormed("deletion inside insertion".into()));
                    }
                    let start = pos;
                    let mut actual = String::new();
                    for expected in s.chars() {
                        match self.items.get(pos) {
                            Some(Item::Char { ch, .. }) if *ch == expected => actual.push(*ch),
                            Some(Item::Char { ch, .. }) => {
                                actual.push(*ch);
                                return Err(OperationError::DeletedCharactersMismatch {
                                    expected: s.clone(),
                                    actual,
                                });
                            }
                            Some(_) => {
                                return Err(OperationError::UnexpectedItem { pos, expected: "character" })
                            }
                            None => return Err(OperationError::PastEnd(pos)),
                        }
                        pos += 1;
                    }
                    self.check_old_annotations(&old_values, start, pos - start)?;
                    self.annotations.delete(actual.chars().count())?;
                }
                DocOpComponent::DeleteElementStart { tag, attrs } => {
                    if out.inside_insertion() {
                        return Err(OperationError::IllFormed("deletion inside insertion".into()));
                    }
                    match self.items.get(pos) {
                        Some(Item::Start(e)) => {
                            let data = self.element(*e);
                            if data.tag != *tag || data.attrs != *attrs {
                                return Err(OperationError::DeletedElementMismatch(pos));
                            }
                            deleting.push(*e);
                        }
                        Some(_) => {
                            return Err(OperationError::UnexpectedItem { pos, expected: "element start" })
                        }
                        None => return Err(OperationError::PastEnd(pos)),
                    }
                    self.check_old_annotations(&old_values, pos, 1)?;
                    pos += 1;
                    self.annotations.delete(1)?;
                }
                DocOpComponent::DeleteElementEnd => {
                    match self.items.get(pos) {
                        Some(Item::End(e)) if deleting.last() == Some(e) => {
                            deleting.pop();
                        }
                        Some(Item::End(_)) => return Err(OperationError::DeletedElementMismatch(pos)),
                        Some(_) => {
                            return Err(OperationError::UnexpectedItem { pos, expected: "element end" })
                        }
                        None => return Err(OperationError::PastEnd(pos)),
                    }
                    self.check_old_annotations(&old_values, pos, 1)?;
                    pos += 1;
                    self.annotations.delete(1)?;
                }
                DocOpComponent::ReplaceAttributes { old, new } => {
                    let e = self.attribute_target(pos, &deleting, &out)?;
                    let data = self.element(e);
                    if data.attrs != *old {
                        return Err(OperationError::OldAttributesMismatch(pos));
                    }
                    self.check_old_annotations(&old_values, pos, 1)?;
                    out.open(Some(e), data.tag.clone(), new.clone());
                    pos += 1;
                    self.annotations.skip(1)?;
                }
                DocOpComponent::UpdateAttributes(update) => {
                    let e = self.attribute_target(pos, &deleting, &out)?;
                    let data = self.element(e);
                    let attrs = data
                        .attrs
                        .update_with(update)
                        .map_err(|_| OperationError::OldAttributesMismatch(pos))?;
                    self.check_old_annotations(&old_values, pos, 1)?;
                    out.open(Some(e), data.tag.clone(), attrs);
                    pos += 1;
                    self.annotations.skip(1)?;
                }
                DocOpComponent::AnnotationBoundary(map) => {
                    for key in map.ends() {
                        old_values.remove(key);
                        self.annotations.end_annotation(key)?;
                    }
                    for change in map.changes() {
                        old_values.insert(change.key.clone(), change.old.clone());
                        self.annotations.start_annotation(&change.key, change.new.as_deref())?;
                    }
                }
            }
        }

        if pos != self.items.len() {
            return Err(OperationError::LengthMismatch {
                expected: pos,
                actual: self.items.len(),
            });
        }
        if !deleting.is_empty() || !out.stack.is_empty() {
            return Err(OperationError::IllFormed("unclosed element".into()));
        }
        Ok((out.items, out.elements))
    }

    /// Fails unless every key in `old_values` holds its old value over the
    /// `n` committed items at `pos`.
    fn check_old_annotations(
        &self,
        old_values: &BTreeMap<String, Option<String>>,
        pos: usize,
        n: usize,
    ) -> Result<(), OperationError> {
        if n == 0 || old_values.is_empty() {
            return Ok(());
        }
        let end = pos + n;
        if end > self.items.len() {
            return Err(OperationError::PastEnd(self.items.len()));
        }
        for (key, old) in old_values {
            if let Some(at) = self.annotations.first_annotation_change(pos, end, key, old.as_deref())? {
                return Err(OperationError::OldAnnotationMismatch {
                    pos: at,
                    key: key.clone(),
                    expected: old.clone(),
                });
            }
        }
        Ok(())
    }

    fn attribute_target(
        &self,
        pos: usize,
        deleting: &[ElementId],
        out: &Rebuild,
    ) -> Result<ElementId, OperationError> {
        if !deleting.is_empty() || out.inside_insertion() {
            return Err(OperationError::IllFormed("attribute change inside insertion or deletion".into()));
        }
        match self.items.get(pos) {
            Some(Item::Start(e)) => Ok(*e),
            Some(_) => Err(OperationError::UnexpectedItem { pos, expected: "element start" }),
            None => Err(OperationError::PastEnd(pos)),
        }
    }

    // ── Serialization ─────────────────────────────────────────────────────

    /// The operation that builds this document from nothing, annotations
    /// included.
    pub fn as_initialization(&self) -> DocOp {
        let mut b = DocOpBuilder::new();
        let size = self.items.len();
        let mut open_keys: Vec<String> = Vec::new();
        if let Ok(intervals) = self.annotations.annotation_intervals(0, size, None) {
            for interval in intervals {
                if !interval.diff_from_left.is_empty() {
                    let map = interval
                        .diff_from_left
                        .iter()
                        .fold(AnnotationBoundaryMap::builder(), |m, (k, v)| match v {
                            Some(v) => m.change(k.clone(), None, Some(v)),
                            None => m.end(k.clone()),
                        })
                        .build();
                    // diff_from_left has unique keys, so building cannot fail.
                    if let Ok(map) = map {
                        b.annotation_boundary(map);
                    }
                }
                open_keys = interval
                    .annotations
                    .iter()
                    .filter(|(_, v)| v.is_some())
                    .map(|(k, _)| k.clone())
                    .collect();
                self.write_items(&mut b, interval.start, interval.end);
            }
        }
        if !open_keys.is_empty() {
            let map = open_keys
                .into_iter()
                .fold(AnnotationBoundaryMap::builder(), |m, k| m.end(k))
                .build();
            if let Ok(map) = map {
                b.annotation_boundary(map);
            }
        }
        b.build()
    }

    fn write_items(&self, b: &mut DocOpBuilder, start: usize, end: usize) {
        let mut text = String::new();
        for item in &self.items[start..end] {
            match item {
                Item::Char { ch, .. } => {
                    text.push(*ch);
                    continue;
                }
                Item::Start(e) => {
                    if !text.is_empty() {
                        b.characters(std::mem::take(&mut text));
                    }
                    let data = self.element(*e);
                    b.element_start(data.tag.clone(), data.attrs.clone());
                }
                Item::End(_) => {
                    if !text.is_empty() {
                        b.characters(std::mem::take(&mut text));
                    }
                    b.element_end();
                }
            }
        }
        if !text.is_empty() {
            b.characters(text);
        }
    }

    pub fn to_xml_string(&self) -> String {
        // Documents are always balanced initializations, so rendering succeeds.
        to_xml_string(&self.as_initialization()).unwrap_or_default()
    }
}

impl<L: AnnotationSetListener> fmt::Display for IndexedDocument<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

impl<L: AnnotationSetListener> ReadableDocument for IndexedDocument<L> {
    type Annotations = RawAnnotationSet<L>;

    fn size(&self) -> usize {
        self.items.len()
    }

    fn item_at(&self, pos: usize) -> Option<DocItem<'_>> {
        Some(match self.items.get(pos)? {
            Item::Char { ch, .. } => DocItem::Character(*ch),
            Item::Start(e) => {
                let data = self.element(*e);
                DocItem::ElementStart {
                    tag: &data.tag,
                    attrs: &data.attrs,
                }
            }
            Item::End(e) => DocItem::ElementEnd {
                tag: &self.element(*e).tag,
            },
        })
    }

    fn enclosing_element_tag(&self, pos: usize) -> Option<&str> {
        self.container_at(pos).map(|e| self.element(e).tag.as_str())
    }

    fn annotations(&self) -> &RawAnnotationSet<L> {
        &self.annotations
    }
}

// ── Rebuild ───────────────────────────────────────────────────────────────

/// Output side of [`IndexedDocument::apply`]: a fresh item list and arena.
#[derive(Default)]
struct Rebuild {
    items: Vec<Item>,
    elements: Vec<ElementData>,
    /// Open output elements: new id, and the old id if retained.
    stack: Vec<(ElementId, Option<ElementId>)>,
}

impl Rebuild {
    fn parent(&self) -> Option<ElementId> {
        self.stack.last().map(|(id, _)| *id)
    }

    fn inside_insertion(&self) -> bool {
        matches!(self.stack.last(), Some((_, None)))
    }

    fn push_char(&mut self, ch: char) {
        let parent = self.parent();
        self.items.push(Item::Char { ch, parent });
    }

    fn open(&mut self, old: Option<ElementId>, tag: String, attrs: Attributes) {
        let parent = self.parent();
        self.elements.push(ElementData { tag, attrs, parent });
        let id = ElementId((self.elements.len() - 1) as u32);
        self.items.push(Item::Start(id));
        self.stack.push((id, old));
    }

    fn close_retained(&mut self, old: ElementId, pos: usize) -> Result<(), OperationError> {
        match self.stack.last() {
            Some((id, Some(o))) if *o == old => {
                let id = *id;
                self.stack.pop();
                self.items.push(Item::End(id));
                Ok(())
            }
            _ => Err(OperationError::IllFormed(format!(
                "retained element end at {pos} does not close a retained element"
            ))),
        }
    }

    fn close_inserted(&mut self) -> Result<(), OperationError> {
        match self.stack.last() {
            Some((id, None)) => {
                let id = *id;
                self.stack.pop();
                self.items.push(Item::End(id));
                Ok(())
            }
            _ => Err(OperationError::IllFormed("element end with no element start".into())),
        }
    }
}
