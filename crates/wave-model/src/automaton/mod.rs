//! [`NindoAutomaton`]: the state machine that walks a mutation over a
//! document and a schema.
//!
//! Every component kind has a `check_*` method that classifies the component
//! in the current state without changing it, and a `do_*` method that
//! advances the state.  A `do_*` call must only follow a check that did not
//! report [`ValidationResult::IllFormed`]; invalid and schema-violating
//! components may still be applied, which lets a validator keep collecting
//! findings and a generator produce deliberately invalid operations.

pub mod violation;

use std::collections::BTreeSet;

use log::trace;

use crate::annotation::ReadableAnnotationSet;
use crate::attributes::{Attributes, AttributesUpdate};
use crate::document::{DocItem, DocSymbol, ReadableDocument};
use crate::nindo::{AttributeUpdates, NindoComponent};
use crate::schema::DocumentSchema;
use crate::xml_name::is_xml_name;

pub use violation::{ValidationResult, Violation, ViolationCollector};

/// Longest intermediate or final document the automaton accepts.
pub const MAX_DOC_LENGTH: usize = (i32::MAX / 5) as usize;

/// An element the mutation has opened and not yet closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An inserted element, with its type.
    Insert(String),
    /// An existing element whose start was deleted.
    Delete,
}

pub struct NindoAutomaton<'a, D: ReadableDocument + ?Sized, S: DocumentSchema + ?Sized> {
    doc: &'a D,
    schema: &'a S,
    effective_pos: usize,
    resulting_length: usize,
    resulting_pos: usize,
    // Bottom of the stack first.
    stack: Vec<Frame>,
    open_annotations: BTreeSet<String>,
}

impl<'a, D: ReadableDocument + ?Sized, S: DocumentSchema + ?Sized> NindoAutomaton<'a, D, S> {
    pub fn new(schema: &'a S, doc: &'a D) -> Self {
        Self {
            doc,
            schema,
            effective_pos: 0,
            resulting_length: doc.size(),
            resulting_pos: 0,
            stack: Vec::new(),
            open_annotations: BTreeSet::new(),
        }
    }

    // ── State ─────────────────────────────────────────────────────────────

    /// Position in the original document.
    pub fn effective_pos(&self) -> usize {
        self.effective_pos
    }

    /// Position in the resulting document.
    pub fn resulting_pos(&self) -> usize {
        self.resulting_pos
    }

    pub fn resulting_length(&self) -> usize {
        self.resulting_length
    }

    pub fn frames(&self) -> &[Frame] {
        &self.stack
    }

    pub fn top_frame(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn open_annotation_keys(&self) -> impl Iterator<Item = &str> {
        self.open_annotations.iter().map(String::as_str)
    }

    pub fn is_annotation_open(&self, key: &str) -> bool {
        self.open_annotations.contains(key)
    }

    fn inside_insertion(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Insert(_)))
    }

    fn inside_deletion(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Delete))
    }

    fn symbol(&self) -> DocSymbol {
        self.doc.symbol_at(self.effective_pos)
    }

    /// Type of the element new content would land in; `None` at top level.
    fn effective_enclosing_tag(&self) -> Option<&str> {
        if let Some(Frame::Insert(tag)) = self.stack.last() {
            return Some(tag);
        }
        if self.effective_pos == 0 || self.effective_pos >= self.doc.size() {
            return None;
        }
        self.doc.enclosing_element_tag(self.effective_pos)
    }

    // ── Bounds ────────────────────────────────────────────────────────────

    pub fn max_length_increase(&self) -> usize {
        MAX_DOC_LENGTH.saturating_sub(self.resulting_length)
    }

    pub fn max_skip_distance(&self) -> usize {
        self.doc.size().saturating_sub(self.effective_pos)
    }

    pub fn max_characters_to_delete(&self) -> usize {
        self.doc.remaining_characters_in_element(self.effective_pos)
    }

    fn can_increase_length(&self, delta: usize) -> bool {
        delta <= self.max_length_increase()
    }

    // ── Violations ────────────────────────────────────────────────────────

    fn violation(
        &self,
        v: Option<&mut ViolationCollector>,
        result: ValidationResult,
        description: impl Into<String>,
    ) -> ValidationResult {
        if let Some(v) = v {
            v.add(Violation::new(result, description, self.effective_pos, self.resulting_pos));
        }
        result
    }

    fn ill_formed(&self, v: Option<&mut ViolationCollector>, description: impl Into<String>) -> ValidationResult {
        self.violation(v, ValidationResult::IllFormed, description)
    }

    fn invalid(&self, v: Option<&mut ViolationCollector>, description: impl Into<String>) -> ValidationResult {
        self.violation(v, ValidationResult::InvalidDocument, description)
    }

    fn schema_violation(
        &self,
        v: Option<&mut ViolationCollector>,
        description: impl Into<String>,
    ) -> ValidationResult {
        self.violation(v, ValidationResult::InvalidSchema, description)
    }

    fn too_long(&self, v: Option<&mut ViolationCollector>) -> ValidationResult {
        self.invalid(v, "intermediate or final document too long")
    }

    /// Checks attribute names and values against the schema for `tag`.
    /// `None` values are removals, only legal when `allow_removals`.
    fn validate_attributes<'b>(
        &self,
        tag: &str,
        attrs: impl IntoIterator<Item = (&'b str, Option<&'b str>)>,
        v: Option<&mut ViolationCollector>,
        allow_removals: bool,
    ) -> ValidationResult {
        for (key, value) in attrs {
            if !is_xml_name(key) {
                return self.ill_formed(v, format!("attribute key is not an XML name: \"{key}\""));
            }
            match value {
                None if !allow_removals => return self.ill_formed(v, "attribute value is null"),
                None => {
                    if !self.schema.permits_attribute(tag, key) {
                        return self
                            .schema_violation(v, format!("type {tag} does not permit attribute {key}"));
                    }
                }
                Some(value) => {
                    if !self.schema.permits_attribute_value(tag, key, value) {
                        return self.schema_violation(
                            v,
                            format!("type {tag} does not permit attribute {key} with value {value}"),
                        );
                    }
                }
            }
        }
        ValidationResult::Valid
    }

    // ── Skip ──────────────────────────────────────────────────────────────

    pub fn check_skip(&self, distance: usize, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if distance == 0 {
            return self.ill_formed(v, "skip distance not positive");
        }
        if !self.stack.is_empty() {
            return self.ill_formed(v, "skip inside insert or delete");
        }
        if distance > self.max_skip_distance() {
            return self.invalid(v, "skip past end of document");
        }
        ValidationResult::Valid
    }

    pub fn do_skip(&mut self, distance: usize) {
        debug_assert!(!self.check_skip(distance, None).is_ill_formed());
        self.effective_pos += distance;
        self.resulting_pos += distance;
    }

    // ── Characters ────────────────────────────────────────────────────────

    pub fn check_characters(&self, characters: &str, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if characters.is_empty() {
            return self.ill_formed(v, "characters is empty");
        }
        if self.inside_deletion() {
            return self.ill_formed(v, "insertion inside deletion");
        }
        let enclosing = self.effective_enclosing_tag();
        if !self.schema.permitted_characters(enclosing).allows_text() {
            return self.schema_violation(
                v,
                format!(
                    "element type {} does not allow text content",
                    enclosing.unwrap_or("null")
                ),
            );
        }
        if !self.can_increase_length(characters.chars().count()) {
            return self.too_long(v);
        }
        ValidationResult::Valid
    }

    pub fn do_characters(&mut self, characters: &str) {
        debug_assert!(!self.check_characters(characters, None).is_ill_formed());
        let n = characters.chars().count();
        self.resulting_length += n;
        self.resulting_pos += n;
    }

    // ── Delete characters ─────────────────────────────────────────────────

    pub fn check_delete_characters(&self, count: usize, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if count == 0 {
            return self.ill_formed(v, "delete length not positive");
        }
        if self.inside_insertion() {
            return self.ill_formed(v, "deletion inside insertion");
        }
        let available = self.max_characters_to_delete();
        if count > available {
            return self.invalid(v, format!("cannot delete {count} characters, only {available} available"));
        }
        ValidationResult::Valid
    }

    pub fn do_delete_characters(&mut self, count: usize) {
        debug_assert!(!self.check_delete_characters(count, None).is_ill_formed());
        self.effective_pos += count;
        self.resulting_length = self.resulting_length.saturating_sub(count);
    }

    // ── Element start / end ───────────────────────────────────────────────

    pub fn check_element_start(
        &self,
        tag: &str,
        attrs: &Attributes,
        mut v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        if !is_xml_name(tag) {
            return self.ill_formed(v, format!("element type is not an XML name: \"{tag}\""));
        }
        let r = self.validate_attributes(tag, attrs.iter().map(|(k, a)| (k, Some(a))), v.as_deref_mut(), false);
        if !r.is_valid() {
            return r;
        }
        if self.inside_deletion() {
            return self.ill_formed(v, "insertion inside deletion");
        }
        if !self.can_increase_length(2) {
            return self.too_long(v);
        }
        match self.effective_enclosing_tag() {
            None => {
                if !self.schema.permits_child(None, tag) {
                    return self.schema_violation(v, "type not permitted as root element");
                }
            }
            Some(parent) => {
                if !self.schema.permits_child(Some(parent), tag) {
                    return self.schema_violation(
                        v,
                        format!("element type {parent} does not permit subelement type {tag}"),
                    );
                }
            }
        }
        ValidationResult::Valid
    }

    pub fn do_element_start(&mut self, tag: &str, attrs: &Attributes) {
        debug_assert!(!self.check_element_start(tag, attrs, None).is_ill_formed());
        self.stack.push(Frame::Insert(tag.to_string()));
        self.resulting_length += 2;
        self.resulting_pos += 1;
    }

    pub fn check_element_end(&self, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if !self.inside_insertion() {
            return self.ill_formed(v, "elementEnd with no elementStart");
        }
        ValidationResult::Valid
    }

    pub fn do_element_end(&mut self) {
        debug_assert!(!self.check_element_end(None).is_ill_formed());
        self.stack.pop();
        self.resulting_pos += 1;
    }

    // ── Delete element start / end ────────────────────────────────────────

    pub fn check_delete_element_start(&self, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if self.inside_insertion() {
            return self.ill_formed(v, "deletion inside insertion");
        }
        if self.symbol() != DocSymbol::Open {
            return self.invalid(v, "no element start to delete here");
        }
        ValidationResult::Valid
    }

    pub fn do_delete_element_start(&mut self) {
        debug_assert!(!self.check_delete_element_start(None).is_ill_formed());
        self.stack.push(Frame::Delete);
        self.effective_pos += 1;
    }

    pub fn check_delete_element_end(&self, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if !self.inside_deletion() {
            return self.ill_formed(v, "deleteElementEnd with no deleteElementStart");
        }
        if self.symbol() != DocSymbol::Close {
            return self.invalid(v, "no element end to delete here");
        }
        ValidationResult::Valid
    }

    pub fn do_delete_element_end(&mut self) {
        debug_assert!(!self.check_delete_element_end(None).is_ill_formed());
        self.stack.pop();
        self.resulting_length = self.resulting_length.saturating_sub(2);
        self.effective_pos += 1;
    }

    // ── Attributes ────────────────────────────────────────────────────────

    fn check_change_attributes<'b>(
        &self,
        attrs: impl IntoIterator<Item = (&'b str, Option<&'b str>)>,
        v: Option<&mut ViolationCollector>,
        allow_removals: bool,
    ) -> ValidationResult {
        if !self.stack.is_empty() {
            return self.ill_formed(v, "attribute change inside insert or delete");
        }
        match self.doc.item_at(self.effective_pos) {
            Some(DocItem::ElementStart { tag, .. }) => self.validate_attributes(tag, attrs, v, allow_removals),
            _ => self.invalid(v, "no element start to change attributes here"),
        }
    }

    pub fn check_replace_attributes(
        &self,
        attrs: &Attributes,
        v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        self.check_change_attributes(attrs.iter().map(|(k, a)| (k, Some(a))), v, false)
    }

    pub fn do_replace_attributes(&mut self, attrs: &Attributes) {
        debug_assert!(!self.check_replace_attributes(attrs, None).is_ill_formed());
        self.effective_pos += 1;
        self.resulting_pos += 1;
    }

    pub fn check_update_attributes(
        &self,
        updates: &AttributeUpdates,
        v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        self.check_change_attributes(
            updates.iter().map(|(k, a)| (k.as_str(), a.as_deref())),
            v,
            true,
        )
    }

    pub fn do_update_attributes(&mut self, updates: &AttributeUpdates) {
        debug_assert!(!self.check_update_attributes(updates, None).is_ill_formed());
        self.effective_pos += 1;
        self.resulting_pos += 1;
    }

    // ── Annotations ───────────────────────────────────────────────────────

    pub fn check_start_annotation(
        &self,
        _key: &str,
        _value: Option<&str>,
        _v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        ValidationResult::Valid
    }

    pub fn do_start_annotation(&mut self, key: &str, value: Option<&str>) {
        debug_assert!(!self.check_start_annotation(key, value, None).is_ill_formed());
        self.open_annotations.insert(key.to_string());
    }

    pub fn check_end_annotation(&self, key: &str, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if !self.is_annotation_open(key) {
            return self.ill_formed(v, format!("endAnnotation of key {key} with no startAnnotation"));
        }
        ValidationResult::Valid
    }

    pub fn do_end_annotation(&mut self, key: &str) {
        debug_assert!(!self.check_end_annotation(key, None).is_ill_formed());
        self.open_annotations.remove(key);
    }

    // ── Document payloads ─────────────────────────────────────────────────
    //
    // DocOps restate what they remove or overwrite.  These checks compare
    // that payload with the document at the current position; they leave
    // missing or mistyped items to the structural checks above.

    pub fn check_deleted_characters(&self, text: &str, v: Option<&mut ViolationCollector>) -> ValidationResult {
        let differs = text.chars().enumerate().any(|(i, ch)| {
            matches!(self.doc.item_at(self.effective_pos + i), Some(DocItem::Character(c)) if c != ch)
        });
        if differs {
            return self.invalid(v, "deleted characters differ from document");
        }
        ValidationResult::Valid
    }

    pub fn check_deleted_element(
        &self,
        tag: &str,
        attrs: &Attributes,
        v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        match self.doc.item_at(self.effective_pos) {
            Some(DocItem::ElementStart { tag: t, attrs: a }) if t != tag || a != attrs => {
                self.invalid(v, "deleted element differs from document")
            }
            _ => ValidationResult::Valid,
        }
    }

    pub fn check_old_attributes(&self, old: &Attributes, v: Option<&mut ViolationCollector>) -> ValidationResult {
        match self.doc.item_at(self.effective_pos) {
            Some(DocItem::ElementStart { attrs, .. }) if attrs != old => {
                self.invalid(v, "old attributes differ from document")
            }
            _ => ValidationResult::Valid,
        }
    }

    pub fn check_old_attribute_values(
        &self,
        update: &AttributesUpdate,
        v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        match self.doc.item_at(self.effective_pos) {
            Some(DocItem::ElementStart { attrs, .. })
                if update.iter().any(|c| attrs.get(&c.key) != c.old.as_deref()) =>
            {
                self.invalid(v, "old attributes differ from document")
            }
            _ => ValidationResult::Valid,
        }
    }

    /// Checks that each `(key, old)` holds over the next `distance` items.
    pub fn check_old_annotations<'b>(
        &self,
        old: impl IntoIterator<Item = (&'b str, Option<&'b str>)>,
        distance: usize,
        v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        let start = self.effective_pos.min(self.doc.size());
        let end = (self.effective_pos + distance).min(self.doc.size());
        let annotations = self.doc.annotations();
        for (key, value) in old {
            if let Ok(Some(_)) = annotations.first_annotation_change(start, end, key, value) {
                return self.invalid(v, "old annotations differ from document");
            }
        }
        ValidationResult::Valid
    }

    // ── Finish ────────────────────────────────────────────────────────────

    pub fn check_finish(&self, v: Option<&mut ViolationCollector>) -> ValidationResult {
        if let Some(frame) = self.stack.first() {
            return match frame {
                Frame::Insert(_) => self.ill_formed(v, "elementStart with no elementEnd"),
                Frame::Delete => self.ill_formed(v, "deleteElementStart with no deleteElementEnd"),
            };
        }
        if let Some(key) = self.open_annotations.iter().next() {
            return self.ill_formed(v, format!("startAnnotation of key {key} with no endAnnotation"));
        }
        ValidationResult::Valid
    }

    pub fn do_finish(&mut self) {
        debug_assert!(!self.check_finish(None).is_ill_formed());
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    pub fn check_component(
        &self,
        component: &NindoComponent,
        v: Option<&mut ViolationCollector>,
    ) -> ValidationResult {
        let result = match component {
            NindoComponent::Skip(n) => self.check_skip(*n, v),
            NindoComponent::Characters(s) => self.check_characters(s, v),
            NindoComponent::ElementStart { tag, attrs } => self.check_element_start(tag, attrs, v),
            NindoComponent::ElementEnd => self.check_element_end(v),
            NindoComponent::DeleteCharacters(n) => self.check_delete_characters(*n, v),
            NindoComponent::DeleteElementStart => self.check_delete_element_start(v),
            NindoComponent::DeleteElementEnd => self.check_delete_element_end(v),
            NindoComponent::ReplaceAttributes(attrs) => self.check_replace_attributes(attrs, v),
            NindoComponent::UpdateAttributes(updates) => self.check_update_attributes(updates, v),
            NindoComponent::StartAnnotation { key, value } => {
                self.check_start_annotation(key, value.as_deref(), v)
            }
            NindoComponent::EndAnnotation(key) => self.check_end_annotation(key, v),
        };
        if !result.is_valid() {
            trace!("{component}at {}: {result}", self.effective_pos);
        }
        result
    }

    pub fn do_component(&mut self, component: &NindoComponent) {
        match component {
            NindoComponent::Skip(n) => self.do_skip(*n),
            NindoComponent::Characters(s) => self.do_characters(s),
            NindoComponent::ElementStart { tag, attrs } => self.do_element_start(tag, attrs),
            NindoComponent::ElementEnd => self.do_element_end(),
            NindoComponent::DeleteCharacters(n) => self.do_delete_characters(*n),
            NindoComponent::DeleteElementStart => self.do_delete_element_start(),
            NindoComponent::DeleteElementEnd => self.do_delete_element_end(),
            NindoComponent::ReplaceAttributes(attrs) => self.do_replace_attributes(attrs),
            NindoComponent::UpdateAttributes(updates) => self.do_update_attributes(updates),
            NindoComponent::StartAnnotation { key, value } => self.do_start_annotation(key, value.as_deref()),
            NindoComponent::EndAnnotation(key) => self.do_end_annotation(key),
        }
        trace!(
            "{component}-> original {} / resulting {} (length {})",
            self.effective_pos,
            self.resulting_pos,
            self.resulting_length
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IndexedDocument;
    use crate::schema::NoSchema;

    fn doc(xml: &str) -> IndexedDocument {
        IndexedDocument::from_xml(xml).unwrap()
    }

    #[test]
    fn skip_bounds() {
        let d = doc("<p>ab</p>");
        let mut a = NindoAutomaton::new(&NoSchema, &d);
        assert_eq!(a.max_skip_distance(), 4);
        assert_eq!(a.check_skip(0, None), ValidationResult::IllFormed);
        assert_eq!(a.check_skip(5, None), ValidationResult::InvalidDocument);
        assert_eq!(a.check_skip(4, None), ValidationResult::Valid);
        a.do_skip(4);
        assert_eq!(a.max_skip_distance(), 0);
        assert_eq!(a.check_finish(None), ValidationResult::Valid);
    }

    #[test]
    fn violation_carries_positions() {
        let d = doc("<p>ab</p>");
        let mut a = NindoAutomaton::new(&NoSchema, &d);
        a.do_skip(1);
        let mut v = ViolationCollector::new();
        assert_eq!(a.check_delete_characters(3, Some(&mut v)), ValidationResult::InvalidDocument);
        assert_eq!(
            v.first_description().as_deref(),
            Some("invalid operation: cannot delete 3 characters, only 2 available at original document position 1 / resulting document position 1")
        );
    }

    #[test]
    fn insertion_and_deletion_do_not_nest() {
        let d = doc("<p><q/></p>");
        let mut a = NindoAutomaton::new(&NoSchema, &d);
        a.do_skip(1);
        assert!(a.check_delete_element_start(None).is_valid());
        a.do_delete_element_start();
        assert!(a.check_characters("x", None).is_ill_formed());
        assert!(a.check_element_start("b", &Attributes::new(), None).is_ill_formed());
        assert!(a.check_skip(1, None).is_ill_formed());
        assert!(a.check_finish(None).is_ill_formed());
        assert!(a.check_delete_element_end(None).is_valid());
        a.do_delete_element_end();
        assert_eq!(a.resulting_length(), 2);

        a.do_element_start("b", &Attributes::new());
        assert!(a.check_delete_characters(1, None).is_ill_formed());
        assert!(a.check_delete_element_start(None).is_ill_formed());
        assert!(a.check_delete_element_end(None).is_ill_formed());
        assert_eq!(a.top_frame(), Some(&Frame::Insert("b".into())));
        a.do_element_end();
        assert!(a.check_element_end(None).is_ill_formed());
    }

    #[test]
    fn element_names_must_be_xml_names() {
        let d = IndexedDocument::new();
        let a = NindoAutomaton::new(&NoSchema, &d);
        let mut v = ViolationCollector::new();
        assert!(a.check_element_start("1p", &Attributes::new(), Some(&mut v)).is_ill_formed());
        assert!(a
            .check_element_start("p", &Attributes::single("a b", "x"), None)
            .is_ill_formed());
        assert_eq!(
            v.first_description().as_deref(),
            Some("ill-formed: element type is not an XML name: \"1p\" at original document position 0 / resulting document position 0")
        );
    }

    #[test]
    fn annotations_must_close() {
        let d = IndexedDocument::new();
        let mut a = NindoAutomaton::new(&NoSchema, &d);
        assert!(a.check_end_annotation("k", None).is_ill_formed());
        a.do_start_annotation("k", Some("v"));
        let mut v = ViolationCollector::new();
        assert!(a.check_finish(Some(&mut v)).is_ill_formed());
        assert!(v
            .first_description()
            .is_some_and(|d| d.starts_with("ill-formed: startAnnotation of key k with no endAnnotation")));
        a.do_end_annotation("k");
        assert!(a.check_finish(None).is_valid());
    }

    #[test]
    fn attribute_changes_need_an_element_start() {
        let d = doc("<p>a</p>");
        let mut a = NindoAutomaton::new(&NoSchema, &d);
        assert!(a.check_replace_attributes(&Attributes::single("x", "1"), None).is_valid());
        a.do_replace_attributes(&Attributes::single("x", "1"));
        assert_eq!(
            a.check_replace_attributes(&Attributes::new(), None),
            ValidationResult::InvalidDocument
        );
        let updates: AttributeUpdates = [("x".to_string(), None)].into_iter().collect();
        assert_eq!(a.check_update_attributes(&updates, None), ValidationResult::InvalidDocument);
    }

    #[test]
    fn length_limit() {
        let d = IndexedDocument::new();
        let a = NindoAutomaton::new(&NoSchema, &d);
        assert_eq!(a.max_length_increase(), MAX_DOC_LENGTH);
    }
}
