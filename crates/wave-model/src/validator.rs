//! Whole-operation validation on top of the [`NindoAutomaton`].

use std::collections::BTreeMap;

use log::debug;

use crate::automaton::{NindoAutomaton, ViolationCollector};
use crate::doc_op::{DocOp, DocOpComponent};
use crate::document::ReadableDocument;
use crate::nindo::{Nindo, NindoBuilder, NindoComponent};
use crate::schema::DocumentSchema;

/// Walks `nindo` over `doc`, collecting every violation found.
///
/// Stops at the first ill-formed component, since the automaton state is
/// meaningless after it; invalid and schema-violating components are applied
/// so later components are still checked.
pub fn validate<D, S>(doc: &D, nindo: &Nindo, schema: &S) -> ViolationCollector
where
    D: ReadableDocument + ?Sized,
    S: DocumentSchema + ?Sized,
{
    let mut v = ViolationCollector::new();
    let mut automaton = NindoAutomaton::new(schema, doc);
    for component in nindo {
        if !step(&mut automaton, component, &mut v) {
            return v;
        }
    }
    finish(&mut automaton, &mut v);
    debug!("validated {} components: {}", nindo.len(), v.validation_result());
    v
}

/// Validates a DocOp: its mutation form through the automaton, and what it
/// restates about the document (deleted content, old attributes, old
/// annotation values) against `doc`.
pub fn validate_doc_op<D, S>(doc: &D, op: &DocOp, schema: &S) -> ViolationCollector
where
    D: ReadableDocument + ?Sized,
    S: DocumentSchema + ?Sized,
{
    let mut v = ViolationCollector::new();
    let mut automaton = NindoAutomaton::new(schema, doc);
    let mut old_annotations: BTreeMap<String, Option<String>> = BTreeMap::new();
    for component in op {
        match component {
            DocOpComponent::Retain(n) => {
                automaton.check_old_annotations(pairs(&old_annotations), *n, Some(&mut v));
            }
            DocOpComponent::DeleteCharacters(s) => {
                automaton.check_deleted_characters(s, Some(&mut v));
                automaton.check_old_annotations(pairs(&old_annotations), s.chars().count(), Some(&mut v));
            }
            DocOpComponent::DeleteElementStart { tag, attrs } => {
                automaton.check_deleted_element(tag, attrs, Some(&mut v));
                automaton.check_old_annotations(pairs(&old_annotations), 1, Some(&mut v));
            }
            DocOpComponent::DeleteElementEnd => {
                automaton.check_old_annotations(pairs(&old_annotations), 1, Some(&mut v));
            }
            DocOpComponent::ReplaceAttributes { old: attrs, .. } => {
                automaton.check_old_attributes(attrs, Some(&mut v));
                automaton.check_old_annotations(pairs(&old_annotations), 1, Some(&mut v));
            }
            DocOpComponent::UpdateAttributes(update) => {
                automaton.check_old_attribute_values(update, Some(&mut v));
                automaton.check_old_annotations(pairs(&old_annotations), 1, Some(&mut v));
            }
            DocOpComponent::AnnotationBoundary(map) => {
                for key in map.ends() {
                    old_annotations.remove(key);
                }
                for change in map.changes() {
                    old_annotations.insert(change.key.clone(), change.old.clone());
                }
            }
            DocOpComponent::Characters(_) | DocOpComponent::ElementStart { .. } | DocOpComponent::ElementEnd => {}
        }

        let mut b = NindoBuilder::new();
        b.doc_op_component(component);
        for mutation in &b.build() {
            if !step(&mut automaton, mutation, &mut v) {
                return v;
            }
        }
    }
    finish(&mut automaton, &mut v);
    debug!("validated operation of {} components: {}", op.len(), v.validation_result());
    v
}

fn pairs(old: &BTreeMap<String, Option<String>>) -> impl Iterator<Item = (&str, Option<&str>)> {
    old.iter().map(|(key, value)| (key.as_str(), value.as_deref()))
}

/// Checks and applies one component; `false` once it is ill-formed.
fn step<D, S>(
    automaton: &mut NindoAutomaton<'_, D, S>,
    component: &NindoComponent,
    v: &mut ViolationCollector,
) -> bool
where
    D: ReadableDocument + ?Sized,
    S: DocumentSchema + ?Sized,
{
    if automaton.check_component(component, Some(&mut *v)).is_ill_formed() {
        debug!("ill-formed mutation: {}", v);
        return false;
    }
    automaton.do_component(component);
    true
}

fn finish<D, S>(automaton: &mut NindoAutomaton<'_, D, S>, v: &mut ViolationCollector)
where
    D: ReadableDocument + ?Sized,
    S: DocumentSchema + ?Sized,
{
    if !automaton.check_finish(Some(v)).is_ill_formed() {
        automaton.do_finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{Attributes, AttributesUpdate};
    use crate::automaton::ValidationResult;
    use crate::doc_op::{AnnotationBoundaryMap, DocOpBuilder};
    use crate::document::{IndexedDocument, OperationError};
    use crate::schema::NoSchema;

    #[test]
    fn stops_at_first_ill_formed_component() {
        let d = IndexedDocument::from_xml("<p>ab</p>").unwrap();
        let mut b = Nindo::builder();
        b.skip(1).element_end().skip(100);
        let v = validate(&d, &b.build(), &NoSchema);
        assert_eq!(v.validation_result(), ValidationResult::IllFormed);
        assert!(v.invalid_document().is_empty());
    }

    #[test]
    fn keeps_collecting_invalid_components() {
        let d = IndexedDocument::from_xml("<p>ab</p>").unwrap();
        let mut b = Nindo::builder();
        b.skip(1).delete_characters(5).skip(100);
        let v = validate(&d, &b.build(), &NoSchema);
        assert_eq!(v.validation_result(), ValidationResult::InvalidDocument);
        assert_eq!(v.invalid_document().len(), 2);
    }

    #[test]
    fn valid_doc_op() {
        let d = IndexedDocument::from_xml("<p>ab</p>").unwrap();
        let op = d.resolve_nindo(&Nindo::insert_characters(2, "x")).unwrap();
        assert!(validate_doc_op(&d, &op, &NoSchema).is_valid());
    }

    #[test]
    fn doc_op_deleting_other_text_is_invalid() {
        let d = IndexedDocument::from_xml("<p>ab</p>").unwrap();
        let mut b = DocOpBuilder::new();
        b.retain(1).delete_characters("zb").retain(1);
        let v = validate_doc_op(&d, &b.build(), &NoSchema);
        assert_eq!(v.validation_result(), ValidationResult::InvalidDocument);
        assert_eq!(
            v.first_description().as_deref(),
            Some("invalid operation: deleted characters differ from document at original document position 1 / resulting document position 1")
        );
    }

    #[test]
    fn doc_op_deleting_other_element_is_invalid() {
        let d = IndexedDocument::from_xml("<p a=\"1\"/>").unwrap();
        let mut b = DocOpBuilder::new();
        b.delete_element_start("p", Attributes::new()).delete_element_end();
        let v = validate_doc_op(&d, &b.build(), &NoSchema);
        assert_eq!(v.validation_result(), ValidationResult::InvalidDocument);
        assert_eq!(v.invalid_document()[0].description, "deleted element differs from document");
    }

    #[test]
    fn doc_op_with_stale_old_attributes_is_invalid() {
        let d = IndexedDocument::from_xml("<p a=\"1\"/>").unwrap();
        let mut b = DocOpBuilder::new();
        b.replace_attributes(Attributes::single("a", "2"), Attributes::new()).retain(1);
        let v = validate_doc_op(&d, &b.build(), &NoSchema);
        assert_eq!(v.invalid_document()[0].description, "old attributes differ from document");

        let update = AttributesUpdate::new().with("a", None, Some("3")).unwrap();
        let mut b = DocOpBuilder::new();
        b.update_attributes(update).retain(1);
        let v = validate_doc_op(&d, &b.build(), &NoSchema);
        assert_eq!(v.validation_result(), ValidationResult::InvalidDocument);
    }

    #[test]
    fn doc_op_with_stale_old_annotation_is_invalid_and_rejected() {
        let mut d = IndexedDocument::from_xml("<p>a<?a \"k\"=\"1\"?>b<?a \"k\"?></p>").unwrap();
        let boundary = |old: Option<&str>| {
            AnnotationBoundaryMap::builder()
                .change("k", old, Some("v"))
                .build()
                .unwrap()
        };
        let end = || AnnotationBoundaryMap::builder().end("k").build().unwrap();
        let op = |old: Option<&str>| {
            let mut b = DocOpBuilder::new();
            b.retain(1).annotation_boundary(boundary(old)).retain(2).annotation_boundary(end()).retain(1);
            b.build()
        };

        let wrong = op(Some("wrong"));
        let v = validate_doc_op(&d, &wrong, &NoSchema);
        assert_eq!(v.validation_result(), ValidationResult::InvalidDocument);
        assert_eq!(v.invalid_document()[0].description, "old annotations differ from document");
        assert!(matches!(
            d.consume(&wrong),
            Err(OperationError::OldAnnotationMismatch { pos: 1, .. })
        ));

        // "a" holds no value and "b" holds "1", so no single old value fits.
        let mixed = op(None);
        assert!(!validate_doc_op(&d, &mixed, &NoSchema).is_valid());
        assert!(matches!(
            d.consume(&mixed),
            Err(OperationError::OldAnnotationMismatch { pos: 2, .. })
        ));
        assert_eq!(d.to_xml_string(), "<p>a<?a \"k\"=\"1\"?>b<?a \"k\"?></p>");
    }
}
