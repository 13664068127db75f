//! Document cost: an estimate of how much storage an operation takes.
//!
//! Every object (component, attribute, annotation change or end) costs a
//! fixed overhead; every string costs its length in code points.

use crate::attributes::{Attributes, AttributesUpdate};
use crate::doc_op::{AnnotationBoundaryMap, DocOp, DocOpComponent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCostFunction {
    object_overhead: usize,
}

impl DocumentCostFunction {
    pub fn with_object_overhead(object_overhead: usize) -> Self {
        Self { object_overhead }
    }

    pub fn object_overhead(&self) -> usize {
        self.object_overhead
    }

    pub fn string_cost(&self, s: &str) -> usize {
        s.chars().count()
    }

    fn optional_cost(&self, s: Option<&str>) -> usize {
        s.map_or(0, |s| self.string_cost(s))
    }

    pub fn attributes_cost(&self, attrs: &Attributes) -> usize {
        attrs
            .iter()
            .map(|(k, v)| self.object_overhead + self.string_cost(k) + self.string_cost(v))
            .sum()
    }

    pub fn attributes_update_cost(&self, update: &AttributesUpdate) -> usize {
        update
            .iter()
            .map(|c| {
                self.object_overhead
                    + self.string_cost(&c.key)
                    + self.optional_cost(c.old.as_deref())
                    + self.optional_cost(c.new.as_deref())
            })
            .sum()
    }

    pub fn boundary_cost(&self, map: &AnnotationBoundaryMap) -> usize {
        let changes: usize = map
            .changes()
            .iter()
            .map(|c| {
                self.object_overhead
                    + self.string_cost(&c.key)
                    + self.optional_cost(c.old.as_deref())
                    + self.optional_cost(c.new.as_deref())
            })
            .sum();
        let ends: usize = map
            .ends()
            .iter()
            .map(|k| self.object_overhead + self.string_cost(k))
            .sum();
        changes + ends
    }

    pub fn component_cost(&self, component: &DocOpComponent) -> usize {
        let payload = match component {
            DocOpComponent::Retain(_) | DocOpComponent::ElementEnd | DocOpComponent::DeleteElementEnd => 0,
            DocOpComponent::Characters(s) | DocOpComponent::DeleteCharacters(s) => self.string_cost(s),
            DocOpComponent::ElementStart { tag, attrs }
            | DocOpComponent::DeleteElementStart { tag, attrs } => {
                self.string_cost(tag) + self.attributes_cost(attrs)
            }
            DocOpComponent::ReplaceAttributes { old, new } => {
                self.attributes_cost(old) + self.attributes_cost(new)
            }
            DocOpComponent::UpdateAttributes(update) => self.attributes_update_cost(update),
            DocOpComponent::AnnotationBoundary(map) => self.boundary_cost(map),
        };
        self.object_overhead + payload
    }

    pub fn compute_cost(&self, op: &DocOp) -> usize {
        op.iter().map(|c| self.component_cost(c)).sum()
    }
}
