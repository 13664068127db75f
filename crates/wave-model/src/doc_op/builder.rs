//! [`DocOpBuilder`]: appends components to a [`DocOp`] in order.
//!
//! Adjacent components are never merged, so the component count of the
//! built operation is exactly the number of calls made.

use crate::attributes::{Attributes, AttributesUpdate};

use super::{AnnotationBoundaryMap, DocOp, DocOpComponent};

#[derive(Debug, Default)]
pub struct DocOpBuilder {
    components: Vec<DocOpComponent>,
}

impl DocOpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, component: DocOpComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn retain(&mut self, n: usize) -> &mut Self {
        self.push(DocOpComponent::Retain(n))
    }

    pub fn characters(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(DocOpComponent::Characters(s.into()))
    }

    pub fn element_start(&mut self, tag: impl Into<String>, attrs: Attributes) -> &mut Self {
        self.push(DocOpComponent::ElementStart { tag: tag.into(), attrs })
    }

    pub fn element_end(&mut self) -> &mut Self {
        self.push(DocOpComponent::ElementEnd)
    }

    pub fn delete_characters(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(DocOpComponent::DeleteCharacters(s.into()))
    }

    pub fn delete_element_start(&mut self, tag: impl Into<String>, attrs: Attributes) -> &mut Self {
        self.push(DocOpComponent::DeleteElementStart { tag: tag.into(), attrs })
    }

    pub fn delete_element_end(&mut self) -> &mut Self {
        self.push(DocOpComponent::DeleteElementEnd)
    }

    pub fn replace_attributes(&mut self, old: Attributes, new: Attributes) -> &mut Self {
        self.push(DocOpComponent::ReplaceAttributes { old, new })
    }

    pub fn update_attributes(&mut self, update: AttributesUpdate) -> &mut Self {
        self.push(DocOpComponent::UpdateAttributes(update))
    }

    pub fn annotation_boundary(&mut self, map: AnnotationBoundaryMap) -> &mut Self {
        self.push(DocOpComponent::AnnotationBoundary(map))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn build(self) -> DocOp {
        DocOp::new(self.components)
    }
}
