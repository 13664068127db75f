//! [`AnnotationBuilder`]: paints one annotation key over a range with the
//! fewest components.

use crate::annotation::{AnnotationError, ReadableAnnotationSet};

use super::{Nindo, NindoBuilder};

/// Builds a Nindo that sets `key` over parts of `[range_start, range_end)`,
/// touching only the runs whose current value differs from the requested one.
pub struct AnnotationBuilder<'a, A: ReadableAnnotationSet + ?Sized> {
    annotations: &'a A,
    builder: NindoBuilder,
    key: String,
    skip_accum: usize,
    current_pos: usize,
    range_end: usize,
    dirty: bool,
}

impl<'a, A: ReadableAnnotationSet + ?Sized> AnnotationBuilder<'a, A> {
    pub fn new(annotations: &'a A, range_start: usize, range_end: usize, key: impl Into<String>) -> Self {
        Self {
            annotations,
            builder: NindoBuilder::new(),
            key: key.into(),
            skip_accum: range_start,
            current_pos: range_start,
            range_end,
            dirty: false,
        }
    }

    pub fn current_pos(&self) -> usize {
        self.current_pos
    }

    /// Whether any component has been emitted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets the key to `value` from the current position up to `end`.
    pub fn set_up_to(&mut self, value: Option<&str>, end: usize) -> Result<(), AnnotationError> {
        if end < self.current_pos || end > self.range_end {
            return Err(AnnotationError::RangeOutOfBounds {
                start: self.current_pos,
                end,
                size: self.range_end,
            });
        }
        while self.current_pos < end {
            let current = self.annotations.get_annotation(self.current_pos, &self.key)?;
            let next = self
                .annotations
                .first_annotation_change(self.current_pos, end, &self.key, current)?
                .unwrap_or(end);
            let size = next - self.current_pos;
            if current != value {
                if self.skip_accum > 0 {
                    self.builder.skip(self.skip_accum);
                    self.skip_accum = 0;
                }
                self.builder
                    .start_annotation(self.key.clone(), value.map(str::to_owned))
                    .skip(size)
                    .end_annotation(self.key.clone());
                self.dirty = true;
            } else {
                self.skip_accum += size;
            }
            self.current_pos = next;
        }
        Ok(())
    }

    /// Removes the key from the current position up to `end`.
    pub fn clear_up_to(&mut self, end: usize) -> Result<(), AnnotationError> {
        self.set_up_to(None, end)
    }

    /// The accumulated mutation; trailing untouched runs are not skipped.
    pub fn build(&self) -> Nindo {
        self.builder.build()
    }
}
