//! Range-valued annotations over a linear document.
//!
//! Every position `p` in `[0, size)` maps each key to at most one value;
//! `None` means the key is absent there.  Ranges are half-open.

pub mod cursor;
pub mod intervals;
pub mod raw_set;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

pub use cursor::AnnotationCursor;
pub use intervals::{AnnotationInterval, AnnotationIntervals};
pub use raw_set::RawAnnotationSet;

/// Key → value map where `None` records an absent value explicitly.
pub type AnnotationValues = BTreeMap<String, Option<String>>;

/// Left-to-right stretches `(start, end, values)` over which every key holds
/// one value.  Only keys with a value appear in `values`.
pub type ValueSpans<'a> = Box<dyn Iterator<Item = (usize, usize, &'a BTreeMap<String, String>)> + 'a>;

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("position {pos} out of bounds for size {size}")]
    IndexOutOfBounds { pos: usize, size: usize },
    #[error("range [{start}, {end}) out of bounds for size {size}")]
    RangeOutOfBounds { start: usize, end: usize, size: usize },
    #[error("no annotation transaction in progress")]
    NoTransaction,
    #[error("cannot skip {requested} items, only {available} left")]
    SkipBeyondEnd { requested: usize, available: usize },
    #[error("cannot delete {requested} items, only {available} left")]
    DeleteBeyondEnd { requested: usize, available: usize },
    #[error("annotation {0:?} is not open")]
    NotOpen(String),
    #[error("annotation {0:?} was never ended")]
    UnclosedAnnotation(String),
}

pub(crate) fn check_range(start: usize, end: usize, size: usize) -> Result<(), AnnotationError> {
    if start > end || end > size {
        return Err(AnnotationError::RangeOutOfBounds { start, end, size });
    }
    Ok(())
}

// ── Listener ──────────────────────────────────────────────────────────────

/// Told about every annotation range a committed transaction painted.
pub trait AnnotationSetListener {
    fn on_annotation_change(&mut self, start: usize, end: usize, key: &str, value: Option<&str>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl AnnotationSetListener for NoopListener {
    fn on_annotation_change(&mut self, _start: usize, _end: usize, _key: &str, _value: Option<&str>) {}
}

// ── Read interface ────────────────────────────────────────────────────────

pub trait ReadableAnnotationSet {
    fn size(&self) -> usize;

    fn get_annotation(&self, pos: usize, key: &str) -> Result<Option<&str>, AnnotationError>;

    /// First position in `[start, end)` whose value for `key` is not `from`.
    fn first_annotation_change(
        &self,
        start: usize,
        end: usize,
        key: &str,
        from: Option<&str>,
    ) -> Result<Option<usize>, AnnotationError>;

    /// Scanning backward from `end`, the first `p` in `(start, end]` such that
    /// the value at `p - 1` is not `from`.
    fn last_annotation_change(
        &self,
        start: usize,
        end: usize,
        key: &str,
        from: Option<&str>,
    ) -> Result<Option<usize>, AnnotationError>;

    /// Keys with a value somewhere in `[start, end)`.
    fn keys_in_range(&self, start: usize, end: usize) -> Result<BTreeSet<String>, AnnotationError>;

    /// Constant stretches of `[start, end)`, clipped to the range.
    fn value_spans(&self, start: usize, end: usize) -> Result<ValueSpans<'_>, AnnotationError>;

    fn annotation_cursor(
        &self,
        start: usize,
        end: usize,
        keys: &[&str],
    ) -> Result<AnnotationCursor<'_, Self>, AnnotationError> {
        AnnotationCursor::new(self, start, end, keys)
    }

    /// Maximal constant intervals of `[start, end)`.  With `Some(keys)` the
    /// intervals only split where one of `keys` changes; with `None` they
    /// split on any key.
    fn annotation_intervals(
        &self,
        start: usize,
        end: usize,
        keys: Option<&[&str]>,
    ) -> Result<AnnotationIntervals<'_, Self>, AnnotationError> {
        AnnotationIntervals::new(self, start, end, keys)
    }
}
