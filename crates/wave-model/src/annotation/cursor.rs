//! Forward-only iteration over annotation change points.

use std::collections::{BTreeMap, BTreeSet};

use super::{check_range, AnnotationError, ReadableAnnotationSet};

/// Walks the positions in `[start, end)` where at least one of a fixed set
/// of keys changes value relative to the position before it.
pub struct AnnotationCursor<'a, A: ReadableAnnotationSet + ?Sized> {
    set: &'a A,
    end: usize,
    /// Key → next change location, if any.
    next: BTreeMap<String, Option<usize>>,
    current: Option<usize>,
}

impl<'a, A: ReadableAnnotationSet + ?Sized> AnnotationCursor<'a, A> {
    pub fn new(set: &'a A, start: usize, end: usize, keys: &[&str]) -> Result<Self, AnnotationError> {
        check_range(start, end, set.size())?;
        let mut cursor = Self {
            set,
            end,
            next: BTreeMap::new(),
            current: None,
        };
        for key in keys {
            let before = if start == 0 {
                None
            } else {
                set.get_annotation(start - 1, key)?
            };
            let next = set.first_annotation_change(start, end, key, before)?;
            cursor.next.insert(key.to_string(), next);
        }
        Ok(cursor)
    }

    pub fn has_next(&self) -> bool {
        self.next.values().any(Option::is_some)
    }

    /// `None` until the first call to [`next_location`](Self::next_location).
    pub fn current_location(&self) -> Option<usize> {
        self.current
    }

    /// Advances to the next change point and returns the keys changing there.
    /// Returns an empty set once exhausted.
    pub fn next_location(&mut self) -> BTreeSet<String> {
        let location = match self.next.values().flatten().min() {
            Some(&loc) => loc,
            None => return BTreeSet::new(),
        };
        self.current = Some(location);
        let changed: BTreeSet<String> = self
            .next
            .iter()
            .filter(|(_, next)| **next == Some(location))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &changed {
            // The range was validated up front, so lookups inside it succeed.
            let value = self.set.get_annotation(location, key).ok().flatten();
            let next = self
                .set
                .first_annotation_change(location, self.end, key, value)
                .ok()
                .flatten();
            self.next.insert(key.clone(), next);
        }
        changed
    }
}

impl<A: ReadableAnnotationSet + ?Sized> Iterator for AnnotationCursor<'_, A> {
    type Item = (usize, BTreeSet<String>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let keys = self.next_location();
        self.current.map(|loc| (loc, keys))
    }
}
