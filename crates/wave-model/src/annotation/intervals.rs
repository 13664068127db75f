//! Maximal constant-annotation intervals.

use std::iter::Peekable;
use std::marker::PhantomData;

use super::{check_range, AnnotationError, AnnotationValues, ReadableAnnotationSet, ValueSpans};

/// A maximal stretch `[start, end)` over which the queried keys are constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationInterval {
    pub start: usize,
    pub end: usize,
    pub annotations: AnnotationValues,
    /// Keys whose value differs from the position before `start`.
    pub diff_from_left: AnnotationValues,
}

/// Walks the set's constant stretches once, joining neighbours that agree
/// on every queried key.
pub struct AnnotationIntervals<'a, A: ReadableAnnotationSet + ?Sized> {
    spans: Peekable<ValueSpans<'a>>,
    keys: Vec<String>,
    /// Whether absent keys are listed in `annotations`.
    explicit_keys: bool,
    previous: AnnotationValues,
    set: PhantomData<&'a A>,
}

impl<'a, A: ReadableAnnotationSet + ?Sized> AnnotationIntervals<'a, A> {
    pub fn new(
        set: &'a A,
        start: usize,
        end: usize,
        keys: Option<&[&str]>,
    ) -> Result<Self, AnnotationError> {
        check_range(start, end, set.size())?;
        let (keys, explicit_keys) = match keys {
            Some(keys) => (keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(), true),
            None => (
                set.keys_in_range(start.saturating_sub(1), end)?.into_iter().collect(),
                false,
            ),
        };
        let mut previous = AnnotationValues::new();
        for key in &keys {
            let value = if start == 0 {
                None
            } else {
                set.get_annotation(start - 1, key)?.map(str::to_owned)
            };
            previous.insert(key.clone(), value);
        }
        Ok(Self {
            spans: set.value_spans(start, end)?.peekable(),
            keys,
            explicit_keys,
            previous,
            set: PhantomData,
        })
    }
}

impl<A: ReadableAnnotationSet + ?Sized> Iterator for AnnotationIntervals<'_, A> {
    type Item = AnnotationInterval;

    fn next(&mut self) -> Option<AnnotationInterval> {
        let (start, mut end, values) = self.spans.next()?;
        while let Some(&(_, next_end, next_values)) = self.spans.peek() {
            if self.keys.iter().any(|key| next_values.get(key) != values.get(key)) {
                break;
            }
            end = next_end;
            self.spans.next();
        }
        let current: AnnotationValues = self
            .keys
            .iter()
            .map(|key| (key.clone(), values.get(key).cloned()))
            .collect();

        let diff_from_left: AnnotationValues = current
            .iter()
            .filter(|(key, value)| self.previous.get(*key) != Some(*value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let annotations: AnnotationValues = if self.explicit_keys {
            current.clone()
        } else {
            current
                .iter()
                .filter(|(key, value)| {
                    value.is_some() || self.previous.get(*key).is_some_and(Option::is_some)
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        self.previous = current;
        Some(AnnotationInterval {
            start,
            end,
            annotations,
            diff_from_left,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::RawAnnotationSet;

    fn map(pairs: &[(&str, Option<&str>)]) -> AnnotationValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_owned)))
            .collect()
    }

    #[test]
    fn unfiltered_intervals_report_removed_keys() {
        let mut s = RawAnnotationSet::new();
        s.begin();
        s.start_annotation("a", Some("1")).unwrap();
        s.insert(1).unwrap();
        s.end_annotation("a").unwrap();
        s.insert(1).unwrap();
        s.finish().unwrap();
        let got: Vec<_> = s.annotation_intervals(0, 2, None).unwrap().collect();
        assert_eq!(
            got,
            vec![
                AnnotationInterval {
                    start: 0,
                    end: 1,
                    annotations: map(&[("a", Some("1"))]),
                    diff_from_left: map(&[("a", Some("1"))]),
                },
                AnnotationInterval {
                    start: 1,
                    end: 2,
                    annotations: map(&[("a", None)]),
                    diff_from_left: map(&[("a", None)]),
                },
            ]
        );
    }

    #[test]
    fn empty_range_yields_nothing() {
        let mut s = RawAnnotationSet::new();
        s.begin();
        s.insert(3).unwrap();
        s.finish().unwrap();
        assert_eq!(s.annotation_intervals(2, 2, None).unwrap().count(), 0);
        assert_eq!(s.annotation_intervals(0, 3, Some(&[][..])).unwrap().count(), 1);
        assert!(s.annotation_intervals(0, 4, None).is_err());
    }

    #[test]
    fn keyed_intervals_join_runs_that_differ_elsewhere() {
        let mut s = RawAnnotationSet::new();
        s.begin();
        s.start_annotation("a", Some("1")).unwrap();
        s.start_annotation("b", Some("x")).unwrap();
        s.insert(2).unwrap();
        s.start_annotation("b", Some("y")).unwrap();
        s.insert(2).unwrap();
        s.end_annotation("a").unwrap();
        s.insert(1).unwrap();
        s.end_annotation("b").unwrap();
        s.finish().unwrap();
        let got: Vec<_> = s
            .annotation_intervals(1, 5, Some(&["a"][..]))
            .unwrap()
            .map(|i| (i.start, i.end))
            .collect();
        assert_eq!(got, vec![(1, 4), (4, 5)]);
        assert_eq!(s.annotation_intervals(0, 5, None).unwrap().count(), 3);
    }
}
