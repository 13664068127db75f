use std::collections::BTreeMap;

use proptest::prelude::*;
use wave_model::annotation::{AnnotationValues, RawAnnotationSet, ReadableAnnotationSet};

const KEYS: [&str; 3] = ["a", "b", "c"];
const VALUES: [Option<&str>; 3] = [None, Some("1"), Some("2")];

/// One `set_annotation`-style pass: paint `key` over `[start, start + len)`.
#[derive(Debug, Clone)]
struct Paint {
    start: usize,
    len: usize,
    key: usize,
    value: usize,
}

fn paints(size: usize) -> impl Strategy<Value = Vec<Paint>> {
    prop::collection::vec(
        (0..size, 0..size, 0..KEYS.len(), 0..VALUES.len()).prop_map(move |(start, len, key, value)| Paint {
            start,
            len: len.min(size - start),
            key,
            value,
        }),
        0..12,
    )
}

/// Applies the passes to both the run-length set and a per-position model.
fn build(size: usize, passes: &[Paint]) -> (RawAnnotationSet, Vec<BTreeMap<String, String>>) {
    let mut set = RawAnnotationSet::new();
    set.begin();
    set.insert(size).expect("insert must succeed");
    set.finish().expect("finish must succeed");
    let mut model = vec![BTreeMap::new(); size];

    for p in passes {
        let key = KEYS[p.key];
        let value = VALUES[p.value];
        set.begin();
        set.skip(p.start).expect("skip must succeed");
        set.start_annotation(key, value).expect("start must succeed");
        set.skip(p.len).expect("skip must succeed");
        set.end_annotation(key).expect("end must succeed");
        set.finish().expect("finish must succeed");

        for values in &mut model[p.start..p.start + p.len] {
            match value {
                Some(v) => values.insert(key.to_string(), v.to_string()),
                None => values.remove(key),
            };
        }
    }
    (set, model)
}

fn model_value<'a>(model: &'a [BTreeMap<String, String>], pos: usize, key: &str) -> Option<&'a str> {
    model[pos].get(key).map(String::as_str)
}

proptest! {
    #[test]
    fn property_queries_agree_with_per_position_model(
        (size, passes, start, end) in (1usize..40).prop_flat_map(|size| {
            (Just(size), paints(size), 0..=size, 0..=size)
        }),
        key in 0..KEYS.len(),
        from in 0..VALUES.len(),
    ) {
        let (set, model) = build(size, &passes);
        let (start, end) = (start.min(end), start.max(end));
        let key = KEYS[key];
        let from = VALUES[from];

        prop_assert_eq!(set.size(), size);
        for pos in 0..size {
            prop_assert_eq!(set.get_annotation(pos, key).unwrap(), model_value(&model, pos, key));
        }

        let expected_first = (start..end).find(|&p| model_value(&model, p, key) != from);
        prop_assert_eq!(set.first_annotation_change(start, end, key, from).unwrap(), expected_first);

        let expected_last = (start..end).rev().find(|&p| model_value(&model, p, key) != from).map(|p| p + 1);
        prop_assert_eq!(set.last_annotation_change(start, end, key, from).unwrap(), expected_last);
    }

    #[test]
    fn property_intervals_are_maximal_and_cover_range(
        (size, passes, start, end) in (1usize..40).prop_flat_map(|size| {
            (Just(size), paints(size), 0..=size, 0..=size)
        }),
    ) {
        let (set, model) = build(size, &passes);
        let (start, end) = (start.min(end), start.max(end));
        let intervals: Vec<_> = set.annotation_intervals(start, end, Some(&KEYS[..])).unwrap().collect();

        let mut at = start;
        let mut previous: Option<AnnotationValues> = None;
        for interval in &intervals {
            prop_assert_eq!(interval.start, at);
            prop_assert!(interval.end > interval.start);
            for pos in interval.start..interval.end {
                for key in KEYS {
                    let held = interval.annotations.get(key).cloned().flatten();
                    prop_assert_eq!(held.as_deref(), model_value(&model, pos, key));
                }
            }
            if let Some(previous) = &previous {
                prop_assert_ne!(previous, &interval.annotations);
                // Replaying the diff on the left neighbour gives this interval.
                let mut replayed = previous.clone();
                replayed.extend(interval.diff_from_left.clone());
                prop_assert_eq!(&replayed, &interval.annotations);
            }
            previous = Some(interval.annotations.clone());
            at = interval.end;
        }
        prop_assert_eq!(at, end);
    }

    #[test]
    fn property_cursor_stops_exactly_at_changes(
        (size, passes, start, end) in (1usize..40).prop_flat_map(|size| {
            (Just(size), paints(size), 0..=size, 0..=size)
        }),
    ) {
        let (set, model) = build(size, &passes);
        let (start, end) = (start.min(end), start.max(end));
        let stops: Vec<usize> = set.annotation_cursor(start, end, &KEYS).unwrap().map(|(loc, _)| loc).collect();
        let expected: Vec<usize> = (start..end)
            .filter(|&p| {
                KEYS.iter().any(|key| {
                    let before = if p == 0 { None } else { model_value(&model, p - 1, key) };
                    model_value(&model, p, key) != before
                })
            })
            .collect();
        prop_assert_eq!(stops, expected);
    }
}
