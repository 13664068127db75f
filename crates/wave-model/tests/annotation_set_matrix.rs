use wave_model::annotation::{AnnotationError, AnnotationInterval, AnnotationValues, RawAnnotationSet, ReadableAnnotationSet};

fn first(m: &RawAnnotationSet, start: usize, end: usize, key: &str, from: Option<&str>) -> Option<usize> {
    m.first_annotation_change(start, end, key, from)
        .expect("query range must be valid")
}

fn last(m: &RawAnnotationSet, start: usize, end: usize, key: &str, from: Option<&str>) -> Option<usize> {
    m.last_annotation_change(start, end, key, from)
        .expect("query range must be valid")
}

fn filled(n: usize) -> RawAnnotationSet {
    let mut m = RawAnnotationSet::new();
    m.begin();
    m.insert(n).expect("insert must succeed");
    m.finish().expect("finish must succeed");
    m
}

/// 100 items with a=1 over [11, 41) and b=1 over [31, 56).
fn overlapping() -> RawAnnotationSet {
    let mut m = filled(100);
    m.begin();
    m.skip(11).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.skip(20).unwrap();
    m.start_annotation("b", Some("1")).unwrap();
    m.skip(10).unwrap();
    m.end_annotation("a").unwrap();
    m.skip(15).unwrap();
    m.end_annotation("b").unwrap();
    m.finish().unwrap();
    m
}

fn assert_overlapping(m: &RawAnnotationSet, a: (usize, usize), b: (usize, usize)) {
    let size = m.size();
    assert_eq!(first(m, 0, size, "a", None), Some(a.0));
    assert_eq!(first(m, a.0, size, "a", Some("1")), Some(a.1));
    assert_eq!(first(m, 0, size, "b", None), Some(b.0));
    assert_eq!(first(m, b.0, size, "b", Some("1")), Some(b.1));
}

// ── Change queries ────────────────────────────────────────────────────────

#[test]
fn annotation_set_blank_document_has_no_changes() {
    let m = filled(7);
    assert_eq!(first(&m, 0, 7, "hi", None), None);
    assert_eq!(last(&m, 0, 7, "hi", None), None);
    assert_eq!(first(&m, 1, 6, "hi", None), None);
    assert_eq!(last(&m, 1, 6, "hi", None), None);

    let mut two = RawAnnotationSet::new();
    two.begin();
    two.insert(1).unwrap();
    two.insert(1).unwrap();
    two.finish().unwrap();
    assert_eq!(first(&two, 0, 2, "hi", None), None);
}

#[test]
fn annotation_set_single_annotation_queries() {
    let mut m = filled(7);
    m.begin();
    m.skip(2).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.skip(3).unwrap();
    m.end_annotation("a").unwrap();
    m.finish().unwrap();
    // 0123456
    // ..111..

    assert_eq!(first(&m, 0, 7, "hi", None), None);
    assert_eq!(last(&m, 0, 7, "hi", None), None);
    assert_eq!(first(&m, 1, 6, "hi", None), None);
    assert_eq!(last(&m, 1, 6, "hi", None), None);

    assert_eq!(first(&m, 0, 7, "a", None), Some(2));
    assert_eq!(last(&m, 0, 7, "a", None), Some(5));
    assert_eq!(first(&m, 2, 5, "a", None), Some(2));
    assert_eq!(last(&m, 2, 5, "a", None), Some(5));
    assert_eq!(first(&m, 0, 7, "a", Some("1")), Some(0));
    assert_eq!(last(&m, 0, 7, "a", Some("1")), Some(7));
    assert_eq!(first(&m, 2, 5, "a", Some("1")), None);
    assert_eq!(last(&m, 2, 5, "a", Some("1")), None);
    assert_eq!(first(&m, 2, 6, "a", Some("1")), Some(5));
    assert_eq!(last(&m, 1, 5, "a", Some("1")), Some(2));
    assert_eq!(first(&m, 3, 4, "a", Some("1")), None);
    assert_eq!(last(&m, 3, 4, "a", Some("1")), None);
    assert_eq!(first(&m, 3, 4, "a", Some("x")), Some(3));
    assert_eq!(last(&m, 3, 4, "a", Some("x")), Some(4));
    assert_eq!(first(&m, 4, 5, "a", Some("1")), None);
    assert_eq!(last(&m, 2, 3, "a", Some("1")), None);
    assert_eq!(first(&m, 6, 7, "a", None), None);
    assert_eq!(first(&m, 7, 7, "a", None), None);
    assert_eq!(last(&m, 7, 7, "a", None), None);
}

#[test]
fn annotation_set_overlapping_in_one_pass() {
    assert_overlapping(&overlapping(), (11, 41), (31, 56));
}

#[test]
fn annotation_set_overlapping_from_separate_passes() {
    let mut m = filled(100);
    m.begin();
    m.skip(11).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.skip(30).unwrap();
    m.end_annotation("a").unwrap();
    m.skip(15).unwrap();
    m.finish().unwrap();
    m.begin();
    m.skip(31).unwrap();
    m.start_annotation("b", Some("1")).unwrap();
    m.skip(25).unwrap();
    m.end_annotation("b").unwrap();
    m.finish().unwrap();
    assert_overlapping(&m, (11, 41), (31, 56));
}

#[test]
fn annotation_set_overlapping_during_creation() {
    let mut m = RawAnnotationSet::new();
    m.begin();
    m.insert(11).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.insert(20).unwrap();
    m.start_annotation("b", Some("1")).unwrap();
    m.insert(10).unwrap();
    m.end_annotation("a").unwrap();
    m.insert(15).unwrap();
    m.end_annotation("b").unwrap();
    m.insert(10).unwrap();
    m.finish().unwrap();
    assert_eq!(m.size(), 66);
    assert_overlapping(&m, (11, 41), (31, 56));
}

#[test]
fn annotation_set_created_with_annotations() {
    let mut spanning = RawAnnotationSet::new();
    spanning.begin();
    spanning.start_annotation("a", Some("1")).unwrap();
    spanning.insert(10).unwrap();
    spanning.end_annotation("a").unwrap();
    spanning.finish().unwrap();
    assert_eq!(first(&spanning, 0, 10, "a", None), Some(0));
    assert_eq!(last(&spanning, 0, 10, "a", None), Some(10));
    assert_eq!(first(&spanning, 0, 10, "a", Some("1")), None);
    assert_eq!(last(&spanning, 0, 10, "a", Some("1")), None);

    let mut initial = RawAnnotationSet::new();
    initial.begin();
    initial.start_annotation("a", Some("1")).unwrap();
    initial.insert(10).unwrap();
    initial.end_annotation("a").unwrap();
    initial.insert(5).unwrap();
    initial.finish().unwrap();
    assert_eq!(first(&initial, 0, 10, "a", None), Some(0));
    assert_eq!(last(&initial, 0, 10, "a", None), Some(10));
    assert_eq!(first(&initial, 0, 15, "a", None), Some(0));
    assert_eq!(last(&initial, 0, 15, "a", None), Some(10));
    assert_eq!(first(&initial, 0, 10, "a", Some("1")), None);

    let mut trailing = RawAnnotationSet::new();
    trailing.begin();
    trailing.insert(5).unwrap();
    trailing.start_annotation("a", Some("1")).unwrap();
    trailing.insert(10).unwrap();
    trailing.end_annotation("a").unwrap();
    trailing.finish().unwrap();
    assert_eq!(first(&trailing, 5, 15, "a", None), Some(5));
    assert_eq!(last(&trailing, 5, 15, "a", None), Some(15));
    assert_eq!(first(&trailing, 0, 15, "a", None), Some(5));
    assert_eq!(last(&trailing, 0, 15, "a", None), Some(15));
    assert_eq!(first(&trailing, 5, 15, "a", Some("1")), None);
    assert_eq!(last(&trailing, 5, 15, "a", Some("1")), None);
}

#[test]
fn annotation_set_removal_splits_range() {
    let mut m = overlapping();
    m.begin();
    m.skip(23).unwrap();
    m.start_annotation("a", None).unwrap();
    m.skip(2).unwrap();
    m.end_annotation("a").unwrap();
    m.finish().unwrap();
    assert_eq!(first(&m, 11, 50, "a", Some("1")), Some(23));
    assert_eq!(first(&m, 23, 50, "a", None), Some(25));
    assert_eq!(m.get_annotation(25, "a").unwrap(), Some("1"));
    assert_eq!(m.get_annotation(24, "a").unwrap(), None);
}

#[test]
fn annotation_set_document_delete_shrinks_ranges() {
    let mut m = overlapping();
    m.begin();
    m.skip(12).unwrap();
    m.delete(1).unwrap();
    m.finish().unwrap();
    assert_eq!(m.size(), 99);
    assert_overlapping(&m, (11, 40), (30, 55));

    m.begin();
    m.skip(30).unwrap();
    m.delete(10).unwrap();
    m.finish().unwrap();
    assert_eq!(m.size(), 89);
    assert_eq!(first(&m, 0, 89, "a", None), Some(11));
    assert_eq!(first(&m, 11, 89, "a", Some("1")), Some(30));
    assert_eq!(first(&m, 0, 89, "b", None), Some(30));
    assert_eq!(first(&m, 30, 89, "b", Some("1")), Some(45));
}

#[test]
fn annotation_set_document_insert_inherits_left_neighbour() {
    let mut m = overlapping();
    m.begin();
    m.skip(12).unwrap();
    m.insert(1).unwrap();
    m.finish().unwrap();
    assert_overlapping(&m, (11, 42), (32, 57));

    // At the start of b the left neighbour only carries a.
    m.begin();
    m.skip(32).unwrap();
    m.insert(5).unwrap();
    m.finish().unwrap();
    assert_eq!(m.size(), 106);
    assert_overlapping(&m, (11, 47), (37, 62));
}

#[test]
fn annotation_set_annotated_inserts() {
    let mut m = filled(20);
    m.begin();
    for _ in 0..2 {
        m.start_annotation("a", Some("1")).unwrap();
        m.insert(10).unwrap();
        m.end_annotation("a").unwrap();
        m.skip(10).unwrap();
    }
    m.start_annotation("a", Some("1")).unwrap();
    m.insert(10).unwrap();
    m.end_annotation("a").unwrap();
    m.finish().unwrap();

    assert_eq!(first(&m, 0, 50, "a", None), Some(0));
    assert_eq!(first(&m, 0, 50, "a", Some("1")), Some(10));
    assert_eq!(first(&m, 10, 50, "a", None), Some(20));
    assert_eq!(first(&m, 20, 50, "a", Some("1")), Some(30));
    assert_eq!(first(&m, 30, 50, "a", None), Some(40));
    assert_eq!(first(&m, 40, 50, "a", Some("1")), None);
}

#[test]
fn annotation_set_annotated_insert_next_to_same_value() {
    let mut m = RawAnnotationSet::new();
    m.begin();
    m.insert(10).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.insert(10).unwrap();
    m.end_annotation("a").unwrap();
    m.insert(20).unwrap();
    m.finish().unwrap();

    m.begin();
    m.skip(20).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.insert(10).unwrap();
    m.end_annotation("a").unwrap();
    m.skip(20).unwrap();
    m.finish().unwrap();
    assert_eq!(first(&m, 0, 50, "a", None), Some(10));
    assert_eq!(last(&m, 0, 50, "a", None), Some(30));
    assert_eq!(first(&m, 10, 30, "a", Some("1")), None);

    m.begin();
    m.skip(30).unwrap();
    m.start_annotation("a", Some("2")).unwrap();
    m.insert(10).unwrap();
    m.end_annotation("a").unwrap();
    m.finish().unwrap();
    assert_eq!(first(&m, 0, 60, "a", None), Some(10));
    assert_eq!(last(&m, 0, 60, "a", None), Some(40));
    assert_eq!(first(&m, 10, 30, "a", Some("1")), None);
    assert_eq!(first(&m, 30, 40, "a", Some("2")), None);
    assert_eq!(first(&m, 10, 40, "a", Some("1")), Some(30));
    assert_eq!(last(&m, 10, 40, "a", Some("2")), Some(30));
}

#[test]
fn annotation_set_query_bounds() {
    let m = filled(1);
    assert_eq!(m.get_annotation(0, "a"), Ok(None));
    assert_eq!(
        m.get_annotation(1, "a"),
        Err(AnnotationError::IndexOutOfBounds { pos: 1, size: 1 })
    );
    assert_eq!(m.first_annotation_change(0, 1, "a", None), Ok(None));
    assert_eq!(
        m.first_annotation_change(0, 2, "a", None),
        Err(AnnotationError::RangeOutOfBounds { start: 0, end: 2, size: 1 })
    );
    assert!(m.last_annotation_change(1, 0, "a", None).is_err());
    assert!(m.keys_in_range(0, 2).is_err());
    assert!(m.annotation_cursor(0, 2, &["a"]).is_err());
    assert!(m.annotation_intervals(2, 2, None).is_err());
}

// ── Intervals ─────────────────────────────────────────────────────────────

fn map(pairs: &[(&str, Option<&str>)]) -> AnnotationValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_owned)))
        .collect()
}

fn interval(
    start: usize,
    end: usize,
    annotations: &[(&str, Option<&str>)],
    diff_from_left: &[(&str, Option<&str>)],
) -> AnnotationInterval {
    AnnotationInterval {
        start,
        end,
        annotations: map(annotations),
        diff_from_left: map(diff_from_left),
    }
}

fn intervals(m: &RawAnnotationSet, start: usize, end: usize, keys: &[&str]) -> Vec<AnnotationInterval> {
    m.annotation_intervals(start, end, Some(keys))
        .expect("interval range must be valid")
        .collect()
}

#[test]
fn annotation_intervals_follow_successive_passes() {
    let mut m = filled(100);
    assert_eq!(intervals(&m, 40, 60, &[]), vec![interval(40, 60, &[], &[])]);
    assert_eq!(
        intervals(&m, 40, 60, &["a", "b"]),
        vec![interval(40, 60, &[("a", None), ("b", None)], &[])]
    );
    assert_eq!(
        intervals(&m, 0, 100, &["a", "b"]),
        vec![interval(0, 100, &[("a", None), ("b", None)], &[])]
    );

    m.begin();
    m.skip(10).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.skip(80).unwrap();
    m.end_annotation("a").unwrap();
    m.skip(10).unwrap();
    m.finish().unwrap();
    assert_eq!(intervals(&m, 40, 60, &[]), vec![interval(40, 60, &[], &[])]);
    assert_eq!(
        intervals(&m, 40, 60, &["a"]),
        vec![interval(40, 60, &[("a", Some("1"))], &[])]
    );
    assert_eq!(intervals(&m, 0, 100, &[]), vec![interval(0, 100, &[], &[])]);
    pretty_assertions::assert_eq!(
        intervals(&m, 0, 100, &["a", "b"]),
        vec![
            interval(0, 10, &[("a", None), ("b", None)], &[]),
            interval(10, 90, &[("a", Some("1")), ("b", None)], &[("a", Some("1"))]),
            interval(90, 100, &[("a", None), ("b", None)], &[("a", None)]),
        ]
    );

    m.begin();
    m.skip(20).unwrap();
    m.start_annotation("b", Some("2")).unwrap();
    m.skip(60).unwrap();
    m.end_annotation("b").unwrap();
    m.skip(20).unwrap();
    m.finish().unwrap();
    assert_eq!(
        intervals(&m, 40, 60, &["a", "b"]),
        vec![interval(40, 60, &[("a", Some("1")), ("b", Some("2"))], &[])]
    );
    pretty_assertions::assert_eq!(
        intervals(&m, 0, 80, &["a"]),
        vec![
            interval(0, 10, &[("a", None)], &[]),
            interval(10, 80, &[("a", Some("1"))], &[("a", Some("1"))]),
        ]
    );
    pretty_assertions::assert_eq!(
        intervals(&m, 0, 80, &["a", "b"]),
        vec![
            interval(0, 10, &[("a", None), ("b", None)], &[]),
            interval(10, 20, &[("a", Some("1")), ("b", None)], &[("a", Some("1"))]),
            interval(20, 80, &[("a", Some("1")), ("b", Some("2"))], &[("b", Some("2"))]),
        ]
    );

    m.begin();
    m.skip(25).unwrap();
    m.start_annotation("a", Some("3")).unwrap();
    m.skip(70).unwrap();
    m.end_annotation("a").unwrap();
    m.skip(5).unwrap();
    m.finish().unwrap();
    assert_eq!(
        intervals(&m, 40, 60, &["a", "b"]),
        vec![interval(40, 60, &[("a", Some("3")), ("b", Some("2"))], &[])]
    );
    pretty_assertions::assert_eq!(
        intervals(&m, 0, 100, &["a"]),
        vec![
            interval(0, 10, &[("a", None)], &[]),
            interval(10, 25, &[("a", Some("1"))], &[("a", Some("1"))]),
            interval(25, 95, &[("a", Some("3"))], &[("a", Some("3"))]),
            interval(95, 100, &[("a", None)], &[("a", None)]),
        ]
    );
    pretty_assertions::assert_eq!(
        intervals(&m, 0, 100, &["a", "b"]),
        vec![
            interval(0, 10, &[("a", None), ("b", None)], &[]),
            interval(10, 20, &[("a", Some("1")), ("b", None)], &[("a", Some("1"))]),
            interval(20, 25, &[("a", Some("1")), ("b", Some("2"))], &[("b", Some("2"))]),
            interval(25, 80, &[("a", Some("3")), ("b", Some("2"))], &[("a", Some("3"))]),
            interval(80, 95, &[("a", Some("3")), ("b", None)], &[("b", None)]),
            interval(95, 100, &[("a", None), ("b", None)], &[("a", None)]),
        ]
    );
}

#[test]
fn annotation_intervals_start_mid_range_diff_from_previous_position() {
    let mut m = filled(30);
    m.begin();
    m.skip(10).unwrap();
    m.start_annotation("a", Some("1")).unwrap();
    m.skip(10).unwrap();
    m.end_annotation("a").unwrap();
    m.finish().unwrap();

    assert_eq!(
        intervals(&m, 10, 30, &["a"]),
        vec![
            interval(10, 20, &[("a", Some("1"))], &[("a", Some("1"))]),
            interval(20, 30, &[("a", None)], &[("a", None)]),
        ]
    );
    assert_eq!(
        intervals(&m, 15, 25, &["a"]),
        vec![
            interval(15, 20, &[("a", Some("1"))], &[]),
            interval(20, 25, &[("a", None)], &[("a", None)]),
        ]
    );
}

#[test]
fn annotation_cursor_visits_every_change_once() {
    let m = overlapping();
    let seen: Vec<(usize, Vec<String>)> = m
        .annotation_cursor(0, 100, &["a", "b"])
        .expect("cursor range must be valid")
        .map(|(loc, keys)| (loc, keys.into_iter().collect()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (11, vec!["a".to_string()]),
            (31, vec!["b".to_string()]),
            (41, vec!["a".to_string()]),
            (56, vec!["b".to_string()]),
        ]
    );
}
