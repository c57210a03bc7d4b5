use pretty_assertions::assert_eq;

use super::*;
use crate::{array_length_mismatch, cannot_convert, constant_expected, undeclared_label};

#[test]
fn test_flush_sorts_by_position() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.add(undeclared_label(Span::new(40, 45), "b")));
    assert!(queue.add(constant_expected(Span::new(10, 12))));
    assert!(queue.add(array_length_mismatch(Span::new(20, 30), 2)));

    let codes: Vec<ErrorCode> = queue.flush().into_iter().map(|d| d.code).collect();
    assert_eq!(
        codes,
        vec![ErrorCode::CS0150, ErrorCode::CS0847, ErrorCode::CS0159]
    );
    assert_eq!(queue.error_count(), 0);
}

#[test]
fn test_same_position_keeps_insertion_order() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    queue.add(constant_expected(Span::new(5, 6)));
    queue.add(array_length_mismatch(Span::new(5, 6), 1));

    let codes: Vec<ErrorCode> = queue.flush().into_iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::CS0150, ErrorCode::CS0847]);
}

#[test]
fn test_duplicates_dropped() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.add(constant_expected(Span::new(5, 6))));
    assert!(!queue.add(constant_expected(Span::new(5, 6))));
    assert!(queue.add(constant_expected(Span::new(8, 9))));
    assert_eq!(queue.error_count(), 2);
}

#[test]
fn test_duplicates_kept_when_unlimited() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    assert!(queue.add(constant_expected(Span::new(5, 6))));
    assert!(queue.add(constant_expected(Span::new(5, 6))));
    assert_eq!(queue.peek().count(), 2);
}

#[test]
fn test_follow_on_filtered() {
    let mut queue = DiagnosticQueue::new();
    assert!(!queue.add(cannot_convert(Span::new(0, 1), "?", "int")));
    assert!(queue.add(cannot_convert(Span::new(0, 1), "string", "int")));
    assert_eq!(queue.error_count(), 1);
}

#[test]
fn test_flagged_follow_on_filtered() {
    let mut queue = DiagnosticQueue::new();
    assert!(!queue.add(constant_expected(Span::new(0, 1)).as_follow_on()));
    assert_eq!(queue.error_count(), 0);
}

#[test]
fn test_error_limit() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 2,
        filter_follow_on: true,
        deduplicate: true,
    });
    assert!(queue.add(constant_expected(Span::new(0, 1))));
    assert!(queue.add(constant_expected(Span::new(2, 3))));
    assert!(queue.limit_reached());
    assert!(!queue.add(constant_expected(Span::new(4, 5))));
    assert!(queue.has_errors());
}

#[test]
fn test_extend_applies_filters() {
    let mut queue = DiagnosticQueue::new();
    queue.extend([
        constant_expected(Span::new(0, 1)),
        constant_expected(Span::new(0, 1)),
        cannot_convert(Span::new(3, 4), "?", "int"),
    ]);
    assert_eq!(queue.flush().len(), 1);
}
