//! Block framing and word numbering.

use super::BlockContext;
use crate::block::{Column, IssueKind, Row, COLUMN_COUNT};
use crate::grammar::NodeId;
use crate::incident::{Incident, TestClass};

pub(super) const INVALID_WORD_ID: &str = "invalid-word-id";
pub(super) const WORD_ID_SEQUENCE: &str = "word-id-sequence";
pub(super) const MISPLACED_WORD_INTERVAL: &str = "misplaced-word-interval";
pub(super) const EMPTY_NODE_SEQUENCE: &str = "empty-node-sequence";
pub(super) const MISPLACED_EMPTY_NODE: &str = "misplaced-empty-node";
pub(super) const REVERSED_WORD_INTERVAL: &str = "reversed-word-interval";
pub(super) const WORD_INTERVAL_OUT: &str = "word-interval-out";
pub(super) const OVERLAPPING_WORD_INTERVALS: &str = "overlapping-word-intervals";

/// Turns the problems noticed by the reader into incidents.
pub(super) fn check_reader_issues(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    for issue in &block.issues {
        let (test_id, message) = match issue.kind {
            IssueKind::ExtraEmptyLine => (
                "extra-empty-line",
                "Spurious empty line. Only one empty line is expected after every sentence."
                    .to_string(),
            ),
            IssueKind::PseudoEmptyLine => (
                "pseudo-empty-line",
                "Spurious line that appears empty but is not; there are whitespace characters."
                    .to_string(),
            ),
            IssueKind::MisplacedComment => (
                "misplaced-comment",
                "Spurious comment line. Comments are only allowed before a sentence.".to_string(),
            ),
            IssueKind::ColumnCount(found) => (
                "number-of-columns",
                format!("The line has {found} columns but {COLUMN_COUNT} are expected."),
            ),
            IssueKind::NonLfNewline => (
                "non-lf-newline",
                "Line terminated by CR LF; only LF line breaks are allowed.".to_string(),
            ),
            IssueKind::MissingFinalNewline => (
                "missing-final-newline",
                "The last line of the file is not terminated by a line break.".to_string(),
            ),
            IssueKind::InvalidUnicode => (
                "invalid-unicode",
                "The line is not valid UTF-8.".to_string(),
            ),
        };
        ctx.emit(Incident::error(TestClass::Format, test_id, message).at_line(issue.line));
    }
    if block.rows.is_empty() && !block.comments.is_empty() {
        ctx.emit(Incident::error(
            TestClass::Format,
            "missing-sentence",
            "Comment lines are not followed by any sentence.",
        ));
    }
}

/// The last sentence of a file must be followed by an empty line.
pub(super) fn check_termination(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    let Some(last) = block.rows.last() else {
        return;
    };
    if !block.terminated {
        ctx.emit(
            Incident::error(
                TestClass::Format,
                "missing-empty-line",
                "Missing empty line after the last sentence.",
            )
            .at_line(last.line()),
        );
    }
}

/// Reports a malformed ID once per row.
pub(super) fn check_id_format(ctx: &mut BlockContext<'_>, row: &Row) {
    if row.id() == NodeId::Malformed {
        ctx.emit(
            Incident::error(
                TestClass::Format,
                INVALID_WORD_ID,
                format!("Unexpected ID format '{}'.", row.field(Column::Id)),
            )
            .at_line(row.line()),
        );
    }
}

/// A multiword span still waiting for its first word.
struct PendingSpan {
    lo: usize,
    line: usize,
}

/// Checks word numbering, interval placement and empty node numbering.
pub(super) fn check_sequence(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    let mut words: Vec<usize> = Vec::new();
    let mut spans: Vec<(usize, usize, usize)> = Vec::new();
    let mut current_word = 0;
    let mut next_empty = 1;
    let mut pending: Option<PendingSpan> = None;

    for row in &block.rows {
        match row.id() {
            NodeId::Word(n) => {
                words.push(n);
                current_word = n;
                next_empty = 1;
                if pending.as_ref().is_some_and(|span| n >= span.lo) {
                    pending = None;
                }
            }
            NodeId::Span { lo, hi } => {
                next_empty = 1;
                let expected = words.last().map_or(Some(1), |last| last.checked_add(1));
                if expected != Some(lo) {
                    let after = words.last().map_or_else(
                        || "at the start".to_string(),
                        |last| format!("after word {last}"),
                    );
                    ctx.emit(
                        Incident::error(
                            TestClass::Format,
                            MISPLACED_WORD_INTERVAL,
                            format!(
                                "Multiword token {lo}-{hi} must immediately precede word {lo}; found it {after}."
                            ),
                        )
                        .at_line(row.line())
                        .at_node(row.id()),
                    );
                }
                spans.push((lo, hi, row.line()));
                pending = Some(PendingSpan {
                    lo,
                    line: row.line(),
                });
            }
            NodeId::Empty { word, sub } => {
                if (word, sub) != (current_word, next_empty) {
                    ctx.emit(
                        Incident::error(
                            TestClass::Format,
                            EMPTY_NODE_SEQUENCE,
                            format!(
                                "Empty node {word}.{sub} found where {current_word}.{next_empty} was expected."
                            ),
                        )
                        .at_line(row.line())
                        .at_node(row.id()),
                    );
                }
                if let Some(span) = pending.as_ref().filter(|span| word < span.lo) {
                    ctx.emit(
                        Incident::error(
                            TestClass::Format,
                            MISPLACED_EMPTY_NODE,
                            format!(
                                "Empty node {word}.{sub} must precede the multiword token starting at word {} (line {}).",
                                span.lo, span.line
                            ),
                        )
                        .at_line(row.line())
                        .at_node(row.id()),
                    );
                }
                next_empty += 1;
            }
            NodeId::Malformed => next_empty = 1,
        }
    }

    let expected: Vec<usize> = (1..=words.len()).collect();
    if words != expected {
        ctx.emit(
            Incident::error(
                TestClass::Format,
                WORD_ID_SEQUENCE,
                format!(
                    "Words do not form a sequence. Got '{}'. Expected '{}'.",
                    join(&words),
                    join(&expected)
                ),
            )
            .at_line(block.rows.first().map_or(block.first_line, Row::line)),
        );
    }

    check_intervals(ctx, &spans, words.len());
}

/// Every interval must be increasing, inside the sentence and disjoint from
/// the ones before it.
fn check_intervals(
    ctx: &mut BlockContext<'_>,
    spans: &[(usize, usize, usize)],
    word_count: usize,
) {
    let mut covered_until = 0;
    for &(lo, hi, line) in spans {
        if hi <= lo {
            ctx.emit(
                Incident::error(
                    TestClass::Format,
                    REVERSED_WORD_INTERVAL,
                    format!("Multiword token interval {lo}-{hi} is empty or reversed."),
                )
                .at_line(line),
            );
            continue;
        }
        if hi > word_count {
            ctx.emit(
                Incident::error(
                    TestClass::Format,
                    WORD_INTERVAL_OUT,
                    format!(
                        "Multiword token interval {lo}-{hi} is out of range: the sentence has {word_count} words."
                    ),
                )
                .at_line(line),
            );
            continue;
        }
        if lo <= covered_until {
            ctx.emit(
                Incident::error(
                    TestClass::Format,
                    OVERLAPPING_WORD_INTERVALS,
                    format!(
                        "Multiword token interval {lo}-{hi} overlaps with a previous one ending at {covered_until}."
                    ),
                )
                .at_line(line),
            );
        }
        covered_until = covered_until.max(hi);
    }
}

fn join(ids: &[usize]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
