//! Sentence-level metadata carried in comments.

use super::BlockContext;
use crate::block::{Column, Row};
use crate::grammar::{classify_comment, has_no_space_after, Comment, NodeId};
use crate::incident::{Incident, TestClass};

pub(super) const MISSING_TEXT: &str = "missing-text";
pub(super) const MULTIPLE_TEXT: &str = "multiple-text";

/// Exactly one valid, corpus-unique `sent_id` and exactly one `text`.
pub(super) fn check_comments(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    let mut sent_ids = Vec::new();
    let mut texts = Vec::new();
    for comment in &block.comments {
        match classify_comment(&comment.text) {
            Comment::SentId(value) => sent_ids.push((comment, value)),
            Comment::Text(_) => texts.push(comment),
            Comment::Other => {}
        }
    }

    match sent_ids.as_slice() {
        [] => ctx.emit(Incident::error(
            TestClass::Metadata,
            "missing-sent-id",
            "Missing the sent_id attribute.",
        )),
        [(comment, None), ..] => ctx.emit(
            Incident::error(
                TestClass::Metadata,
                "invalid-sent-id",
                format!(
                    "Spurious sent_id line: '{}'. Should look like '# sent_id = xxx' with no whitespace in the id.",
                    comment.text
                ),
            )
            .at_line(comment.line),
        ),
        [(comment, Some(id)), ..] => {
            let file = ctx.file();
            if let Some(origin) = ctx.sentence_ids.register(id, file, comment.line) {
                ctx.emit(
                    Incident::error(
                        TestClass::Metadata,
                        "non-unique-sent-id",
                        format!(
                            "Non-unique sent_id attribute '{id}': first seen in {} on line {}.",
                            origin.file, origin.line
                        ),
                    )
                    .at_line(comment.line),
                );
            }
        }
    }
    if let Some((extra, _)) = sent_ids.get(1) {
        ctx.emit(
            Incident::error(
                TestClass::Metadata,
                "multiple-sent-id",
                "Multiple sent_id attributes.",
            )
            .at_line(extra.line),
        );
    }

    match texts.as_slice() {
        [] => ctx.emit(Incident::error(
            TestClass::Metadata,
            MISSING_TEXT,
            "Missing the text attribute.",
        )),
        [_] => {}
        [_, extra, ..] => ctx.emit(
            Incident::error(
                TestClass::Metadata,
                MULTIPLE_TEXT,
                "Multiple text attributes.",
            )
            .at_line(extra.line),
        ),
    }
}

/// The surface text rebuilt from FORM and `SpaceAfter=No`.
///
/// Multiword tokens contribute their own form and hide the words they
/// cover; empty nodes contribute nothing.
fn reconstruct(rows: &[Row]) -> String {
    let mut text = String::new();
    let mut covered_until = 0;
    for row in rows {
        match row.id() {
            NodeId::Span { hi, .. } => covered_until = hi,
            NodeId::Word(n) if n > covered_until => {}
            NodeId::Word(_) | NodeId::Empty { .. } | NodeId::Malformed => continue,
        }
        text.push_str(row.field(Column::Form));
        if !has_no_space_after(row.field(Column::Misc)) {
            text.push(' ');
        }
    }
    text
}

/// The `text` attribute must match the word forms.
pub(super) fn check_text(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    let Some((line, expected)) = block.comments.iter().find_map(|comment| {
        match classify_comment(&comment.text) {
            Comment::Text(text) => Some((comment.line, text)),
            _ => None,
        }
    }) else {
        return;
    };
    let rebuilt = reconstruct(&block.rows);
    let rebuilt = rebuilt.trim_end();
    if rebuilt == expected {
        return;
    }
    let offset = expected
        .chars()
        .zip(rebuilt.chars())
        .take_while(|(a, b)| a == b)
        .count();
    ctx.emit(
        Incident::error(
            TestClass::Metadata,
            "text-mismatch",
            format!(
                "Mismatch between the text attribute and the FORM field at character {}. Text: '{expected}'. Forms: '{rebuilt}'.",
                offset + 1
            ),
        )
        .at_line(line),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::incident::NullReporter;
    use crate::validate::Validator;

    fn ids(text: &str) -> Vec<String> {
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "t", text, &mut NullReporter);
        run.aggregator
            .incidents()
            .iter()
            .map(|i| i.test_id.clone())
            .collect()
    }

    const WORD: &str = "1\tHi\thi\tINTJ\t_\t_\t0\troot\t_\t_\n";

    #[test]
    fn test_reconstruct_with_spans_and_no_space() {
        let rows = vec![
            Row::parse(1, "1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_"),
            Row::parse(2, "1\tdo\tdo\tAUX\t_\t_\t0\troot\t_\t_"),
            Row::parse(3, "2\tn't\tnot\tPART\t_\t_\t1\tadvmod\t_\t_"),
            Row::parse(4, "2.1\tgo\tgo\tVERB\t_\t_\t_\t_\t_\t_"),
            Row::parse(5, "3\tnow\tnow\tADV\t_\t_\t1\tadvmod\t_\tSpaceAfter=No"),
            Row::parse(6, "4\t!\t!\tPUNCT\t_\t_\t1\tpunct\t_\t_"),
        ];
        assert_eq!(reconstruct(&rows), "don't now! ");
    }

    #[test]
    fn test_metadata_presence() {
        assert_eq!(ids(&format!("# text = Hi\n{WORD}\n")), vec!["missing-sent-id"]);
        assert_eq!(ids(&format!("# sent_id = a\n{WORD}\n")), vec!["missing-text"]);
        assert_eq!(
            ids(&format!("# sent_id = a\n# sent_id = b\n# text = Hi\n{WORD}\n")),
            vec!["multiple-sent-id"]
        );
        assert_eq!(
            ids(&format!("# sent_id = a b\n# text = Hi\n{WORD}\n")),
            vec!["invalid-sent-id"]
        );
    }

    #[test]
    fn test_duplicate_sent_id_names_first_occurrence() {
        let one = format!("# sent_id = a\n# text = Hi\n{WORD}\n");
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "first.conllu", &one, &mut NullReporter);
        validator.validate_str(&mut run, "second.conllu", &one, &mut NullReporter);
        let incidents = run.aggregator.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].test_id, "non-unique-sent-id");
        assert_eq!(incidents[0].file, "second.conllu");
        assert!(incidents[0].message.contains("first.conllu on line 1"));
    }

    #[test]
    fn test_text_mismatch_reports_offset() {
        let ids = ids(&format!("# sent_id = a\n# text = Ho\n{WORD}\n"));
        assert_eq!(ids, vec!["text-mismatch"]);
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        validator.validate_str(
            &mut run,
            "t",
            &format!("# sent_id = a\n# text = Ho\n{WORD}\n"),
            &mut NullReporter,
        );
        let incidents = run.aggregator.incidents();
        assert!(incidents[0].message.contains("at character 2"));
        assert_eq!(incidents[0].line, 2);
    }
}
