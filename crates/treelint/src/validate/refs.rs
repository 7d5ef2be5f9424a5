//! Resolution of HEAD and DEPS references.

use super::BlockContext;
use crate::block::Column;
use crate::grammar::{parse_deps, parse_head, Governor, NodeId, EMPTY_FIELD};
use crate::incident::{Incident, TestClass};
use std::collections::BTreeSet;

pub(super) const INVALID_HEAD: &str = "invalid-head";
pub(super) const UNKNOWN_HEAD: &str = "unknown-head";
pub(super) const INVALID_DEPS: &str = "invalid-deps";
pub(super) const UNKNOWN_EHEAD: &str = "unknown-ehead";

/// Every HEAD must name the root or an existing word, and every DEPS governor
/// the root or an existing word or empty node.
pub(super) fn check_references(ctx: &mut BlockContext<'_>) {
    let block = ctx.block;
    let nodes: BTreeSet<Governor> = block.rows.iter().filter_map(|row| row.id().node()).collect();
    let word_count = block.rows.iter().filter(|row| row.id().is_word()).count();

    for row in &block.rows {
        let id = row.id();
        if !matches!(id, NodeId::Word(_) | NodeId::Empty { .. }) {
            continue;
        }
        if id.is_word() {
            let head = row.field(Column::Head);
            match parse_head(head) {
                None => ctx.emit(
                    Incident::error(
                        TestClass::Format,
                        INVALID_HEAD,
                        format!("Invalid HEAD: '{head}'."),
                    )
                    .at_line(row.line())
                    .at_node(id),
                ),
                Some(head) if head > word_count => ctx.emit(
                    Incident::error(
                        TestClass::Format,
                        UNKNOWN_HEAD,
                        format!("Undefined HEAD (no such ID): '{head}'."),
                    )
                    .at_line(row.line())
                    .at_node(id),
                ),
                Some(_) => {}
            }
        }

        let deps = row.field(Column::Deps);
        if deps == EMPTY_FIELD {
            continue;
        }
        for entry in parse_deps(deps) {
            match entry {
                Err(malformed) => ctx.emit(
                    Incident::error(
                        TestClass::Enhanced,
                        INVALID_DEPS,
                        format!(
                            "Failed to parse DEPS entry '{}': expected 'head:relation'.",
                            malformed.entry
                        ),
                    )
                    .at_line(row.line())
                    .at_node(id),
                ),
                Ok(edge) if !edge.governor.is_root() && !nodes.contains(&edge.governor) => {
                    ctx.emit(
                        Incident::error(
                            TestClass::Enhanced,
                            UNKNOWN_EHEAD,
                            format!(
                                "Undefined enhanced head reference (no such ID): '{}'.",
                                edge.governor
                            ),
                        )
                        .at_line(row.line())
                        .at_node(id),
                    );
                }
                Ok(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ValidationConfig;
    use crate::incident::NullReporter;
    use crate::validate::Validator;

    fn reference_ids(rows: &[(&str, &str, &str)]) -> Vec<String> {
        let mut text = String::new();
        for (id, head, deps) in rows {
            let deprel = match *head {
                "0" => "root",
                "_" => "_",
                _ => "dep",
            };
            text.push_str(&format!("{id}\tw\tw\tX\t_\t_\t{head}\t{deprel}\t{deps}\t_\n"));
        }
        text.push('\n');
        let validator = Validator::new(ValidationConfig::default().with_level(1));
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "t", &text, &mut NullReporter);
        run.aggregator
            .incidents()
            .iter()
            .map(|i| i.test_id.clone())
            .collect()
    }

    #[test]
    fn test_resolved_references_pass() {
        assert!(reference_ids(&[("1", "0", "0:root"), ("2", "1", "1:dep")]).is_empty());
    }

    #[test]
    fn test_bad_heads() {
        assert_eq!(
            reference_ids(&[("1", "0", "_"), ("2", "x", "_"), ("3", "7", "_")]),
            vec!["invalid-head", "unknown-head"]
        );
    }

    #[test]
    fn test_bad_deps() {
        assert_eq!(
            reference_ids(&[("1", "0", "0:root|oops"), ("2", "1", "1.1:dep")]),
            vec!["invalid-deps", "unknown-ehead"]
        );
    }

    #[test]
    fn test_empty_node_is_a_valid_governor() {
        assert!(reference_ids(&[
            ("1", "0", "0:root"),
            ("1.1", "_", "1:dep"),
            ("2", "1", "1.1:dep"),
        ])
        .is_empty());
    }
}
