//! Checks on the content of individual columns.

use super::BlockContext;
use crate::block::{Column, Row};
use crate::grammar::{
    is_universal_upos, is_valid_deprel, is_valid_edeprel, is_valid_feature_value, parse_deps,
    parse_head, split_feature, universal_relation, NodeId, EMPTY_FIELD, UNIVERSAL_DEPRELS,
};
use crate::incident::{Incident, TestClass};
use crate::tags::TagCategory;
use std::collections::HashSet;

pub(super) const UNKNOWN_UPOS: &str = "unknown-upos";
pub(super) const INVALID_FEATURE: &str = "invalid-feature";
pub(super) const INVALID_FEATURE_VALUE: &str = "invalid-feature-value";
pub(super) const INVALID_DEPREL: &str = "invalid-deprel";
pub(super) const INVALID_EDEPREL: &str = "invalid-edeprel";

/// Columns in which no whitespace at all is allowed.
const NO_SPACE_COLUMNS: [Column; 5] = [
    Column::Id,
    Column::Head,
    Column::Deprel,
    Column::Feats,
    Column::Deps,
];

/// Columns a multiword token leaves empty.
const SPAN_EMPTY_COLUMNS: [Column; 7] = [
    Column::Lemma,
    Column::Upos,
    Column::Xpos,
    Column::Feats,
    Column::Head,
    Column::Deprel,
    Column::Deps,
];

fn is_node(row: &Row) -> bool {
    matches!(row.id(), NodeId::Word(_) | NodeId::Empty { .. })
}

/// Whether the field holds something other than `_`.
fn has_value(value: &str) -> bool {
    !value.is_empty() && value != EMPTY_FIELD
}

fn located(row: &Row, incident: Incident) -> Incident {
    incident.at_line(row.line()).at_node(row.id())
}

/// Emptiness and whitespace of every column present in the row.
pub(super) fn check_whitespace(ctx: &mut BlockContext<'_>, row: &Row) {
    for (column, value) in Column::ALL.iter().zip(row.fields()) {
        let name = column.name();
        if value.is_empty() {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Format,
                    "empty-column",
                    format!("Empty value in column {name}."),
                ),
            ));
            continue;
        }
        if value.starts_with(char::is_whitespace) {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Format,
                    "leading-whitespace",
                    format!("Leading whitespace not allowed in column {name}: '{value}'."),
                ),
            ));
        }
        if value.ends_with(char::is_whitespace) {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Format,
                    "trailing-whitespace",
                    format!("Trailing whitespace not allowed in column {name}: '{value}'."),
                ),
            ));
        }
        if NO_SPACE_COLUMNS.contains(column) && value.trim().contains(char::is_whitespace) {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Format,
                    "invalid-whitespace",
                    format!("White space not allowed in column {name}: '{value}'."),
                ),
            ));
        }
    }
}

/// Multiword tokens carry only FORM and MISC; empty nodes have no basic
/// dependency.
pub(super) fn check_placeholders(ctx: &mut BlockContext<'_>, row: &Row) {
    match row.id() {
        NodeId::Span { .. } => {
            for column in SPAN_EMPTY_COLUMNS {
                let value = row.field(column);
                if !has_value(value) || (column == Column::Feats && value == "Typo=Yes") {
                    continue;
                }
                ctx.emit(located(
                    row,
                    Incident::error(
                        TestClass::Format,
                        "mwt-nonempty-field",
                        format!(
                            "A multi-word token line must have '_' in the column {}. Now: '{value}'.",
                            column.name()
                        ),
                    ),
                ));
            }
        }
        NodeId::Empty { .. } => {
            for column in [Column::Head, Column::Deprel] {
                let value = row.field(column);
                if has_value(value) {
                    ctx.emit(located(
                        row,
                        Incident::error(
                            TestClass::Format,
                            "empty-node-nonempty-field",
                            format!(
                                "An empty node must have '_' in the column {}. Now: '{value}'.",
                                column.name()
                            ),
                        ),
                    ));
                }
            }
        }
        NodeId::Word(_) | NodeId::Malformed => {}
    }
}

/// UPOS must be a universal tag; empty nodes may leave it empty.
pub(super) fn check_upos(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    let upos = row.field(Column::Upos);
    if upos.is_empty() || (upos == EMPTY_FIELD && !row.id().is_word()) {
        return;
    }
    if !is_universal_upos(upos) {
        ctx.emit(located(
            row,
            Incident::error(
                TestClass::Morpho,
                UNKNOWN_UPOS,
                format!("Unknown UPOS tag: '{upos}'."),
            ),
        ));
    }
}

/// FEATS syntax: well-formed pairs, names sorted and unique, values sorted
/// and unique.
pub(super) fn check_features(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    let feats = row.field(Column::Feats);
    if !has_value(feats) {
        return;
    }
    let mut names: Vec<&str> = Vec::new();
    for pair in feats.split('|') {
        let Some((name, values)) = split_feature(pair) else {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Morpho,
                    INVALID_FEATURE,
                    format!("Spurious morphological feature: '{pair}'. Should be of the form Feature=Value and must start with [A-Z]."),
                ),
            ));
            continue;
        };
        if names.contains(&name) {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Morpho,
                    "repeated-feature",
                    format!("Repeated feature '{name}'."),
                ),
            ));
        }
        names.push(name);
        for value in &values {
            if !is_valid_feature_value(value) {
                ctx.emit(located(
                    row,
                    Incident::error(
                        TestClass::Morpho,
                        INVALID_FEATURE_VALUE,
                        format!("Spurious value '{value}' in '{pair}'. Must start with [A-Z0-9] and only contain [A-Za-z0-9]."),
                    ),
                ));
            }
        }
        let mut sorted = values.clone();
        sorted.sort_unstable_by_key(|value| value.to_lowercase());
        sorted.dedup();
        if sorted != values {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Morpho,
                    "unsorted-feature-values",
                    format!("If a feature has multiple values, these must be sorted and unique: '{pair}'."),
                ),
            ));
        }
    }
    let mut sorted = names.clone();
    sorted.sort_by_key(|name| name.to_lowercase());
    if sorted != names {
        ctx.emit(located(
            row,
            Incident::error(
                TestClass::Morpho,
                "unsorted-features",
                format!("Morphological features must be sorted: '{feats}'."),
            ),
        ));
    }
}

/// DEPREL must be a universal relation with at most one lowercase subtype.
pub(super) fn check_deprel(ctx: &mut BlockContext<'_>, row: &Row) {
    if !row.id().is_word() {
        return;
    }
    let deprel = row.field(Column::Deprel);
    if deprel.is_empty() || is_valid_deprel(deprel) {
        return;
    }
    ctx.emit(located(
        row,
        Incident::error(
            TestClass::Syntax,
            INVALID_DEPREL,
            format!("Invalid DEPREL value '{deprel}'."),
        ),
    ));
}

/// HEAD is 0 exactly when DEPREL is `root`.
pub(super) fn check_root_deprel(ctx: &mut BlockContext<'_>, row: &Row) {
    if !row.id().is_word() {
        return;
    }
    let Some(head) = parse_head(row.field(Column::Head)) else {
        return;
    };
    let is_root = universal_relation(row.field(Column::Deprel)) == "root";
    if head == 0 && !is_root {
        ctx.emit(located(
            row,
            Incident::error(
                TestClass::Syntax,
                "0-is-not-root",
                "DEPREL must be 'root' if HEAD is 0.",
            ),
        ));
    } else if head != 0 && is_root {
        ctx.emit(located(
            row,
            Incident::error(
                TestClass::Syntax,
                "root-is-not-0",
                "DEPREL cannot be 'root' if HEAD is not 0.",
            ),
        ));
    }
}

/// Enhanced relation labels must be well formed.
pub(super) fn check_edeprels(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    for edge in parse_deps(row.field(Column::Deps)).into_iter().flatten() {
        if !is_valid_edeprel(&edge.relation) {
            ctx.emit(located(
                row,
                Incident::error(
                    TestClass::Enhanced,
                    INVALID_EDEPREL,
                    format!("Invalid enhanced relation type: '{}'.", edge.relation),
                ),
            ));
        }
    }
}

/// Asks the tag database about `value` and reports it when not permitted.
fn lookup(
    ctx: &mut BlockContext<'_>,
    row: &Row,
    category: TagCategory,
    lang: &str,
    value: &str,
    incident: impl FnOnce() -> Incident,
) {
    let tags = ctx.tags;
    if tags.is_permitted(category, lang, value) {
        return;
    }
    let explanation = tags.explain(category, lang);
    ctx.emit(located(row, incident().explained(explanation)));
}

/// A universal UPOS tag must also be in use by the language.
pub(super) fn check_upos_values(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    let upos = row.field(Column::Upos);
    if !has_value(upos) {
        return;
    }
    let lang = ctx.lang(row);
    lookup(ctx, row, TagCategory::Upos, &lang, upos, || {
        Incident::error(
            TestClass::Morpho,
            "unknown-lang-upos",
            format!("UPOS tag '{upos}' is not used in language [{lang}]."),
        )
    });
}

/// XPOS must be declared for the language.
pub(super) fn check_xpos_values(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    let xpos = row.field(Column::Xpos);
    if !has_value(xpos) {
        return;
    }
    let lang = ctx.lang(row);
    lookup(ctx, row, TagCategory::Xpos, &lang, xpos, || {
        Incident::error(
            TestClass::Morpho,
            "unknown-xpos",
            format!("Unknown XPOS tag '{xpos}' for language [{lang}]."),
        )
    });
}

/// Every `Name=Value` pair must be declared for the language.
pub(super) fn check_feature_values(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    let feats = row.field(Column::Feats);
    if !has_value(feats) {
        return;
    }
    let lang = ctx.lang(row);
    for (name, values) in feats.split('|').filter_map(split_feature) {
        for value in values {
            let pair = format!("{name}={value}");
            lookup(ctx, row, TagCategory::Feature, &lang, &pair, || {
                Incident::error(
                    TestClass::Morpho,
                    "unknown-feature",
                    format!("Feature {pair} is not permitted in language [{lang}]."),
                )
            });
        }
    }
}

/// Relation subtypes must be declared for the language; plain universal
/// relations always pass.
pub(super) fn check_deprel_values(ctx: &mut BlockContext<'_>, row: &Row) {
    if !row.id().is_word() {
        return;
    }
    let deprel = row.field(Column::Deprel);
    if deprel.is_empty() || UNIVERSAL_DEPRELS.contains(&deprel) {
        return;
    }
    let lang = ctx.lang(row);
    lookup(ctx, row, TagCategory::Deprel, &lang, deprel, || {
        Incident::error(
            TestClass::Syntax,
            "unknown-deprel",
            format!("Unknown DEPREL label: '{deprel}' for language [{lang}]."),
        )
    });
}

/// Enhanced relation subtypes must be declared for the language.
pub(super) fn check_edeprel_values(ctx: &mut BlockContext<'_>, row: &Row) {
    if !is_node(row) {
        return;
    }
    let lang = ctx.lang(row);
    let mut seen = HashSet::new();
    for edge in parse_deps(row.field(Column::Deps)).into_iter().flatten() {
        let relation = edge.relation;
        if relation == "ref"
            || UNIVERSAL_DEPRELS.contains(&relation.as_str())
            || !is_valid_edeprel(&relation)
            || !seen.insert(relation.clone())
        {
            continue;
        }
        lookup(ctx, row, TagCategory::EnhancedDeprel, &lang, &relation, || {
            Incident::error(
                TestClass::Enhanced,
                "unknown-edeprel",
                format!("Unknown enhanced relation type '{relation}' for language [{lang}]."),
            )
        });
    }
}

/// Words tagged AUX must have a lemma declared as auxiliary.
pub(super) fn check_auxiliary(ctx: &mut BlockContext<'_>, row: &Row) {
    if !row.id().is_word() || row.field(Column::Upos) != "AUX" {
        return;
    }
    let lemma = row.field(Column::Lemma);
    if !has_value(lemma) {
        return;
    }
    let lang = ctx.lang(row);
    lookup(ctx, row, TagCategory::Auxiliary, &lang, lemma, || {
        Incident::error(
            TestClass::Morpho,
            "aux-lemma",
            format!("'{lemma}' is not an auxiliary verb in language [{lang}]."),
        )
    });
}

/// Words attached as `cop` must have a lemma declared as copula.
pub(super) fn check_copula(ctx: &mut BlockContext<'_>, row: &Row) {
    if !row.id().is_word() || universal_relation(row.field(Column::Deprel)) != "cop" {
        return;
    }
    let lemma = row.field(Column::Lemma);
    if !has_value(lemma) {
        return;
    }
    let lang = ctx.lang(row);
    lookup(ctx, row, TagCategory::Copula, &lang, lemma, || {
        Incident::error(
            TestClass::Syntax,
            "cop-lemma",
            format!("'{lemma}' is not a copula in language [{lang}]."),
        )
    });
}

/// FORM and LEMMA may contain a space only when the language declares them.
pub(super) fn check_words_with_spaces(ctx: &mut BlockContext<'_>, row: &Row) {
    let lang = ctx.lang(row);
    for column in [Column::Form, Column::Lemma] {
        let value = row.field(column);
        if !value.trim().contains(' ') {
            continue;
        }
        lookup(ctx, row, TagCategory::TokenWithSpace, &lang, value, || {
            Incident::error(
                TestClass::Format,
                "invalid-word-with-space",
                format!(
                    "'{value}' in column {} is not on the list of exceptions allowed to contain whitespace for language [{lang}].",
                    column.name()
                ),
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ValidationConfig;
    use crate::incident::NullReporter;
    use crate::tags::{TagCategory, TagTable};
    use crate::validate::Validator;
    use pretty_assertions::assert_eq;

    /// One-word sentence with the given tab-separated columns after ID.
    fn single(columns: &str) -> String {
        let form = columns.split('\t').next().unwrap_or("_");
        format!("# sent_id = f\n# text = {form}\n1\t{columns}\n\n")
    }

    fn ids_with(text: &str, validator: &Validator<impl crate::tags::TagDatabase>) -> Vec<String> {
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "t", text, &mut NullReporter);
        run.aggregator
            .incidents()
            .iter()
            .map(|i| i.test_id.clone())
            .collect()
    }

    fn ids(text: &str) -> Vec<String> {
        ids_with(text, &Validator::new(ValidationConfig::default()))
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(
            ids(&single("a\ta \tX\t_\t_\t0\troot\t_\t_")),
            vec!["trailing-whitespace"]
        );
        assert_eq!(
            ids(&single("a\ta\tX\t_\tCase=Nom Gen\t0\troot\t_\t_")),
            vec!["invalid-whitespace", "invalid-feature-value"]
        );
        assert_eq!(ids(&single("a\ta\tX\t\t_\t0\troot\t_\t_")), vec!["empty-column"]);
    }

    #[test]
    fn test_span_fields() {
        let text = "# sent_id = m\n# text = ab\n\
            1-2\tab\t_\t_\t_\tTypo=Yes\t_\t_\t_\t_\n\
            1\ta\ta\tX\t_\t_\t0\troot\t_\tSpaceAfter=No\n\
            2\tb\tb\tX\t_\t_\t1\tdep\t_\t_\n\n";
        assert!(ids(text).is_empty());
        let bad = text.replace("1-2\tab\t_\t_", "1-2\tab\tab\tX");
        assert_eq!(ids(&bad), vec!["mwt-nonempty-field", "mwt-nonempty-field"]);
    }

    #[test]
    fn test_features() {
        assert!(ids(&single("a\ta\tX\t_\tCase=Nom|Number=Plur,Sing\t0\troot\t_\t_")).is_empty());
        assert_eq!(
            ids(&single("a\ta\tX\t_\tNumber=Sing|Case=Nom\t0\troot\t_\t_")),
            vec!["unsorted-features"]
        );
        assert_eq!(
            ids(&single("a\ta\tX\t_\tCase=Nom|Case=Gen\t0\troot\t_\t_")),
            vec!["repeated-feature"]
        );
        assert_eq!(
            ids(&single("a\ta\tX\t_\tNumber=Sing,Plur\t0\troot\t_\t_")),
            vec!["unsorted-feature-values"]
        );
        assert_eq!(
            ids(&single("a\ta\tX\t_\tcase=Nom\t0\troot\t_\t_")),
            vec!["invalid-feature"]
        );
    }

    #[test]
    fn test_upos_and_deprel() {
        assert_eq!(
            ids(&single("a\ta\tNOUNS\t_\t_\t0\troot\t_\t_")),
            vec!["unknown-upos"]
        );
        assert_eq!(
            ids(&single("a\ta\tX\t_\t_\t0\tRoot\t_\t_")),
            vec!["invalid-deprel", "0-is-not-root"]
        );
    }

    #[test]
    fn test_language_specific_values() {
        let tags = TagTable::new()
            .allow(TagCategory::Upos, "en", ["AUX"])
            .allow(TagCategory::Auxiliary, "en", ["be"])
            .allow(TagCategory::Feature, "en", ["Mood=Ind"])
            .allow(TagCategory::Xpos, "en", ["VBZ"]);
        let validator = Validator::with_tags(ValidationConfig::default().with_lang("en"), tags);
        assert!(ids_with(&single("is\tbe\tAUX\tVBZ\tMood=Ind\t0\troot\t_\t_"), &validator).is_empty());
        assert_eq!(
            ids_with(&single("has\thave\tAUX\tVBZ\tMood=Sub\t0\troot\t_\t_"), &validator),
            vec!["unknown-feature", "aux-lemma"]
        );
        assert_eq!(
            ids_with(
                &single("ist\tsein\tAUX\tVAFIN\t_\t0\troot\t_\tLang=de"),
                &validator
            ),
            vec!["unknown-lang-upos", "unknown-xpos", "aux-lemma"]
        );
    }

    #[test]
    fn test_upos_in_use_by_language() {
        let tags = TagTable::new().allow(TagCategory::Upos, "en", ["NOUN", "PUNCT"]);
        let validator = Validator::with_tags(ValidationConfig::default().with_lang("en"), tags);
        assert!(ids_with(&single("dog	dog	NOUN	_	_	0	root	_	_"), &validator).is_empty());
        assert_eq!(
            ids_with(&single("ran	run	VERB	_	_	0	root	_	_"), &validator),
            vec!["unknown-lang-upos"]
        );
        assert_eq!(
            ids_with(&single("dog	dog	NOUNS	_	_	0	root	_	_"), &validator),
            vec!["unknown-upos"]
        );
    }

    #[test]
    fn test_explanation_attached_once() {
        let tags = TagTable::new()
            .allow(TagCategory::Upos, "en", ["VERB", "ADJ"])
            .allow(TagCategory::Copula, "en", ["be"]);
        let validator = Validator::with_tags(ValidationConfig::default().with_lang("en"), tags);
        let text = "# sent_id = c\n# text = x y\n\
            1\tx\tseem\tVERB\t_\t_\t2\tcop\t_\t_\n\
            2\ty\ty\tADJ\t_\t_\t0\troot\t_\t_\n\n";
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "t", text, &mut NullReporter);
        let incidents = run.aggregator.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].test_id, "cop-lemma");
        assert_eq!(
            incidents[0].explanation.as_deref(),
            Some("The following copula values are permitted in language [en]: be")
        );
    }
}
