//! Lexical grammar of the treebank format.
//!
//! This module holds the precompiled, immutable patterns used to recognise the
//! content of individual fields: IDs, heads, enhanced dependencies, features,
//! relation labels and the metadata comments that precede a sentence. Nothing
//! here carries state, so the patterns are shared freely between validators
//! running on different files.

use regex::Regex;
use std::sync::LazyLock;

pub mod id;

pub use id::{Governor, NodeId};

/// The seventeen universal part-of-speech tags.
pub const UNIVERSAL_UPOS: &[&str] = &[
    "ADJ", "ADP", "ADV", "AUX", "CCONJ", "DET", "INTJ", "NOUN", "NUM", "PART", "PRON", "PROPN",
    "PUNCT", "SCONJ", "SYM", "VERB", "X",
];

/// The universal dependency relations, without language-specific subtypes.
pub const UNIVERSAL_DEPRELS: &[&str] = &[
    "acl",
    "advcl",
    "advmod",
    "amod",
    "appos",
    "aux",
    "case",
    "cc",
    "ccomp",
    "clf",
    "compound",
    "conj",
    "cop",
    "csubj",
    "dep",
    "det",
    "discourse",
    "dislocated",
    "expl",
    "fixed",
    "flat",
    "goeswith",
    "iobj",
    "list",
    "mark",
    "nmod",
    "nsubj",
    "nummod",
    "obj",
    "obl",
    "orphan",
    "parataxis",
    "punct",
    "reparandum",
    "root",
    "vocative",
    "xcomp",
];

/// The placeholder used for an empty or inapplicable field.
pub const EMPTY_FIELD: &str = "_";

static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:0|[1-9][0-9]*)$").expect("valid head pattern"));

static GOVERNOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|[1-9][0-9]*)(?:\.([1-9][0-9]*))?$").expect("valid governor pattern")
});

static DEPREL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+(?::[a-z]+)?$").expect("valid deprel pattern"));

static EDEPREL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z]+(?::[a-z]+)?(?::[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?:_[\p{Ll}\p{Lm}\p{Lo}\p{M}]+)*)?(?::[a-z]+)?$",
    )
    .expect("valid enhanced deprel pattern")
});

static FEATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Za-z0-9]*(?:\[[a-z0-9]+\])?)=(.+)$").expect("valid feature pattern")
});

static FEATURE_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Za-z0-9]*$").expect("valid feature value pattern"));

static SENT_ID_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*sent_id\b").expect("valid sent_id line pattern"));

static SENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*sent_id\s*=\s*(\S+)$").expect("valid sent_id pattern"));

static TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*text\s*=\s*(.*)$").expect("valid text pattern"));

/// Parses a basic HEAD field: `0` or a positive word index.
#[must_use]
pub fn parse_head(head: &str) -> Option<usize> {
    if HEAD_RE.is_match(head) {
        head.parse().ok()
    } else {
        None
    }
}

/// Parses the governor half of an enhanced dependency (`0`, `4` or `4.1`).
#[must_use]
pub fn parse_governor(governor: &str) -> Option<Governor> {
    let caps = GOVERNOR_RE.captures(governor)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some(Governor { major, minor })
}

/// One well-formed `governor:relation` entry of the DEPS column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepsEdge {
    /// The node the edge comes from.
    pub governor: Governor,
    /// The enhanced relation label.
    pub relation: String,
}

/// A DEPS entry that could not be split into a governor and a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDeps {
    /// The raw entry text.
    pub entry: String,
}

/// Splits a DEPS field into its entries.
///
/// The placeholder `_` yields no entries. Each entry is parsed on its own, so a
/// single malformed pair does not hide the well-formed ones next to it.
#[must_use]
pub fn parse_deps(deps: &str) -> Vec<Result<DepsEdge, MalformedDeps>> {
    if deps == EMPTY_FIELD {
        return Vec::new();
    }
    deps.split('|')
        .map(|entry| {
            let malformed = || MalformedDeps {
                entry: entry.to_string(),
            };
            let (governor, relation) = entry.split_once(':').ok_or_else(malformed)?;
            if relation.is_empty() {
                return Err(malformed());
            }
            let governor = parse_governor(governor).ok_or_else(malformed)?;
            Ok(DepsEdge {
                governor,
                relation: relation.to_string(),
            })
        })
        .collect()
}

/// Returns the universal part of a relation label (`nsubj` for `nsubj:pass`).
#[must_use]
pub fn universal_relation(deprel: &str) -> &str {
    deprel.split(':').next().unwrap_or(deprel)
}

/// Whether `deprel` is a syntactically valid basic relation built on a
/// universal relation.
#[must_use]
pub fn is_valid_deprel(deprel: &str) -> bool {
    DEPREL_RE.is_match(deprel) && UNIVERSAL_DEPRELS.contains(&universal_relation(deprel))
}

/// Whether `relation` is a syntactically valid enhanced relation.
///
/// Enhanced labels may carry a lexical subtype in any script (`obl:在`,
/// `nmod:poss`, `conj:and_or`). `ref` is always accepted.
#[must_use]
pub fn is_valid_edeprel(relation: &str) -> bool {
    if relation == "ref" {
        return true;
    }
    EDEPREL_RE.is_match(relation) && UNIVERSAL_DEPRELS.contains(&universal_relation(relation))
}

/// Whether `tag` is one of the universal part-of-speech tags.
#[must_use]
pub fn is_universal_upos(tag: &str) -> bool {
    UNIVERSAL_UPOS.contains(&tag)
}

/// Splits one `Name=Value,Value` feature into its name and values.
///
/// Returns `None` when the name or the shape of the pair is invalid; the
/// individual values are checked with [`is_valid_feature_value`].
#[must_use]
pub fn split_feature(pair: &str) -> Option<(&str, Vec<&str>)> {
    let caps = FEATURE_RE.captures(pair)?;
    let name = caps.get(1)?.as_str();
    let values = caps.get(2)?.as_str().split(',').collect();
    Some((name, values))
}

/// Whether `value` is a well-formed feature value.
#[must_use]
pub fn is_valid_feature_value(value: &str) -> bool {
    FEATURE_VALUE_RE.is_match(value)
}

/// The metadata carried by a single comment line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comment<'a> {
    /// A `sent_id` attribute; `None` when the value is missing or malformed.
    SentId(Option<&'a str>),
    /// A `text` attribute with its (trimmed) value.
    Text(&'a str),
    /// Any other comment.
    Other,
}

/// Recognises the metadata attributes of a comment line.
#[must_use]
pub fn classify_comment(line: &str) -> Comment<'_> {
    if SENT_ID_LINE_RE.is_match(line) {
        let value = SENT_ID_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        return Comment::SentId(value);
    }
    if let Some(caps) = TEXT_RE.captures(line) {
        let value = caps.get(1).map_or("", |m| m.as_str().trim());
        return Comment::Text(value);
    }
    Comment::Other
}

/// Iterates the `Name=Value` attributes of a MISC field.
pub fn misc_attributes(misc: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    misc.split('|')
        .filter(|attr| !attr.is_empty() && *attr != EMPTY_FIELD)
        .map(|attr| match attr.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (attr, None),
        })
}

/// Whether MISC marks the token as not followed by a space.
#[must_use]
pub fn has_no_space_after(misc: &str) -> bool {
    misc_attributes(misc).any(|(name, value)| name == "SpaceAfter" && value == Some("No"))
}

/// The alternate language declared for a row through `Lang=xx` in MISC.
#[must_use]
pub fn language_marker(misc: &str) -> Option<&str> {
    misc_attributes(misc)
        .find(|(name, _)| *name == "Lang")
        .and_then(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_head() {
        assert_eq!(parse_head("0"), Some(0));
        assert_eq!(parse_head("12"), Some(12));
        assert_eq!(parse_head("012"), None);
        assert_eq!(parse_head("_"), None);
        assert_eq!(parse_head("1.1"), None);
    }

    #[test]
    fn test_parse_deps_keeps_good_entries_next_to_bad_ones() {
        let parsed = parse_deps("2:nsubj|oops|3.1:obj|4:");
        assert_eq!(parsed.len(), 4);
        assert_eq!(
            parsed[0],
            Ok(DepsEdge {
                governor: Governor { major: 2, minor: 0 },
                relation: "nsubj".to_string(),
            })
        );
        assert!(parsed[1].is_err());
        assert_eq!(
            parsed[2].as_ref().map(|e| e.governor),
            Ok(Governor { major: 3, minor: 1 })
        );
        assert!(parsed[3].is_err());
        assert!(parse_deps("_").is_empty());
    }

    #[test]
    fn test_governor_order_is_numeric() {
        let small = parse_governor("1.9").unwrap();
        let large = parse_governor("1.10").unwrap();
        assert!(small < large);
        assert_ne!(parse_governor("1.1"), parse_governor("1.10"));
    }

    #[test]
    fn test_relations() {
        assert!(is_valid_deprel("nsubj:pass"));
        assert!(!is_valid_deprel("nsubj:pass:extra"));
        assert!(!is_valid_deprel("subject"));
        assert!(is_valid_edeprel("obl:在"));
        assert!(is_valid_edeprel("conj:and_or"));
        assert!(is_valid_edeprel("ref"));
        assert!(!is_valid_edeprel("Obl:x"));
    }

    #[test]
    fn test_classify_comment() {
        assert_eq!(
            classify_comment("# sent_id = s1"),
            Comment::SentId(Some("s1"))
        );
        assert_eq!(classify_comment("# sent_id = a b"), Comment::SentId(None));
        assert_eq!(
            classify_comment("# text = Hello world. "),
            Comment::Text("Hello world.")
        );
        assert_eq!(classify_comment("# newdoc"), Comment::Other);
    }

    #[test]
    fn test_misc() {
        assert!(has_no_space_after("SpaceAfter=No"));
        assert!(has_no_space_after("Gloss=x|SpaceAfter=No"));
        assert!(!has_no_space_after("_"));
        assert_eq!(language_marker("Lang=de|SpaceAfter=No"), Some("de"));
        assert_eq!(language_marker("_"), None);
    }

    #[test]
    fn test_split_feature() {
        assert_eq!(
            split_feature("PronType=Int,Rel"),
            Some(("PronType", vec!["Int", "Rel"]))
        );
        assert_eq!(
            split_feature("Number[psor]=Sing"),
            Some(("Number[psor]", vec!["Sing"]))
        );
        assert_eq!(split_feature("number=Sing"), None);
        assert!(!is_valid_feature_value("sing"));
    }
}
