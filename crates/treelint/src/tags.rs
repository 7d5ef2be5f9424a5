//! Language-specific permitted values.
//!
//! The validator never loads tag tables itself. It asks a [`TagDatabase`]
//! whether a value is permitted for a category in a given language, and how to
//! explain the answer to the user. [`PermissiveTags`] accepts everything and is
//! what a run without language data uses; [`TagTable`] is an in-memory table
//! filled by the caller.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The kinds of language-specific values the validator looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagCategory {
    /// Universal part-of-speech tags in use by the language.
    Upos,
    /// Language-specific part-of-speech tags.
    Xpos,
    /// `Name=Value` feature pairs.
    Feature,
    /// Basic relations including subtypes.
    Deprel,
    /// Enhanced relations including subtypes.
    EnhancedDeprel,
    /// Lemmas allowed as auxiliaries.
    Auxiliary,
    /// Lemmas allowed as copulas.
    Copula,
    /// Word forms and lemmas that may contain a space.
    TokenWithSpace,
}

impl TagCategory {
    /// A human readable name of the category.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TagCategory::Upos => "UPOS tag",
            TagCategory::Xpos => "XPOS tag",
            TagCategory::Feature => "feature",
            TagCategory::Deprel => "relation",
            TagCategory::EnhancedDeprel => "enhanced relation",
            TagCategory::Auxiliary => "auxiliary",
            TagCategory::Copula => "copula",
            TagCategory::TokenWithSpace => "word with space",
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A queryable source of language-specific permitted values.
pub trait TagDatabase {
    /// Whether `value` is permitted in `category` for language `lang`.
    fn is_permitted(&self, category: TagCategory, lang: &str, value: &str) -> bool;

    /// Explains what `category` permits for `lang`, shown once per run next to
    /// the first incident that cites it.
    fn explain(&self, category: TagCategory, lang: &str) -> String;
}

/// A database that permits every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveTags;

impl TagDatabase for PermissiveTags {
    fn is_permitted(&self, _category: TagCategory, _lang: &str, _value: &str) -> bool {
        true
    }

    fn explain(&self, _category: TagCategory, _lang: &str) -> String {
        String::new()
    }
}

/// An in-memory table of permitted values keyed by category and language.
///
/// Categories with no entry for a language permit nothing, which is how a
/// missing language declaration surfaces to the user.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    values: HashMap<(TagCategory, String), BTreeSet<String>>,
}

impl TagTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits `values` in `category` for `lang`.
    #[must_use]
    pub fn allow<I, S>(mut self, category: TagCategory, lang: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .entry((category, lang.to_string()))
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// The permitted values of `category` for `lang`, if any were declared.
    #[must_use]
    pub fn permitted(&self, category: TagCategory, lang: &str) -> Option<&BTreeSet<String>> {
        self.values.get(&(category, lang.to_string()))
    }
}

impl TagDatabase for TagTable {
    fn is_permitted(&self, category: TagCategory, lang: &str, value: &str) -> bool {
        self.permitted(category, lang)
            .is_some_and(|values| values.contains(value))
    }

    fn explain(&self, category: TagCategory, lang: &str) -> String {
        match self.permitted(category, lang) {
            Some(values) if !values.is_empty() => {
                let listed: Vec<&str> = values.iter().map(String::as_str).collect();
                format!(
                    "The following {} values are permitted in language [{lang}]: {}",
                    category.label(),
                    listed.join(", ")
                )
            }
            _ => format!(
                "No {} values have been permitted for language [{lang}].",
                category.label()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup_is_per_language() {
        let table = TagTable::new()
            .allow(TagCategory::Auxiliary, "en", ["be", "have"])
            .allow(TagCategory::Auxiliary, "de", ["sein"]);
        assert!(table.is_permitted(TagCategory::Auxiliary, "en", "be"));
        assert!(!table.is_permitted(TagCategory::Auxiliary, "de", "be"));
        assert!(!table.is_permitted(TagCategory::Copula, "en", "be"));
    }

    #[test]
    fn test_explanations() {
        let table = TagTable::new().allow(TagCategory::Copula, "en", ["be"]);
        assert_eq!(
            table.explain(TagCategory::Copula, "en"),
            "The following copula values are permitted in language [en]: be"
        );
        assert!(table
            .explain(TagCategory::Feature, "en")
            .starts_with("No feature values"));
        assert!(PermissiveTags.is_permitted(TagCategory::Xpos, "xx", "anything"));
    }
}
