//! Run configuration.
//!
//! A [`ValidationConfig`] decides which checks run (`level`), how strict the
//! tree checks are, and how incidents are reported. It is built in code with
//! the `with_*` setters or loaded from a partial JSON document whose missing
//! keys take the defaults.

use facet::Facet;
use std::collections::BTreeSet;
use thiserror::Error;

/// Highest validation level.
pub const MAX_LEVEL: u8 = 5;

/// Settings for one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Checks up to and including this level run (1..=5).
    pub level: u8,
    /// Default language of the data, overridable per row with `Lang=` in MISC.
    pub lang: String,
    /// Whether a sentence must have exactly one word attached to the root.
    pub single_root_required: bool,
    /// Incidents of one severity and class printed before suppression; 0 is
    /// unlimited.
    pub max_errors_per_class: usize,
    /// Incidents kept per severity and class; 0 is unlimited.
    pub max_stored: usize,
    /// Print nothing; counts and stored incidents are still kept.
    pub quiet: bool,
    /// Test ids never printed. Wins over [`Self::include_only_test_ids`].
    pub excluded_test_ids: BTreeSet<String>,
    /// When non-empty, only these test ids are printed.
    pub include_only_test_ids: BTreeSet<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            level: MAX_LEVEL,
            lang: "ud".to_string(),
            single_root_required: true,
            max_errors_per_class: 20,
            max_stored: 0,
            quiet: false,
            excluded_test_ids: BTreeSet::new(),
            include_only_test_ids: BTreeSet::new(),
        }
    }
}

/// The on-disk shape of a configuration: every key optional.
#[derive(Debug, Clone, Default, Facet)]
struct ConfigFile {
    #[facet(default)]
    level: Option<u8>,
    #[facet(default)]
    lang: Option<String>,
    #[facet(default)]
    single_root_required: Option<bool>,
    #[facet(default)]
    max_errors_per_class: Option<usize>,
    #[facet(default)]
    max_stored: Option<usize>,
    #[facet(default)]
    quiet: Option<bool>,
    #[facet(default)]
    exclude: Vec<String>,
    #[facet(default)]
    include_only: Vec<String>,
}

/// Possible errors raised while loading a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The document was not valid JSON or did not match the expected shape.
    #[error("invalid configuration JSON: {0}")]
    Json(String),

    /// The level was outside `1..=5`.
    #[error("validation level must be between 1 and 5, got {0}")]
    Level(u8),
}

/// Returns `level` if it names one of the validation levels.
///
/// # Errors
///
/// Returns [`ConfigError::Level`] when `level` is outside `1..=5`.
pub fn checked_level(level: u8) -> Result<u8, ConfigError> {
    if (1..=MAX_LEVEL).contains(&level) {
        Ok(level)
    } else {
        Err(ConfigError::Level(level))
    }
}

impl ValidationConfig {
    /// Parses a JSON configuration, filling absent keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the document cannot be deserialized and
    /// [`ConfigError::Level`] if the level is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            facet_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        let defaults = Self::default();
        let level = checked_level(file.level.unwrap_or(defaults.level))?;
        Ok(Self {
            level,
            lang: file.lang.unwrap_or(defaults.lang),
            single_root_required: file
                .single_root_required
                .unwrap_or(defaults.single_root_required),
            max_errors_per_class: file
                .max_errors_per_class
                .unwrap_or(defaults.max_errors_per_class),
            max_stored: file.max_stored.unwrap_or(defaults.max_stored),
            quiet: file.quiet.unwrap_or(defaults.quiet),
            excluded_test_ids: file.exclude.into_iter().collect(),
            include_only_test_ids: file.include_only.into_iter().collect(),
        })
    }

    /// Sets the level, clamped to `1..=5`.
    #[must_use]
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level.clamp(1, MAX_LEVEL);
        self
    }

    /// Sets the default language.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Sets whether exactly one root is required.
    #[must_use]
    pub fn with_single_root(mut self, required: bool) -> Self {
        self.single_root_required = required;
        self
    }

    /// Sets the per-class print limit (0 = unlimited).
    #[must_use]
    pub fn with_max_errors_per_class(mut self, max: usize) -> Self {
        self.max_errors_per_class = max;
        self
    }

    /// Sets the per-class storage cap (0 = unlimited).
    #[must_use]
    pub fn with_max_stored(mut self, max: usize) -> Self {
        self.max_stored = max;
        self
    }

    /// Silences all printing.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Never prints `test_id`.
    #[must_use]
    pub fn excluding(mut self, test_id: impl Into<String>) -> Self {
        self.excluded_test_ids.insert(test_id.into());
        self
    }

    /// Adds `test_id` to the list of the only test ids printed.
    #[must_use]
    pub fn including_only(mut self, test_id: impl Into<String>) -> Self {
        self.include_only_test_ids.insert(test_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = ValidationConfig::from_json(
            r#"{ "level": 2, "lang": "cs", "exclude": ["text-mismatch"] }"#,
        )
        .unwrap();
        assert_eq!(config.level, 2);
        assert_eq!(config.lang, "cs");
        assert!(config.single_root_required);
        assert_eq!(config.max_errors_per_class, 20);
        assert!(config.excluded_test_ids.contains("text-mismatch"));
    }

    #[test]
    fn test_level_out_of_range() {
        assert!(matches!(
            ValidationConfig::from_json(r#"{ "level": 9 }"#),
            Err(ConfigError::Level(9))
        ));
        assert_eq!(checked_level(1), Ok(1));
        assert_eq!(checked_level(5), Ok(5));
        assert_eq!(checked_level(0), Err(ConfigError::Level(0)));
        assert!(matches!(
            ValidationConfig::from_json("{ level"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_with_level_clamps() {
        assert_eq!(ValidationConfig::default().with_level(0).level, 1);
        assert_eq!(ValidationConfig::default().with_level(7).level, MAX_LEVEL);
    }
}
