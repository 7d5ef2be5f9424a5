//! The validation pipeline.
//!
//! A [`Validator`] owns a flat, level-filtered list of check descriptors and
//! runs them over every block of an input in fixed phases:
//!
//! 1. block-level checks (reader issues, ID sequence),
//! 2. row-level checks on each row (ID format, whitespace, field emptiness),
//! 3. comment-level checks (sentence metadata),
//! 4. column-set checks over all rows (text reconstruction),
//! 5. per-row column checks (tags, features, relations),
//! 6. tree-level checks (reference resolution, then the basic tree and the
//!    enhanced graph), only while IDs and references are sound.
//!
//! Each check declares the test ids it depends on. When the block has already
//! produced an incident with one of them, the check does not run at all.
//! All state lives in an explicit [`RunState`] supplied by the caller.

mod fields;
mod ids;
mod metadata;
mod refs;
mod tree;

pub use tree::{Tree, TreeError};

use crate::block::{Block, BlockReader, Column, ReadError, Row};
use crate::config::ValidationConfig;
use crate::grammar::{classify_comment, language_marker, Comment};
use crate::incident::{Aggregator, Counts, Incident, Reporter, Summary, TestClass};
use crate::tags::{PermissiveTags, TagDatabase};
use facet::Facet;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, error, info, instrument};

/// When in a block a check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Block,
    Row,
    Comments,
    ColumnSet,
    Column,
    Tree,
}

/// Phases in execution order.
const PHASES: [Scope; 6] = [
    Scope::Block,
    Scope::Row,
    Scope::Comments,
    Scope::ColumnSet,
    Scope::Column,
    Scope::Tree,
];

#[derive(Clone, Copy)]
enum CheckFn {
    Block(fn(&mut BlockContext<'_>)),
    Row(fn(&mut BlockContext<'_>, &Row)),
    Tree(fn(&mut BlockContext<'_>, &Tree)),
}

/// A named check: its level, phase, prerequisites and body.
struct Check {
    name: &'static str,
    level: u8,
    scope: Scope,
    depends_on: &'static [&'static str],
    run: CheckFn,
}

/// Test ids whose presence means row IDs cannot be trusted.
const ID_FAILURES: &[&str] = &[
    ids::INVALID_WORD_ID,
    ids::WORD_ID_SEQUENCE,
    ids::MISPLACED_WORD_INTERVAL,
    ids::EMPTY_NODE_SEQUENCE,
    ids::MISPLACED_EMPTY_NODE,
    ids::REVERSED_WORD_INTERVAL,
    ids::WORD_INTERVAL_OUT,
    ids::OVERLAPPING_WORD_INTERVALS,
];

/// Test ids whose presence means the tree cannot be built.
const TREE_PREREQUISITES: &[&str] = &[
    ids::INVALID_WORD_ID,
    ids::WORD_ID_SEQUENCE,
    ids::MISPLACED_WORD_INTERVAL,
    ids::EMPTY_NODE_SEQUENCE,
    ids::MISPLACED_EMPTY_NODE,
    ids::REVERSED_WORD_INTERVAL,
    ids::WORD_INTERVAL_OUT,
    ids::OVERLAPPING_WORD_INTERVALS,
    refs::INVALID_HEAD,
    refs::UNKNOWN_HEAD,
    refs::INVALID_DEPS,
    refs::UNKNOWN_EHEAD,
];

/// Test ids after which non-projectivity is meaningless.
const GAP_PREREQUISITES: &[&str] = &[
    ids::INVALID_WORD_ID,
    ids::WORD_ID_SEQUENCE,
    ids::MISPLACED_WORD_INTERVAL,
    ids::EMPTY_NODE_SEQUENCE,
    ids::MISPLACED_EMPTY_NODE,
    ids::REVERSED_WORD_INTERVAL,
    ids::WORD_INTERVAL_OUT,
    ids::OVERLAPPING_WORD_INTERVALS,
    refs::INVALID_HEAD,
    refs::UNKNOWN_HEAD,
    refs::INVALID_DEPS,
    refs::UNKNOWN_EHEAD,
    tree::HEAD_SELF_LOOP,
    tree::NON_TREE,
];

/// Prerequisites of comparing the sentence text with the word forms.
const TEXT_PREREQUISITES: &[&str] = &[
    ids::INVALID_WORD_ID,
    ids::WORD_ID_SEQUENCE,
    ids::MISPLACED_WORD_INTERVAL,
    ids::REVERSED_WORD_INTERVAL,
    ids::WORD_INTERVAL_OUT,
    ids::OVERLAPPING_WORD_INTERVALS,
    metadata::MISSING_TEXT,
    metadata::MULTIPLE_TEXT,
];

static CHECKS: &[Check] = &[
    Check {
        name: "reader-issues",
        level: 1,
        scope: Scope::Block,
        depends_on: &[],
        run: CheckFn::Block(ids::check_reader_issues),
    },
    Check {
        name: "blank-line-termination",
        level: 1,
        scope: Scope::Block,
        depends_on: &[],
        run: CheckFn::Block(ids::check_termination),
    },
    Check {
        name: "id-sequence",
        level: 1,
        scope: Scope::Block,
        depends_on: &[],
        run: CheckFn::Block(ids::check_sequence),
    },
    Check {
        name: "id-format",
        level: 1,
        scope: Scope::Row,
        depends_on: &[],
        run: CheckFn::Row(ids::check_id_format),
    },
    Check {
        name: "column-whitespace",
        level: 1,
        scope: Scope::Row,
        depends_on: &[],
        run: CheckFn::Row(fields::check_whitespace),
    },
    Check {
        name: "placeholder-fields",
        level: 1,
        scope: Scope::Row,
        depends_on: &[],
        run: CheckFn::Row(fields::check_placeholders),
    },
    Check {
        name: "sentence-metadata",
        level: 2,
        scope: Scope::Comments,
        depends_on: &[],
        run: CheckFn::Block(metadata::check_comments),
    },
    Check {
        name: "text-reconstruction",
        level: 2,
        scope: Scope::ColumnSet,
        depends_on: TEXT_PREREQUISITES,
        run: CheckFn::Block(metadata::check_text),
    },
    Check {
        name: "upos",
        level: 2,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_upos),
    },
    Check {
        name: "features",
        level: 2,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_features),
    },
    Check {
        name: "deprel",
        level: 2,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_deprel),
    },
    Check {
        name: "root-deprel",
        level: 2,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_root_deprel),
    },
    Check {
        name: "enhanced-deprel",
        level: 2,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_edeprels),
    },
    Check {
        name: "upos-values",
        level: 4,
        scope: Scope::Column,
        depends_on: &[fields::UNKNOWN_UPOS],
        run: CheckFn::Row(fields::check_upos_values),
    },
    Check {
        name: "xpos-values",
        level: 4,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_xpos_values),
    },
    Check {
        name: "feature-values",
        level: 4,
        scope: Scope::Column,
        depends_on: &[fields::INVALID_FEATURE, fields::INVALID_FEATURE_VALUE],
        run: CheckFn::Row(fields::check_feature_values),
    },
    Check {
        name: "deprel-values",
        level: 4,
        scope: Scope::Column,
        depends_on: &[fields::INVALID_DEPREL],
        run: CheckFn::Row(fields::check_deprel_values),
    },
    Check {
        name: "enhanced-deprel-values",
        level: 4,
        scope: Scope::Column,
        depends_on: &[fields::INVALID_EDEPREL],
        run: CheckFn::Row(fields::check_edeprel_values),
    },
    Check {
        name: "auxiliary-lemmas",
        level: 5,
        scope: Scope::Column,
        depends_on: &[fields::UNKNOWN_UPOS],
        run: CheckFn::Row(fields::check_auxiliary),
    },
    Check {
        name: "copula-lemmas",
        level: 5,
        scope: Scope::Column,
        depends_on: &[fields::INVALID_DEPREL],
        run: CheckFn::Row(fields::check_copula),
    },
    Check {
        name: "words-with-spaces",
        level: 5,
        scope: Scope::Column,
        depends_on: &[],
        run: CheckFn::Row(fields::check_words_with_spaces),
    },
    Check {
        name: "references",
        level: 1,
        scope: Scope::Tree,
        depends_on: ID_FAILURES,
        run: CheckFn::Block(refs::check_references),
    },
    Check {
        name: "tree-structure",
        level: 2,
        scope: Scope::Tree,
        depends_on: TREE_PREREQUISITES,
        run: CheckFn::Tree(tree::check_structure),
    },
    Check {
        name: "deps-order",
        level: 2,
        scope: Scope::Tree,
        depends_on: TREE_PREREQUISITES,
        run: CheckFn::Block(tree::check_deps_order),
    },
    Check {
        name: "enhanced-connectivity",
        level: 2,
        scope: Scope::Tree,
        depends_on: TREE_PREREQUISITES,
        run: CheckFn::Block(tree::check_enhanced_connectivity),
    },
    Check {
        name: "nonprojective-punctuation",
        level: 3,
        scope: Scope::Tree,
        depends_on: GAP_PREREQUISITES,
        run: CheckFn::Tree(tree::check_nonprojective_punct),
    },
    Check {
        name: "nonprojective-coordination",
        level: 3,
        scope: Scope::Tree,
        depends_on: GAP_PREREQUISITES,
        run: CheckFn::Tree(tree::check_nonprojective_cc),
    },
];

/// Where a sentence id was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceOrigin {
    /// Input name.
    pub file: String,
    /// Line of the `sent_id` comment.
    pub line: usize,
}

/// Sentence ids seen so far in a run, for corpus-wide uniqueness.
#[derive(Debug, Clone, Default)]
pub struct SentenceIds {
    seen: HashMap<String, SentenceOrigin>,
}

impl SentenceIds {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id`; returns where it was seen before, if it was.
    pub fn register(&mut self, id: &str, file: &str, line: usize) -> Option<SentenceOrigin> {
        if let Some(origin) = self.seen.get(id) {
            return Some(origin.clone());
        }
        self.seen.insert(
            id.to_string(),
            SentenceOrigin {
                file: file.to_string(),
                line,
            },
        );
        None
    }

    /// Whether `id` has been registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Number of distinct ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Everything a run accumulates across inputs.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Incident counts, storage and suppression state.
    pub aggregator: Aggregator,
    /// Sentence ids seen so far.
    pub sentence_ids: SentenceIds,
}

impl RunState {
    /// Summary of everything recorded so far.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary::from(self.aggregator.counts())
    }
}

/// Outcome of validating one input.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct FileSummary {
    /// Input name.
    pub file: String,
    /// Number of blocks read.
    pub blocks: usize,
    /// Counts for this input alone.
    pub summary: Summary,
}

/// Outcome of validating several inputs.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct RunSummary {
    /// Per-input outcomes, in input order.
    pub files: Vec<FileSummary>,
    /// Counts over the whole run.
    pub summary: Summary,
}

/// Per-block state threaded through every check.
pub(crate) struct BlockContext<'a> {
    pub(crate) block: &'a Block,
    pub(crate) config: &'a ValidationConfig,
    pub(crate) tags: &'a dyn TagDatabase,
    pub(crate) sentence_ids: &'a mut SentenceIds,
    file: &'a str,
    sentence_id: Option<String>,
    recorded: HashSet<String>,
    aggregator: &'a mut Aggregator,
    reporter: &'a mut dyn Reporter,
}

impl<'a> BlockContext<'a> {
    /// Reports an incident, filling in file, sentence and a default line.
    pub(crate) fn emit(&mut self, mut incident: Incident) {
        incident.file = self.file.to_string();
        if incident.line == 0 {
            incident.line = self.block.first_line;
        }
        if incident.sentence_id.is_none() {
            incident.sentence_id.clone_from(&self.sentence_id);
        }
        self.recorded.insert(incident.test_id.clone());
        self.aggregator.submit(incident, self.reporter);
    }

    /// Whether the block already produced an incident with one of `test_ids`.
    pub(crate) fn has_any(&self, test_ids: &[&str]) -> bool {
        test_ids.iter().any(|id| self.recorded.contains(*id))
    }

    /// The language of a row: its `Lang=` marker or the run default.
    pub(crate) fn lang(&self, row: &Row) -> String {
        language_marker(row.field(Column::Misc))
            .unwrap_or(self.config.lang.as_str())
            .to_string()
    }

    pub(crate) fn file(&self) -> &'a str {
        self.file
    }
}

/// Validates inputs against a level-filtered set of checks.
pub struct Validator<T = PermissiveTags> {
    config: ValidationConfig,
    tags: T,
    checks: Vec<&'static Check>,
}

impl Validator<PermissiveTags> {
    /// A validator without language-specific data: every tag lookup passes.
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_tags(config, PermissiveTags)
    }
}

impl<T: TagDatabase> Validator<T> {
    /// A validator consulting `tags` for language-specific values.
    #[must_use]
    pub fn with_tags(config: ValidationConfig, tags: T) -> Self {
        let checks = CHECKS
            .iter()
            .filter(|check| check.level <= config.level)
            .collect();
        Self {
            config,
            tags,
            checks,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Names of the checks that will run, in execution order.
    #[must_use]
    pub fn check_names(&self) -> Vec<&'static str> {
        PHASES
            .iter()
            .flat_map(|scope| {
                self.checks
                    .iter()
                    .filter(move |check| check.scope == *scope)
                    .map(|check| check.name)
            })
            .collect()
    }

    /// Fresh state for a run over one or more inputs.
    #[must_use]
    pub fn start_run(&self) -> RunState {
        RunState {
            aggregator: Aggregator::new(&self.config),
            sentence_ids: SentenceIds::new(),
        }
    }

    /// Validates every block of `input`, named `file` in incidents.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] if reading fails part-way; incidents recorded
    /// before the failure stay in `run`.
    #[instrument(skip_all, fields(file = %file))]
    pub fn validate_reader<R: BufRead>(
        &self,
        run: &mut RunState,
        file: &str,
        input: R,
        reporter: &mut dyn Reporter,
    ) -> Result<FileSummary, ReadError> {
        let before = run.aggregator.counts().clone();
        let mut blocks = 0;
        let mut reader = BlockReader::new(input);
        for block in &mut reader {
            let block = block?;
            blocks += 1;
            debug!(line = block.first_line, rows = block.rows.len(), "validating block");
            self.validate_block(run, file, &block, reporter);
            reporter.block(&block);
        }
        let counts = run.aggregator.counts().since(&before);
        let summary = Summary::from(&counts);
        info!(
            blocks,
            lines = reader.lines_read(),
            errors = summary.error_count(),
            warnings = summary.warning_count(),
            "validated"
        );
        Ok(FileSummary {
            file: file.to_string(),
            blocks,
            summary,
        })
    }

    /// Validates in-memory text.
    pub fn validate_str(
        &self,
        run: &mut RunState,
        file: &str,
        text: &str,
        reporter: &mut dyn Reporter,
    ) -> FileSummary {
        let before = run.aggregator.counts().clone();
        self.validate_reader(run, file, text.as_bytes(), reporter)
            .unwrap_or_else(|err| Self::unreadable(run, file, &err, &before, reporter))
    }

    /// Opens and validates one file.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Open`] if the file cannot be opened and
    /// [`ReadError::Io`] if reading fails part-way.
    pub fn validate_path(
        &self,
        run: &mut RunState,
        path: &Path,
        reporter: &mut dyn Reporter,
    ) -> Result<FileSummary, ReadError> {
        let name = path.display().to_string();
        let handle = File::open(path).map_err(|source| ReadError::Open {
            path: name.clone(),
            source,
        })?;
        self.validate_reader(run, &name, BufReader::new(handle), reporter)
    }

    /// Validates files in order. A file that cannot be read yields an
    /// `unreadable-file` error and the run moves on to the next one.
    pub fn validate_paths<P: AsRef<Path>>(
        &self,
        run: &mut RunState,
        paths: &[P],
        reporter: &mut dyn Reporter,
    ) -> RunSummary {
        let files = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let before = run.aggregator.counts().clone();
                self.validate_path(run, path, reporter).unwrap_or_else(|err| {
                    Self::unreadable(run, &path.display().to_string(), &err, &before, reporter)
                })
            })
            .collect();
        RunSummary {
            files,
            summary: run.summary(),
        }
    }

    fn unreadable(
        run: &mut RunState,
        file: &str,
        err: &ReadError,
        before: &Counts,
        reporter: &mut dyn Reporter,
    ) -> FileSummary {
        error!(file, error = %err, "input abandoned");
        let line = match err {
            ReadError::Open { .. } => 0,
            ReadError::Io { line, .. } => *line,
        };
        let mut incident = Incident::error(TestClass::Format, "unreadable-file", err.to_string())
            .at_line(line);
        incident.file = file.to_string();
        run.aggregator.submit(incident, reporter);
        FileSummary {
            file: file.to_string(),
            blocks: 0,
            summary: Summary::from(&run.aggregator.counts().since(before)),
        }
    }

    /// Runs every active check over one block.
    pub fn validate_block(
        &self,
        run: &mut RunState,
        file: &str,
        block: &Block,
        reporter: &mut dyn Reporter,
    ) {
        let sentence_id = block
            .comments
            .iter()
            .find_map(|c| match classify_comment(&c.text) {
                Comment::SentId(Some(id)) => Some(id.to_string()),
                _ => None,
            });
        let mut ctx = BlockContext {
            block,
            config: &self.config,
            tags: &self.tags,
            sentence_ids: &mut run.sentence_ids,
            file,
            sentence_id,
            recorded: HashSet::new(),
            aggregator: &mut run.aggregator,
            reporter,
        };
        if block.rows.is_empty() {
            self.run_phase(&mut ctx, Scope::Block);
            return;
        }
        for scope in PHASES {
            self.run_phase(&mut ctx, scope);
        }
    }

    fn run_phase(&self, ctx: &mut BlockContext<'_>, scope: Scope) {
        let block = ctx.block;
        let checks: Vec<&Check> = self
            .checks
            .iter()
            .copied()
            .filter(|check| check.scope == scope)
            .collect();
        if matches!(scope, Scope::Row | Scope::Column) {
            for row in &block.rows {
                for check in &checks {
                    if let CheckFn::Row(f) = check.run {
                        if !ctx.has_any(check.depends_on) {
                            f(ctx, row);
                        }
                    }
                }
            }
            return;
        }
        let mut tree: Option<Tree> = None;
        let mut tree_failed = false;
        for check in checks {
            if ctx.has_any(check.depends_on) {
                debug!(check = check.name, "skipped: prerequisite failed");
                continue;
            }
            match check.run {
                CheckFn::Block(f) => f(ctx),
                CheckFn::Row(f) => {
                    for row in &block.rows {
                        f(ctx, row);
                    }
                }
                CheckFn::Tree(f) => {
                    if tree.is_none() && !tree_failed {
                        match Tree::build(block) {
                            Ok(built) => tree = Some(built),
                            Err(err) => {
                                tree_failed = true;
                                ctx.emit(Incident::error(
                                    TestClass::Internal,
                                    "internal-error",
                                    err.to_string(),
                                ));
                            }
                        }
                    }
                    if let Some(tree) = &tree {
                        f(ctx, tree);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{NullReporter, Severity};

    pub(crate) fn row(id: &str, form: &str, upos: &str, head: &str, deprel: &str) -> String {
        format!("{id}\t{form}\t{form}\t{upos}\t_\t_\t{head}\t{deprel}\t_\t_")
    }

    fn test_ids(text: &str, config: ValidationConfig) -> Vec<String> {
        let validator = Validator::new(config);
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "t", text, &mut NullReporter);
        run.aggregator
            .incidents()
            .iter()
            .map(|i| i.test_id.clone())
            .collect()
    }

    #[test]
    fn test_checks_filtered_by_level() {
        let level1 = Validator::new(ValidationConfig::default().with_level(1));
        assert!(level1.check_names().contains(&"id-sequence"));
        assert!(level1.check_names().contains(&"references"));
        assert!(!level1.check_names().contains(&"tree-structure"));
        let all = Validator::new(ValidationConfig::default());
        assert_eq!(all.check_names().len(), CHECKS.len());
        assert_eq!(all.check_names().last(), Some(&"nonprojective-coordination"));
    }

    #[test]
    fn test_broken_ids_skip_tree_checks() {
        let text = format!(
            "# sent_id = s\n# text = a b\n{}\n{}\n\n",
            row("1", "a", "X", "0", "root"),
            row("3", "b", "X", "1", "dep"),
        );
        let ids = test_ids(&text, ValidationConfig::default());
        assert_eq!(ids, vec!["word-id-sequence"]);
    }

    #[test]
    fn test_rowless_block_only_reports_reader_issues() {
        let ids = test_ids("# orphan comment\n", ValidationConfig::default());
        assert_eq!(ids, vec!["missing-sentence"]);
    }

    #[test]
    fn test_sentence_id_and_file_are_attached() {
        let text = format!(
            "# sent_id = s7\n# text = a\n{}\n\n",
            row("1", "a", "X", "0", "dep")
        );
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        validator.validate_str(&mut run, "in.conllu", &text, &mut NullReporter);
        let incidents = run.aggregator.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].test_id, "0-is-not-root");
        assert_eq!(incidents[0].sentence_id.as_deref(), Some("s7"));
        assert_eq!(incidents[0].file, "in.conllu");
        assert_eq!(incidents[0].line, 3);
        assert_eq!(incidents[0].severity, Severity::Error);
    }

    #[test]
    fn test_sentence_ids_register_across_files() {
        let text = format!(
            "# sent_id = dup\n# text = a\n{}\n\n",
            row("1", "a", "X", "0", "root")
        );
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        let first = validator.validate_str(&mut run, "a", &text, &mut NullReporter);
        let second = validator.validate_str(&mut run, "b", &text, &mut NullReporter);
        assert!(first.summary.passed);
        assert!(!second.summary.passed);
        assert_eq!(second.summary.errors_in(TestClass::Metadata), 1);
        assert_eq!(run.sentence_ids.len(), 1);
    }
}
