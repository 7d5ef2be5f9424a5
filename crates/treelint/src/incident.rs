//! Incidents and their aggregation.
//!
//! Every problem the validator finds becomes an [`Incident`]. Incidents flow
//! through an [`Aggregator`], which keeps the true counts per severity and
//! class, decides what is printed (per-class suppression, quiet mode, test id
//! filters), stores a bounded number of incidents for the caller and makes
//! sure each explanation is shown only once. Printing itself is delegated to a
//! [`Reporter`].

use crate::block::Block;
use crate::config::ValidationConfig;
use facet::Facet;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// How serious an incident is. Only errors fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
#[repr(u8)]
pub enum Severity {
    /// A violation of the format.
    Error,
    /// A suspicious construct that does not fail validation.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        })
    }
}

/// The area of the format an incident belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
#[repr(u8)]
pub enum TestClass {
    /// Lines, columns, IDs, whitespace and blank lines.
    Format,
    /// UPOS, XPOS and FEATS.
    Morpho,
    /// Basic relations and tree structure.
    Syntax,
    /// The enhanced graph in DEPS.
    Enhanced,
    /// Sentence-level attributes in comments.
    Metadata,
    /// Entity and coreference annotation.
    Coref,
    /// Broken internal invariants. Correct input never produces these.
    Internal,
}

impl TestClass {
    /// All classes in reporting order.
    pub const ALL: [TestClass; 7] = [
        TestClass::Format,
        TestClass::Morpho,
        TestClass::Syntax,
        TestClass::Enhanced,
        TestClass::Metadata,
        TestClass::Coref,
        TestClass::Internal,
    ];
}

impl fmt::Display for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TestClass::Format => "Format",
            TestClass::Morpho => "Morpho",
            TestClass::Syntax => "Syntax",
            TestClass::Enhanced => "Enhanced",
            TestClass::Metadata => "Metadata",
            TestClass::Coref => "Coref",
            TestClass::Internal => "Internal",
        })
    }
}

/// One reported problem with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Incident {
    /// Error or warning.
    pub severity: Severity,
    /// Area of the format.
    pub test_class: TestClass,
    /// Stable identifier of the test that fired, e.g. `word-id-sequence`.
    pub test_id: String,
    /// Human readable description.
    pub message: String,
    /// Name of the input.
    pub file: String,
    /// 1-based input line.
    pub line: usize,
    /// `sent_id` of the sentence, when known.
    pub sentence_id: Option<String>,
    /// ID of the offending node, when there is one.
    pub node_id: Option<String>,
    /// Longer explanation, printed once per run.
    pub explanation: Option<String>,
}

impl Incident {
    fn new(
        severity: Severity,
        test_class: TestClass,
        test_id: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            test_class,
            test_id: test_id.to_string(),
            message: message.into(),
            file: String::new(),
            line: 0,
            sentence_id: None,
            node_id: None,
            explanation: None,
        }
    }

    /// Creates an error; file, line and sentence are filled in when reported.
    #[must_use]
    pub fn error(test_class: TestClass, test_id: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, test_class, test_id, message)
    }

    /// Creates a warning.
    #[must_use]
    pub fn warning(test_class: TestClass, test_id: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, test_class, test_id, message)
    }

    /// Anchors the incident to an input line.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Names the offending node.
    #[must_use]
    pub fn at_node(mut self, node: impl fmt::Display) -> Self {
        self.node_id = Some(node.to_string());
        self
    }

    /// Attaches a longer explanation. Empty explanations are dropped.
    #[must_use]
    pub fn explained(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.explanation = Some(text);
        }
        self
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if !self.file.is_empty() {
            write!(f, "{} ", self.file)?;
        }
        write!(f, "Line {}", self.line)?;
        if let Some(sid) = &self.sentence_id {
            write!(f, " Sent {sid}")?;
        }
        if let Some(node) = &self.node_id {
            write!(f, " Node {node}")?;
        }
        write!(
            f,
            "]: [{} {} {}] {}",
            self.test_class, self.severity, self.test_id, self.message
        )
    }
}

/// What happened to an incident's text when it was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Printed through the reporter.
    Emitted,
    /// Counted but hidden by quiet mode or a test id filter.
    Filtered,
    /// Counted but past the per-class print limit.
    Suppressed,
}

/// True incident counts per severity and class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts {
    by_class: BTreeMap<(Severity, TestClass), usize>,
}

impl Counts {
    fn bump(&mut self, severity: Severity, class: TestClass) -> usize {
        let count = self.by_class.entry((severity, class)).or_default();
        *count += 1;
        *count
    }

    /// Count for one severity and class.
    #[must_use]
    pub fn get(&self, severity: Severity, class: TestClass) -> usize {
        self.by_class.get(&(severity, class)).copied().unwrap_or(0)
    }

    /// Count for one severity over all classes.
    #[must_use]
    pub fn total(&self, severity: Severity) -> usize {
        self.by_class
            .iter()
            .filter(|((sev, _), _)| *sev == severity)
            .map(|(_, count)| count)
            .sum()
    }

    /// The counts accumulated since `earlier` was taken.
    #[must_use]
    pub fn since(&self, earlier: &Counts) -> Counts {
        let by_class = self
            .by_class
            .iter()
            .filter_map(|(key, count)| {
                let delta = count.saturating_sub(earlier.by_class.get(key).copied().unwrap_or(0));
                (delta > 0).then_some((*key, delta))
            })
            .collect();
        Counts { by_class }
    }

    /// Adds `other` into these counts.
    pub fn add(&mut self, other: &Counts) {
        for (key, count) in &other.by_class {
            *self.by_class.entry(*key).or_default() += count;
        }
    }

    /// Whether no error has been counted.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.total(Severity::Error) == 0
    }
}

/// Number of incidents in one class.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct ClassCount {
    /// The class.
    pub class: TestClass,
    /// How many incidents it received.
    pub count: usize,
}

/// Serializable end-of-input summary.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Summary {
    /// Error counts of the classes that had any.
    pub errors: Vec<ClassCount>,
    /// Warning counts of the classes that had any.
    pub warnings: Vec<ClassCount>,
    /// `true` iff there were no errors.
    pub passed: bool,
}

impl From<&Counts> for Summary {
    fn from(counts: &Counts) -> Self {
        let collect = |severity| {
            TestClass::ALL
                .iter()
                .map(|&class| ClassCount {
                    class,
                    count: counts.get(severity, class),
                })
                .filter(|c| c.count > 0)
                .collect::<Vec<_>>()
        };
        Self {
            errors: collect(Severity::Error),
            warnings: collect(Severity::Warning),
            passed: counts.passed(),
        }
    }
}

impl Summary {
    /// Total errors over all classes.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.iter().map(|c| c.count).sum()
    }

    /// Total warnings over all classes.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.iter().map(|c| c.count).sum()
    }

    /// Errors in one class.
    #[must_use]
    pub fn errors_in(&self, class: TestClass) -> usize {
        self.errors
            .iter()
            .find(|c| c.class == class)
            .map_or(0, |c| c.count)
    }
}

/// Receives the text output of a run.
///
/// The validator decides what is shown; a reporter only decides how.
pub trait Reporter {
    /// An incident that passed suppression and filters.
    fn incident(&mut self, incident: &Incident);

    /// A one-off notice, such as the start of per-class suppression.
    fn notice(&mut self, _message: &str) {}

    /// An explanation, delivered right after the first incident that cites it.
    fn explanation(&mut self, _text: &str) {}

    /// A block whose checks have all run, for callers that echo the input.
    fn block(&mut self, _block: &Block) {}
}

/// A reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn incident(&mut self, _incident: &Incident) {}
}

/// Counts, filters, stores and explains incidents for one run.
#[derive(Debug, Clone)]
pub struct Aggregator {
    max_per_class: usize,
    max_stored: usize,
    quiet: bool,
    excluded: BTreeSet<String>,
    include_only: BTreeSet<String>,
    counts: Counts,
    stored: BTreeMap<(Severity, TestClass), Vec<(u64, Incident)>>,
    next_seq: u64,
    explained: HashSet<String>,
}

impl Aggregator {
    /// Creates an aggregator honouring the reporting settings of `config`.
    #[must_use]
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_per_class: config.max_errors_per_class,
            max_stored: config.max_stored,
            quiet: config.quiet,
            excluded: config.excluded_test_ids.clone(),
            include_only: config.include_only_test_ids.clone(),
            counts: Counts::default(),
            stored: BTreeMap::new(),
            next_seq: 0,
            explained: HashSet::new(),
        }
    }

    /// Records, prints (when allowed), explains and stores one incident.
    pub fn submit(&mut self, incident: Incident, reporter: &mut dyn Reporter) -> Disposition {
        let disposition = self.record(&incident, reporter);
        if disposition == Disposition::Emitted {
            reporter.incident(&incident);
            self.explain(&incident, reporter);
        }
        self.store(incident);
        disposition
    }

    /// Counts the incident and decides whether its text may be printed.
    ///
    /// Once a severity/class pair passes the per-class limit, a single notice
    /// announces the suppression and later incidents of that pair are only
    /// counted.
    pub fn record(&mut self, incident: &Incident, reporter: &mut dyn Reporter) -> Disposition {
        let count = self.counts.bump(incident.severity, incident.test_class);
        let limit = self.max_per_class;
        if limit > 0 && count > limit {
            if count == limit + 1 && !self.quiet {
                reporter.notice(&format!(
                    "...suppressing further {} {}s",
                    incident.test_class,
                    incident.severity.to_string().to_lowercase()
                ));
            }
            return Disposition::Suppressed;
        }
        if self.is_printable(&incident.test_id) {
            Disposition::Emitted
        } else {
            Disposition::Filtered
        }
    }

    /// Keeps the incident unless its severity/class list is full.
    ///
    /// Returns `false` when the cap dropped it; counts are not affected.
    pub fn store(&mut self, incident: Incident) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        let list = self
            .stored
            .entry((incident.severity, incident.test_class))
            .or_default();
        if self.max_stored > 0 && list.len() >= self.max_stored {
            return false;
        }
        list.push((seq, incident));
        true
    }

    /// Prints the incident's explanation if this exact text has not been
    /// printed before in the run.
    pub fn explain(&mut self, incident: &Incident, reporter: &mut dyn Reporter) -> bool {
        let Some(text) = &incident.explanation else {
            return false;
        };
        if !self.explained.insert(text.clone()) {
            return false;
        }
        reporter.explanation(text);
        true
    }

    /// Whether incidents with `test_id` are printed at all.
    #[must_use]
    pub fn is_printable(&self, test_id: &str) -> bool {
        if self.quiet || self.excluded.contains(test_id) {
            return false;
        }
        self.include_only.is_empty() || self.include_only.contains(test_id)
    }

    /// True counts so far.
    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Whether no error has been recorded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.counts.passed()
    }

    /// Stored incidents of one severity and class, in submission order.
    pub fn stored(&self, severity: Severity, class: TestClass) -> impl Iterator<Item = &Incident> {
        self.stored
            .get(&(severity, class))
            .into_iter()
            .flatten()
            .map(|(_, incident)| incident)
    }

    /// All stored incidents in submission order.
    #[must_use]
    pub fn incidents(&self) -> Vec<&Incident> {
        let mut all: Vec<&(u64, Incident)> = self.stored.values().flatten().collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, incident)| incident).collect()
    }

    /// Folds an aggregator built for another input into this one.
    ///
    /// Counts are summed, the other side's stored incidents follow this side's
    /// (subject to the storage cap) and explanations already shown there count
    /// as shown here.
    pub fn merge(&mut self, other: Aggregator) {
        self.counts.add(&other.counts);
        let offset = self.next_seq;
        for (key, incidents) in other.stored {
            let list = self.stored.entry(key).or_default();
            for (seq, incident) in incidents {
                if self.max_stored > 0 && list.len() >= self.max_stored {
                    break;
                }
                list.push((offset + seq, incident));
            }
        }
        self.next_seq += other.next_seq;
        self.explained.extend(other.explained);
    }
}
