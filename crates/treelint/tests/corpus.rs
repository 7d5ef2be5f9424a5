//! End-to-end validation of small corpora through the library API.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use treelint::{
    Incident, NullReporter, Reporter, Severity, TestClass, TextReporter, ValidationConfig,
    Validator,
};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn read(name: &str) -> String {
    fs::read_to_string(data(name)).unwrap()
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

#[derive(Default)]
struct Recorder {
    incidents: Vec<String>,
    notices: Vec<String>,
    explanations: Vec<String>,
}

impl Reporter for Recorder {
    fn incident(&mut self, incident: &Incident) {
        self.incidents.push(incident.test_id.clone());
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn explanation(&mut self, text: &str) {
        self.explanations.push(text.to_string());
    }
}

#[test]
fn valid_corpus_has_no_incidents() {
    assert!(test_ids(&read("valid.conllu"), ValidationConfig::default()).is_empty());
}

#[test]
fn invalid_corpus_reports_in_block_order() {
    assert_eq!(
        test_ids(&read("invalid.conllu"), ValidationConfig::default()),
        vec![
            "multiple-roots",
            "word-id-sequence",
            "missing-empty-line",
            "missing-root",
            "non-tree",
        ]
    );
}

#[test]
fn repeated_runs_are_identical() {
    let text = read("invalid.conllu");
    let validator = Validator::new(ValidationConfig::default());
    let mut first = validator.start_run();
    validator.validate_str(&mut first, "t", &text, &mut NullReporter);
    let mut second = validator.start_run();
    validator.validate_str(&mut second, "t", &text, &mut NullReporter);
    let first: Vec<Incident> = first.aggregator.incidents().into_iter().cloned().collect();
    let second: Vec<Incident> = second.aggregator.incidents().into_iter().cloned().collect();
    assert_eq!(first, second);
}

#[test]
fn suppression_keeps_true_counts() {
    let text: String = (1..=5)
        .map(|n| {
            format!("# sent_id = s{n}\n# text = w\n1\tw\tw\tX\t_\t_\t0\tdep\t_\t_\n\n")
        })
        .collect();
    let validator = Validator::new(ValidationConfig::default().with_max_errors_per_class(2));
    let mut run = validator.start_run();
    let mut recorder = Recorder::default();
    let summary = validator.validate_str(&mut run, "t", &text, &mut recorder);
    assert_eq!(recorder.incidents, vec!["0-is-not-root", "0-is-not-root"]);
    assert_eq!(recorder.notices, vec!["...suppressing further Syntax errors"]);
    assert_eq!(summary.summary.errors_in(TestClass::Syntax), 5);
    assert_eq!(run.aggregator.stored(Severity::Error, TestClass::Syntax).count(), 5);
}

#[test]
fn filters_do_not_change_counts() {
    let text = read("invalid.conllu");
    let validator = Validator::new(
        ValidationConfig::default()
            .excluding("non-tree")
            .including_only("non-tree")
            .including_only("multiple-roots"),
    );
    let mut run = validator.start_run();
    let mut recorder = Recorder::default();
    validator.validate_str(&mut run, "t", &text, &mut recorder);
    assert_eq!(recorder.incidents, vec!["multiple-roots"]);
    assert_eq!(run.summary().error_count(), 5);

    let quiet = Validator::new(ValidationConfig::default().with_quiet(true));
    let mut run = quiet.start_run();
    let mut recorder = Recorder::default();
    quiet.validate_str(&mut run, "t", &text, &mut recorder);
    assert!(recorder.incidents.is_empty());
    assert!(!run.summary().passed);
}

#[test]
fn echo_reproduces_valid_blocks() {
    let text = read("valid.conllu");
    let validator = Validator::new(ValidationConfig::default());
    let mut run = validator.start_run();
    let mut reporter = TextReporter::new(Vec::new()).with_echo(true);
    validator.validate_str(&mut run, "t", &text, &mut reporter);
    assert_eq!(String::from_utf8(reporter.into_inner()).unwrap(), text);
}

#[test]
fn crlf_lines_are_reported_but_validated() {
    let text = read("valid.conllu").replace('\n', "\r\n");
    let ids = test_ids(&text, ValidationConfig::default());
    assert!(!ids.is_empty());
    assert!(ids.iter().all(|id| id == "non-lf-newline"));
}

#[test]
fn unreadable_file_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.conllu");
    let bad = dir.path().join("bad.conllu");
    fs::write(&good, read("valid.conllu")).unwrap();
    fs::write(&bad, read("invalid.conllu")).unwrap();
    let missing = dir.path().join("missing.conllu");

    let validator = Validator::new(ValidationConfig::default());
    let mut run = validator.start_run();
    let summary = validator.validate_paths(&mut run, &[&good, &missing, &bad], &mut NullReporter);

    assert_eq!(summary.files.len(), 3);
    assert!(summary.files[0].summary.passed);
    assert_eq!(summary.files[0].blocks, 2);
    assert_eq!(summary.files[1].blocks, 0);
    assert_eq!(summary.files[1].summary.errors_in(TestClass::Format), 1);
    assert_eq!(summary.files[2].summary.error_count(), 5);
    assert_eq!(summary.summary.error_count(), 6);
    let unreadable: Vec<&Incident> = run
        .aggregator
        .incidents()
        .into_iter()
        .filter(|i| i.test_id == "unreadable-file")
        .collect();
    assert_eq!(unreadable.len(), 1);
    assert_eq!(unreadable[0].file, missing.display().to_string());
}

#[test]
fn per_file_aggregators_merge_like_one_run() {
    let valid = read("valid.conllu");
    let invalid = read("invalid.conllu");
    let validator = Validator::new(ValidationConfig::default());

    let mut sequential = validator.start_run();
    validator.validate_str(&mut sequential, "a", &invalid, &mut NullReporter);
    validator.validate_str(&mut sequential, "b", &valid, &mut NullReporter);

    let mut first = validator.start_run();
    validator.validate_str(&mut first, "a", &invalid, &mut NullReporter);
    let mut second = validator.start_run();
    validator.validate_str(&mut second, "b", &valid, &mut NullReporter);
    first.aggregator.merge(second.aggregator);

    assert_eq!(first.aggregator.counts(), sequential.aggregator.counts());
    assert_eq!(
        first.aggregator.incidents(),
        sequential.aggregator.incidents()
    );
}

#[test]
fn lower_levels_run_fewer_checks() {
    let text = "# text = a\n1\ta\ta\tNOUNZ\t_\t_\t0\troot\t_\t_\n\n";
    assert!(test_ids(text, ValidationConfig::default().with_level(1)).is_empty());
    assert_eq!(
        test_ids(text, ValidationConfig::default().with_level(2)),
        vec!["missing-sent-id", "unknown-upos"]
    );
}
