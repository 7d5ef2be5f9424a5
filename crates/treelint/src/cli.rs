//! Command-line validator for treebank files.
//!
//! Validates the files given as arguments (or standard input when there are
//! none), prints incidents to standard output and a verdict to standard
//! error. Exits with 0 when no error was found, 1 when validation failed and
//! 2 when the command line or configuration is unusable.

#![allow(clippy::multiple_crate_versions)]

use facet::Facet;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use treelint::{
    Incident, Reporter, RunState, Summary, TextReporter, ValidationConfig, Validator,
};

#[derive(Facet, Debug)]
struct Args {
    /// Files to validate; standard input when empty.
    #[facet(positional, default)]
    files: Vec<String>,

    /// Default language code.
    #[facet(named, default)]
    lang: Option<String>,

    /// Validation level, 1 to 5.
    #[facet(named, default)]
    level: Option<u8>,

    /// Incidents printed per class before suppression; 0 for all.
    #[facet(named, default)]
    max_err: Option<usize>,

    /// Print nothing; only the exit code tells the result.
    #[facet(named, short = 'q', default)]
    quiet: bool,

    /// Print incidents as JSON objects, one per line.
    #[facet(named, default)]
    json: bool,

    /// Echo the input after the incidents of each sentence.
    #[facet(named, default)]
    echo: bool,

    /// Accept sentences with more than one word attached to the root.
    #[facet(named, default)]
    allow_multiple_roots: bool,

    /// JSON configuration file; command-line options override it.
    #[facet(named, default)]
    config: Option<String>,
}

/// Prints one JSON object per incident; notices go to stderr.
struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn incident(&mut self, incident: &Incident) {
        if let Err(err) = writeln!(self.out, "{}", facet_json::to_string(incident)) {
            tracing::warn!(error = %err, "failed to write incident");
        }
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

fn load_config(args: &Args) -> Result<ValidationConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|err| format!("cannot read config {path}: {err}"))?;
            ValidationConfig::from_json(&json).map_err(|err| err.to_string())?
        }
        None => ValidationConfig::default(),
    };
    if let Some(level) = args.level {
        let level = treelint::config::checked_level(level).map_err(|err| err.to_string())?;
        config = config.with_level(level);
    }
    if let Some(lang) = &args.lang {
        config = config.with_lang(lang.as_str());
    }
    if let Some(max) = args.max_err {
        config = config.with_max_errors_per_class(max);
    }
    if args.quiet {
        config = config.with_quiet(true);
    }
    if args.allow_multiple_roots {
        config = config.with_single_root(false);
    }
    Ok(config)
}

fn run(validator: &Validator, files: &[String], reporter: &mut dyn Reporter) -> RunState {
    let mut run = validator.start_run();
    if files.is_empty() {
        let stdin = io::stdin();
        if let Err(err) = validator.validate_reader(&mut run, "-", stdin.lock(), reporter) {
            tracing::error!(error = %err, "standard input abandoned");
            let mut incident = Incident::error(
                treelint::TestClass::Format,
                "unreadable-file",
                err.to_string(),
            );
            incident.file = "-".to_string();
            run.aggregator.submit(incident, reporter);
        }
    } else {
        let summary = validator.validate_paths(&mut run, files, reporter);
        debug!(files = summary.files.len(), "all files done");
    }
    run
}

fn verdict(summary: &Summary) {
    if summary.passed {
        eprintln!("*** PASSED ***");
        return;
    }
    for class in &summary.errors {
        eprintln!("{} errors: {}", class.class, class.count);
    }
    eprintln!("*** FAILED *** with {} errors", summary.error_count());
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Args = match facet_args::from_std_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let quiet = config.quiet;
    let validator = Validator::new(config);

    let stdout = io::stdout();
    let state = if args.json {
        let mut reporter = JsonReporter { out: stdout.lock() };
        run(&validator, &args.files, &mut reporter)
    } else {
        let mut reporter = TextReporter::new(stdout.lock()).with_echo(args.echo);
        run(&validator, &args.files, &mut reporter)
    };

    let summary = state.summary();
    if !quiet {
        verdict(&summary);
    }
    if summary.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
