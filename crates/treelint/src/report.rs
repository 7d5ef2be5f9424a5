//! Plain-text rendering of a run.

use crate::block::Block;
use crate::incident::{Incident, Reporter};
use std::io::Write;
use tracing::warn;

/// Writes one line per incident, notice and explanation to `out`, and
/// optionally echoes every validated block.
///
/// Write failures are logged and otherwise ignored: a broken output stream
/// must not change the outcome of validation.
pub struct TextReporter<W: Write> {
    out: W,
    echo: bool,
}

impl<W: Write> TextReporter<W> {
    /// A reporter that prints incidents only.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out, echo: false }
    }

    /// Also write each block back out after its incidents.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{text}") {
            warn!(error = %err, "failed to write report line");
        }
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn incident(&mut self, incident: &Incident) {
        self.line(&incident.to_string());
    }

    fn notice(&mut self, message: &str) {
        self.line(message);
    }

    fn explanation(&mut self, text: &str) {
        self.line(&format!("\n{text}\n"));
    }

    fn block(&mut self, block: &Block) {
        if !self.echo {
            return;
        }
        if let Err(err) = block.echo(&mut self.out) {
            warn!(error = %err, "failed to echo block");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::validate::Validator;

    const SENTENCE: &str = "# sent_id = r\n# text = a\n1\ta\ta\tX\t_\t_\t0\troot\t_\t_\n\n";

    #[test]
    fn test_incident_line_format() {
        let text = SENTENCE.replace("\troot\t", "\tdep\t");
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        let mut reporter = TextReporter::new(Vec::new());
        validator.validate_str(&mut run, "in.conllu", &text, &mut reporter);
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            out,
            "[in.conllu Line 3 Sent r Node 1]: [Syntax Error 0-is-not-root] DEPREL must be 'root' if HEAD is 0.\n"
        );
    }

    #[test]
    fn test_echo_reproduces_valid_input() {
        let validator = Validator::new(ValidationConfig::default());
        let mut run = validator.start_run();
        let mut reporter = TextReporter::new(Vec::new()).with_echo(true);
        validator.validate_str(&mut run, "t", SENTENCE, &mut reporter);
        assert!(run.summary().passed);
        assert_eq!(String::from_utf8(reporter.into_inner()).unwrap(), SENTENCE);
    }
}
