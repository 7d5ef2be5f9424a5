//! Segmentation of an input stream into sentence blocks.
//!
//! A [`BlockReader`] pulls lines from any [`BufRead`] source and groups them
//! into [`Block`]s: leading comment lines followed by tab-separated data rows,
//! terminated by a blank line. Structural problems met while reading (stray
//! blank lines, comments between rows, wrong column counts, bad line endings)
//! never stop the reader; they are attached to the block as [`LineIssue`]s and
//! turned into incidents by the validator.

use crate::grammar::NodeId;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Number of tab-separated columns in a well-formed row.
pub const COLUMN_COUNT: usize = 10;

/// The ten columns of a data row, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Word index, interval or empty node index.
    Id,
    /// Surface form.
    Form,
    /// Lemma or stem.
    Lemma,
    /// Universal part-of-speech tag.
    Upos,
    /// Language-specific part-of-speech tag.
    Xpos,
    /// Morphological features.
    Feats,
    /// Head of the basic dependency.
    Head,
    /// Basic dependency relation.
    Deprel,
    /// Enhanced dependency graph.
    Deps,
    /// Any other annotation.
    Misc,
}

impl Column {
    /// All columns in file order.
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Id,
        Column::Form,
        Column::Lemma,
        Column::Upos,
        Column::Xpos,
        Column::Feats,
        Column::Head,
        Column::Deprel,
        Column::Deps,
        Column::Misc,
    ];

    /// The conventional upper-case column name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Form => "FORM",
            Column::Lemma => "LEMMA",
            Column::Upos => "UPOS",
            Column::Xpos => "XPOS",
            Column::Feats => "FEATS",
            Column::Head => "HEAD",
            Column::Deprel => "DEPREL",
            Column::Deps => "DEPS",
            Column::Misc => "MISC",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One data row, split on tabs.
///
/// Rows with the wrong number of fields are kept as read; [`Row::field`]
/// returns an empty string for any column the row does not have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    line: usize,
    fields: Vec<String>,
    id: NodeId,
}

impl Row {
    /// Builds a row from its raw fields.
    #[must_use]
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        let id = NodeId::classify(fields.first().map_or("", String::as_str));
        Self { line, fields, id }
    }

    /// Splits a raw line on tabs.
    #[must_use]
    pub fn parse(line: usize, text: &str) -> Self {
        Self::new(line, text.split('\t').map(str::to_string).collect())
    }

    /// The 1-based input line the row was read from.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// The classified ID.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The content of `column`, or `""` when the row is too short.
    #[must_use]
    pub fn field(&self, column: Column) -> &str {
        self.fields.get(column.index()).map_or("", String::as_str)
    }

    /// All fields as read, including any beyond the tenth.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// A raw comment line and where it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    /// 1-based input line.
    pub line: usize,
    /// The line text without its line terminator.
    pub text: String,
}

/// Problems found by the reader itself, before any check runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// A blank line where no sentence was open.
    ExtraEmptyLine,
    /// A separator line consisting only of whitespace.
    PseudoEmptyLine,
    /// A comment line after the first data row.
    MisplacedComment,
    /// A data row that does not have ten fields.
    ColumnCount(usize),
    /// A line terminated by `\r\n`.
    NonLfNewline,
    /// The last line of the input has no terminator.
    MissingFinalNewline,
    /// The line was not valid UTF-8 and has been decoded lossily.
    InvalidUnicode,
}

/// A reader problem anchored to an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIssue {
    /// 1-based input line.
    pub line: usize,
    /// What went wrong.
    pub kind: IssueKind,
}

/// One sentence: its comments, its rows and everything the reader noticed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Comment lines, in input order.
    pub comments: Vec<CommentLine>,
    /// Data rows, in input order.
    pub rows: Vec<Row>,
    /// Line of the first comment, row or issue of the block.
    pub first_line: usize,
    /// Whether a blank line closed the block.
    pub terminated: bool,
    /// Reader problems, in input order.
    pub issues: Vec<LineIssue>,
}

impl Block {
    fn is_untouched(&self) -> bool {
        self.comments.is_empty() && self.rows.is_empty() && self.issues.is_empty()
    }

    fn touch(&mut self, line: usize) {
        if self.first_line == 0 {
            self.first_line = line;
        }
    }

    /// Writes the block back out: comments, tab-joined rows and a blank line.
    ///
    /// # Errors
    ///
    /// Propagates any error of the underlying writer.
    pub fn echo<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for comment in &self.comments {
            writeln!(out, "{}", comment.text)?;
        }
        for row in &self.rows {
            writeln!(out, "{}", row.fields().join("\t"))?;
        }
        writeln!(out)
    }
}

/// Errors that stop reading a single input.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The input could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// The path that failed.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading failed part-way through the input.
    #[error("read failed after line {line}: {source}")]
    Io {
        /// Last line read successfully.
        line: usize,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A lazy, single-pass iterator of [`Block`]s over a line source.
pub struct BlockReader<R> {
    input: R,
    line: usize,
    buf: Vec<u8>,
    pending: Block,
    done: bool,
}

impl<R: BufRead> BlockReader<R> {
    /// Wraps a buffered input.
    #[must_use]
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: 0,
            buf: Vec::new(),
            pending: Block::default(),
            done: false,
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.line
    }

    fn issue(&mut self, kind: IssueKind) {
        let line = self.line;
        self.pending.touch(line);
        self.pending.issues.push(LineIssue { line, kind });
    }

    /// Reads one line into a string, recording terminator and encoding
    /// problems. Returns `None` at end of input.
    fn next_line(&mut self) -> Result<Option<String>, ReadError> {
        self.buf.clear();
        let read = self
            .input
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| ReadError::Io {
                line: self.line,
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        } else {
            self.issue(IssueKind::MissingFinalNewline);
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
            self.issue(IssueKind::NonLfNewline);
        }
        let text = match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(text) => text,
            Err(err) => {
                self.issue(IssueKind::InvalidUnicode);
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        Ok(Some(text))
    }

    fn read_block(&mut self) -> Result<Option<Block>, ReadError> {
        while let Some(text) = self.next_line()? {
            let line = self.line;
            if text.trim().is_empty() {
                if !text.is_empty() {
                    self.issue(IssueKind::PseudoEmptyLine);
                }
                if self.pending.rows.is_empty() {
                    self.issue(IssueKind::ExtraEmptyLine);
                    continue;
                }
                let mut block = std::mem::take(&mut self.pending);
                block.terminated = true;
                return Ok(Some(block));
            }
            self.pending.touch(line);
            if text.starts_with('#') {
                if !self.pending.rows.is_empty() {
                    self.issue(IssueKind::MisplacedComment);
                }
                self.pending.comments.push(CommentLine { line, text });
                continue;
            }
            let row = Row::parse(line, &text);
            if row.fields().len() != COLUMN_COUNT {
                self.issue(IssueKind::ColumnCount(row.fields().len()));
            }
            self.pending.rows.push(row);
        }
        self.done = true;
        if self.pending.is_untouched() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.pending)))
    }
}

impl<R: BufRead> Iterator for BlockReader<R> {
    type Item = Result<Block, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_block() {
            Ok(block) => block.map(Ok),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn blocks(text: &str) -> Vec<Block> {
        BlockReader::new(Cursor::new(text.as_bytes().to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn row(id: &str, form: &str, head: &str, deprel: &str) -> String {
        format!("{id}\t{form}\t_\tX\t_\t_\t{head}\t{deprel}\t_\t_")
    }

    #[test]
    fn test_splits_on_blank_lines() {
        let text = format!(
            "# sent_id = a\n{}\n\n# sent_id = b\n{}\n{}\n\n",
            row("1", "x", "0", "root"),
            row("1", "y", "0", "root"),
            row("2", "z", "1", "dep"),
        );
        let blocks = blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].first_line, 1);
        assert_eq!(blocks[1].first_line, 4);
        assert_eq!(blocks[1].rows.len(), 2);
        assert_eq!(blocks[1].rows[1].line(), 6);
        assert!(blocks.iter().all(|b| b.terminated && b.issues.is_empty()));
    }

    #[test]
    fn test_counts_lines_read() {
        let text = format!("# sent_id = a\n{}\n\n", row("1", "x", "0", "root"));
        let mut reader = BlockReader::new(Cursor::new(text.into_bytes()));
        assert_eq!(reader.lines_read(), 0);
        assert_eq!(reader.by_ref().count(), 1);
        assert_eq!(reader.lines_read(), 3);
    }

    #[test]
    fn test_unterminated_last_block_is_still_emitted() {
        let text = format!("{}\n", row("1", "x", "0", "root"));
        let blocks = blocks(&text);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].terminated);
    }

    #[test]
    fn test_extra_empty_lines_do_not_split() {
        let text = format!("\n# c\n\n{}\n\n", row("1", "x", "0", "root"));
        let blocks = blocks(&text);
        assert_eq!(blocks.len(), 1);
        let kinds: Vec<_> = blocks[0].issues.iter().map(|i| (i.line, i.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![(1, IssueKind::ExtraEmptyLine), (3, IssueKind::ExtraEmptyLine)]
        );
        assert_eq!(blocks[0].comments.len(), 1);
    }

    #[test]
    fn test_misplaced_comment_is_retained() {
        let text = format!(
            "{}\n# late\n{}\n\n",
            row("1", "x", "0", "root"),
            row("2", "y", "1", "dep")
        );
        let blocks = blocks(&text);
        assert_eq!(blocks[0].comments[0].text, "# late");
        assert_eq!(
            blocks[0].issues,
            vec![LineIssue {
                line: 2,
                kind: IssueKind::MisplacedComment
            }]
        );
    }

    #[test]
    fn test_wrong_column_count_keeps_row() {
        let blocks = blocks("1\tx\t_\n\n");
        assert_eq!(blocks[0].rows.len(), 1);
        assert_eq!(blocks[0].rows[0].field(Column::Head), "");
        assert_eq!(blocks[0].issues[0].kind, IssueKind::ColumnCount(3));
    }

    #[test]
    fn test_line_endings_and_encoding() {
        let mut bytes = format!("{}\r\n", row("1", "x", "0", "root")).into_bytes();
        bytes.extend_from_slice(b"\n# \xff");
        let blocks: Vec<_> = BlockReader::new(Cursor::new(bytes))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].issues[0].kind, IssueKind::NonLfNewline);
        assert_eq!(blocks[0].rows[0].field(Column::Misc), "_");
        let kinds: Vec<_> = blocks[1].issues.iter().map(|i| i.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::MissingFinalNewline, IssueKind::InvalidUnicode]
        );
        assert!(blocks[1].rows.is_empty());
    }

    #[test]
    fn test_whitespace_only_separator() {
        let text = format!("{}\n \n", row("1", "x", "0", "root"));
        let blocks = blocks(&text);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].terminated);
        assert_eq!(blocks[0].issues[0].kind, IssueKind::PseudoEmptyLine);
    }

    #[test]
    fn test_echo_reproduces_rows() {
        let text = format!("# sent_id = a\n{}\n\n", row("1", "x", "0", "root"));
        let blocks = blocks(&text);
        let mut out = Vec::new();
        blocks[0].echo(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);
    }
}
