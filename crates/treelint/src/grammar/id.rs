//! Classification of the ID column.
//!
//! Every data row is one of three kinds, told apart only by the shape of its
//! ID: a syntactic word (`7`), a multiword token spanning several words
//! (`7-8`), or an empty node inserted after a word (`7.1`). Anything else is
//! malformed and reported once by the row checks.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]*$").expect("valid word id pattern"));

static SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([1-9][0-9]*)-([1-9][0-9]*)$").expect("valid word interval pattern")
});

static EMPTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|[1-9][0-9]*)\.([1-9][0-9]*)$").expect("valid empty node pattern")
});

/// The classified ID of a data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// A syntactic word, numbered from 1.
    Word(usize),
    /// A multiword token covering words `lo..=hi`.
    ///
    /// The classifier accepts any `int-int` shape; reversed or degenerate
    /// intervals are reported by the sequence checks.
    Span {
        /// First covered word.
        lo: usize,
        /// Last covered word.
        hi: usize,
    },
    /// An empty node of the enhanced graph, placed after word `word`.
    Empty {
        /// The word the node follows (`0` before the first word).
        word: usize,
        /// Position among the empty nodes following that word, from 1.
        sub: usize,
    },
    /// An ID that matches none of the shapes above.
    Malformed,
}

impl NodeId {
    /// Classifies the raw text of an ID field.
    #[must_use]
    pub fn classify(field: &str) -> Self {
        if WORD_RE.is_match(field) {
            return field.parse().map_or(Self::Malformed, Self::Word);
        }
        if let Some(caps) = SPAN_RE.captures(field) {
            let lo = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let hi = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if let (Some(lo), Some(hi)) = (lo, hi) {
                return Self::Span { lo, hi };
            }
            return Self::Malformed;
        }
        if let Some(caps) = EMPTY_RE.captures(field) {
            let word = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let sub = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if let (Some(word), Some(sub)) = (word, sub) {
                return Self::Empty { word, sub };
            }
        }
        Self::Malformed
    }

    /// The node key of a word or empty node; spans and malformed IDs have none
    /// because nothing can refer to them.
    #[must_use]
    pub fn node(self) -> Option<Governor> {
        match self {
            Self::Word(n) => Some(Governor { major: n, minor: 0 }),
            Self::Empty { word, sub } => Some(Governor {
                major: word,
                minor: sub,
            }),
            Self::Span { .. } | Self::Malformed => None,
        }
    }

    /// Returns `true` for syntactic words.
    #[must_use]
    pub fn is_word(self) -> bool {
        matches!(self, Self::Word(_))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(n) => write!(f, "{n}"),
            Self::Span { lo, hi } => write!(f, "{lo}-{hi}"),
            Self::Empty { word, sub } => write!(f, "{word}.{sub}"),
            Self::Malformed => f.write_str("?"),
        }
    }
}

/// A referenceable node as an ordered `(major, minor)` key.
///
/// Words are `(n, 0)`, empty nodes `(word, sub)` and the virtual root
/// `(0, 0)`. Ordering is numeric on both parts, so `1.9 < 1.10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Governor {
    /// Word index (or `0` for the root and nodes before the first word).
    pub major: usize,
    /// Empty node index, `0` for words and the root.
    pub minor: usize,
}

impl Governor {
    /// The virtual root every sentence hangs from.
    pub const ROOT: Self = Self { major: 0, minor: 0 };

    /// Returns `true` for the virtual root.
    #[must_use]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}
