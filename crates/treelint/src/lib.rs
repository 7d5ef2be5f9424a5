//! A validator for tab-separated dependency treebank files.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

/// Segmentation of input into sentence blocks and rows.
///
/// The reader never fails on malformed content. Anything odd about a line
/// is attached to its block as an issue, and only I/O failures surface as
/// errors.
pub mod block;

/// Run configuration and its JSON loader.
pub mod config;

/// Lexical grammar of the format.
///
/// Precompiled, stateless patterns for IDs, heads, relations, features and
/// metadata comments. Everything else in the crate reads fields through
/// these.
pub mod grammar;

/// Incident records, counting, suppression and storage.
pub mod incident;

/// Plain-text reporting.
pub mod report;

/// Language-specific permitted values.
pub mod tags;

/// The leveled check pipeline.
///
/// Checks are plain data filtered by level. A check whose prerequisite
/// already failed in the current block does not run, so one malformed ID
/// cannot cascade into dozens of meaningless tree errors.
pub mod validate;

pub use block::{Block, BlockReader, Column, ReadError, Row};
pub use config::{ConfigError, ValidationConfig};
pub use grammar::{Governor, NodeId};
pub use incident::{
    Aggregator, Incident, NullReporter, Reporter, Severity, Summary, TestClass,
};
pub use report::TextReporter;
pub use tags::{PermissiveTags, TagCategory, TagDatabase, TagTable};
pub use validate::{FileSummary, RunState, RunSummary, SentenceIds, Tree, TreeError, Validator};
