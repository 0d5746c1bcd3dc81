//! termaton: regular-expression lexicon automata for dictionary-based
//! named-entity recognition.
//!
//! A lexicon of `(identifiers, pattern)` entries is compiled into a handful of
//! deterministic automata whose accept states carry the entries'
//! identifiers. Scanning text against them reports non-overlapping,
//! token-aligned, longest matches.
//!
//! ```
//! use termaton::{Dictionary, DictionaryConfig, Entry};
//!
//! let dict = Dictionary::from_entries(
//!     [Entry::new("G1", "p53|TP53"), Entry::new("D1", "cancer")],
//!     &DictionaryConfig::default(),
//! )
//! .unwrap();
//!
//! let found = dict.find_entries("p53 is linked to cancer");
//! assert_eq!(found.len(), 2);
//! ```
//!
//! - `automaton`: the automaton arena and its algebra
//! - `regexp`: pattern parsing and compilation
//! - `matcher`: longest-match scanning and token boundary policies
//! - `dictionary`: sharded, pruned, persisted lexicons

pub mod automaton;
pub mod dictionary;
pub mod matcher;
pub mod regexp;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use automaton::{Actor, Automaton, RunAutomaton};
pub use dictionary::{
    BuildStats, Dictionary, DictionaryBuilder, DictionaryConfig, EntityMatch, Entry, Record,
    RecordFormat, SharedDictionary, StopTerms,
};
pub use matcher::{find_matches, BoundaryPolicy, GeneTokenBoundary, Match, TokenBoundary};
pub use regexp::{compile_regexp, RegexpError, RegexpErrorKind};

/// Errors that can occur while building, loading or storing dictionaries.
#[derive(Debug, Error)]
pub enum TermatonError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: RegexpError,
    },

    #[error("pattern {pattern:?} matches nothing once stop terms are removed")]
    EmptyAfterPruning { pattern: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Persistence { path: PathBuf, source: io::Error },

    #[error("invalid automaton: {0}")]
    InvalidAutomaton(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TermatonError>;
