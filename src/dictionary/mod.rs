//! Lexicon dictionaries: build, shard, prune, persist and query.
//!
//! A [`Dictionary`] owns one frozen [`RunAutomaton`] per shard. Queries walk
//! all shards from each candidate start and keep the longest match among
//! them, so a sharded dictionary reports exactly what one automaton over all
//! entries would. Results come back as an ordered, deduplicated set of
//! [`EntityMatch`] records. Dictionaries are built with a
//! [`DictionaryBuilder`] from lexicon records, or reloaded from a directory of
//! serialized shards without recompiling any pattern.
//!
//! # Module Organization
//!
//! - `records`: lexicon line formats and record readers
//! - `builder`: per-entry compilation, pruning and sharding
//! - `shared`: atomically swappable dictionary for long-running servers

mod builder;
mod records;
mod shared;

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::automaton::{load_automaton, save_automaton, union_all, Actor, Automaton, RunAutomaton};
use crate::matcher::{longest_match_at, next_char_boundary, BoundaryPolicy, TokenBoundary};
use crate::{Result, TermatonError};

pub use builder::{BuildStats, DictionaryBuilder};
pub use records::{
    escape_xml, parse_line, parse_mwt_line, parse_tsv_line, read_records, unescape_xml, Entry,
    Record, RecordFormat, SHARD_MARKER,
};
pub use shared::SharedDictionary;

/// Default number of patterns per shard.
pub const DEFAULT_MAX_PATTERNS_PER_SHARD: usize = 10_000;

/// Default file name prefix of persisted shards.
pub const DEFAULT_SHARD_PREFIX: &str = "dictionary";

pub(crate) fn persistence_error(path: &Path, source: io::Error) -> TermatonError {
    if source.kind() == io::ErrorKind::InvalidData {
        TermatonError::InvalidAutomaton(format!("{}: {source}", path.display()))
    } else {
        TermatonError::Persistence {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Dictionary build and query settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DictionaryConfig {
    /// Upper bound on entries compiled into one shard.
    pub max_patterns_per_shard: usize,
    /// Token boundary policy used by [`Dictionary::find_entries`].
    pub boundary: BoundaryPolicy,
    /// Minimize each entry and each shard after determinization.
    pub minimize: bool,
    /// Lower-case stop terms as they are loaded.
    pub lowercase_stop_terms: bool,
    /// File name prefix of persisted shards.
    pub shard_prefix: String,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            max_patterns_per_shard: DEFAULT_MAX_PATTERNS_PER_SHARD,
            boundary: BoundaryPolicy::default(),
            minimize: true,
            lowercase_stop_terms: false,
            shard_prefix: DEFAULT_SHARD_PREFIX.to_string(),
        }
    }
}

impl DictionaryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TermatonError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| persistence_error(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_patterns_per_shard == 0 {
            return Err(TermatonError::Config(
                "max_patterns_per_shard must be at least 1".into(),
            ));
        }
        if self.shard_prefix.is_empty() || self.shard_prefix.contains(['/', '\\']) {
            return Err(TermatonError::Config(format!(
                "invalid shard_prefix {:?}",
                self.shard_prefix
            )));
        }
        Ok(())
    }
}

/// Terms that dictionary entries must never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopTerms {
    terms: BTreeSet<String>,
}

impl StopTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms<I, S>(terms: I, lowercase: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| if lowercase { t.to_lowercase() } else { t })
            .collect();
        Self { terms }
    }

    /// One term per line; blank lines and `#` comments are skipped.
    pub fn from_lines<R: BufRead>(reader: R, lowercase: bool) -> io::Result<Self> {
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim_start().starts_with('#') {
                lines.push(line);
            }
        }
        Ok(Self::from_terms(lines, lowercase))
    }

    pub fn load(path: &Path, lowercase: bool) -> Result<Self> {
        let file = File::open(path).map_err(|e| persistence_error(path, e))?;
        Self::from_lines(BufReader::new(file), lowercase).map_err(|e| persistence_error(path, e))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Automaton of the stop terms that `a` accepts, if any.
    pub(crate) fn exclusion_for(&self, a: &Automaton) -> Option<Automaton> {
        let hits: Vec<Automaton> = self
            .terms
            .iter()
            .filter(|t| crate::automaton::run(a, t))
            .map(|t| Automaton::from_string(t))
            .collect();
        match hits.len() {
            0 => None,
            1 => hits.into_iter().next(),
            _ => Some(union_all(hits.iter())),
        }
    }
}

/// One identified occurrence of a dictionary entry.
///
/// Ordering is by span, then identifiers, then text. The span is kept both
/// in UTF-8 bytes, for slicing the query, and in characters, for the
/// rendered record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityMatch {
    /// Byte offset of the first character.
    pub start: usize,
    /// Exclusive byte offset of the end.
    pub end: usize,
    /// Character index of the first character.
    pub char_start: usize,
    /// Exclusive character index of the end.
    pub char_end: usize,
    /// Sorted, deduplicated identifiers.
    pub ids: Vec<String>,
    pub text: String,
}

impl EntityMatch {
    pub fn joined_ids(&self) -> String {
        self.ids.join(";")
    }

    /// The delimited record consumed by lookup clients.
    pub fn record(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EntityMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<entity ids=\"{}\" startIndex=\"{}\" endIndex=\"{}\">{}</entity>",
            escape_xml(&self.joined_ids()),
            self.char_start,
            self.char_end.saturating_sub(1),
            escape_xml(&self.text)
        )
    }
}

/// A queryable lexicon made of independently built shards.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    shards: Vec<RunAutomaton>,
    boundary: BoundaryPolicy,
}

impl Dictionary {
    pub fn new(shards: Vec<RunAutomaton>, boundary: BoundaryPolicy) -> Self {
        Self { shards, boundary }
    }

    /// Build from entries, sharding and pruning per `config`.
    pub fn from_entries<I>(entries: I, config: &DictionaryConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut builder = DictionaryBuilder::new(config.clone())?;
        for entry in entries {
            builder.add_entry(entry)?;
        }
        builder.build()
    }

    /// Build from a lexicon file.
    pub fn from_records_file(
        path: &Path,
        format: RecordFormat,
        config: &DictionaryConfig,
        stop_terms: StopTerms,
    ) -> Result<Self> {
        let mut builder = DictionaryBuilder::new(config.clone())?.with_stop_terms(stop_terms);
        builder.add_file(path, format)?;
        builder.build()
    }

    /// Load every regular file in `dir`, in lexical order, as one shard.
    pub fn load_dir(dir: &Path, config: &DictionaryConfig) -> Result<Self> {
        let instant = Instant::now();
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| persistence_error(dir, e))? {
            let entry = entry.map_err(|e| persistence_error(dir, e))?;
            let file_type = entry.file_type().map_err(|e| persistence_error(&entry.path(), e))?;
            if file_type.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut shards = Vec::with_capacity(paths.len());
        for path in &paths {
            let a = load_automaton(path).map_err(|e| persistence_error(path, e))?;
            shards.push(RunAutomaton::new(&a));
        }
        log::info!(
            "loaded {} shards from {} in {} ms",
            shards.len(),
            dir.display(),
            instant.elapsed().as_millis()
        );
        Ok(Self::new(shards, config.boundary))
    }

    /// Write every shard to `dir` as `<prefix><n>`.
    pub fn store_dir(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| persistence_error(dir, e))?;
        let mut written = Vec::with_capacity(self.shards.len());
        for (n, shard) in self.shards.iter().enumerate() {
            let path = dir.join(format!("{prefix}{n}"));
            save_automaton(&path, &shard.to_automaton()).map_err(|e| persistence_error(&path, e))?;
            written.push(path);
        }
        Ok(written)
    }

    pub fn shards(&self) -> &[RunAutomaton] {
        &self.shards
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Longest match over all shards starting at `start`. Shards that end
    /// their match at the same position contribute to one merged actor, as
    /// a single automaton over all entries would.
    fn longest_at(
        &self,
        text: &str,
        boundary: &dyn TokenBoundary,
        start: usize,
    ) -> Option<(usize, Actor)> {
        let mut best: Option<(usize, Actor)> = None;
        for shard in &self.shards {
            let Some(waypoint) = longest_match_at(shard, boundary, text, start) else {
                continue;
            };
            let actor = shard.actor(waypoint.state);
            best = match best.take() {
                Some((end, merged)) if end == waypoint.end => Some((end, merged.merge(actor))),
                Some((end, merged)) if end > waypoint.end => Some((end, merged)),
                _ => Some((waypoint.end, actor.clone())),
            };
        }
        best
    }

    /// Non-overlapping matches in `text` under `boundary`, scanning all
    /// shards together. Matches without identifiers are dropped.
    pub fn matches<'a>(
        &'a self,
        text: &'a str,
        boundary: &'a dyn TokenBoundary,
    ) -> impl Iterator<Item = EntityMatch> + 'a {
        let mut start = 0;
        // byte offset and character index of the last reported match start
        let mut cursor = (0, 0);
        std::iter::from_fn(move || {
            while start < text.len() {
                let at = start;
                if boundary.is_start(text, at) {
                    if let Some((end, actor)) = self.longest_at(text, boundary, at) {
                        start = end;
                        if actor.is_none() {
                            continue;
                        }
                        let char_start = cursor.1 + text[cursor.0..at].chars().count();
                        cursor = (at, char_start);
                        return Some(EntityMatch {
                            start: at,
                            end,
                            char_start,
                            char_end: char_start + text[at..end].chars().count(),
                            ids: actor.ids().iter().map(|id| id.to_string()).collect(),
                            text: text[at..end].to_string(),
                        });
                    }
                }
                start = next_char_boundary(text, at);
            }
            None
        })
    }

    /// All entries found in `text` under the configured boundary policy.
    pub fn find_entries(&self, text: &str) -> BTreeSet<EntityMatch> {
        self.find_entries_with(text, self.boundary.boundary())
    }

    pub fn find_entries_with(
        &self,
        text: &str,
        boundary: &dyn TokenBoundary,
    ) -> BTreeSet<EntityMatch> {
        self.matches(text, boundary).collect()
    }

    /// Rendered records of [`Dictionary::find_entries`].
    pub fn identified_entries(&self, text: &str) -> BTreeSet<String> {
        self.find_entries(text).iter().map(EntityMatch::record).collect()
    }
}
