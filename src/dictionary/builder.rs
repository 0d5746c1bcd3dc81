//! Incremental dictionary construction.
//!
//! Entries are buffered until a batch reaches `max_patterns_per_shard` (or a
//! [`Record::ShardBreak`] arrives). A full batch is compiled and pruned in
//! parallel, one automaton per entry, then unioned and determinized into one
//! shard. A failing entry is logged and left out; it never affects the other
//! entries of its batch.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use super::records::{read_records, Entry, Record, RecordFormat};
use super::{persistence_error, Dictionary, DictionaryConfig, StopTerms};
use crate::automaton::{
    is_empty, is_empty_string, minus, save_automaton, union_all, Actor, Automaton, RunAutomaton,
};
use crate::regexp::compile_regexp;
use crate::{Result, TermatonError};

const PROGRESS_INTERVAL: usize = 10_000;

/// Counters collected while building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Entries handed to the builder.
    pub entries: usize,
    /// Entries compiled into a shard.
    pub compiled: usize,
    /// Entries whose pattern failed to compile or carried no identifier.
    pub skipped_invalid: usize,
    /// Entries that matched nothing once stop terms were removed.
    pub skipped_empty: usize,
    pub shards: usize,
    /// Total states over all shards.
    pub states: usize,
}

/// Builds a [`Dictionary`] shard by shard.
pub struct DictionaryBuilder {
    config: DictionaryConfig,
    stop_terms: StopTerms,
    pending: Vec<Entry>,
    shards: Vec<RunAutomaton>,
    stats: BuildStats,
    store: Option<PathBuf>,
}

impl DictionaryBuilder {
    pub fn new(config: DictionaryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pending: Vec::with_capacity(config.max_patterns_per_shard.min(PROGRESS_INTERVAL)),
            config,
            stop_terms: StopTerms::new(),
            shards: Vec::new(),
            stats: BuildStats::default(),
            store: None,
        })
    }

    pub fn with_stop_terms(mut self, stop_terms: StopTerms) -> Self {
        self.stop_terms = stop_terms;
        self
    }

    /// Load stop terms from a file, lower-casing them if configured.
    pub fn load_stop_terms(self, path: &Path) -> Result<Self> {
        let stop_terms = StopTerms::load(path, self.config.lowercase_stop_terms)?;
        info!("loaded {} stop terms from {}", stop_terms.len(), path.display());
        Ok(self.with_stop_terms(stop_terms))
    }

    /// Persist every shard into `dir` as soon as it is completed.
    pub fn store_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store = Some(dir.into());
        self
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        self.stats.entries += 1;
        if self.stats.entries % PROGRESS_INTERVAL == 0 {
            info!("read {} entries", self.stats.entries);
        }
        if Actor::from_ids(&entry.ids).is_none() {
            warn!("skipping pattern {:?}: no identifier", entry.pattern);
            self.stats.skipped_invalid += 1;
            return Ok(());
        }
        self.pending.push(entry);
        if self.pending.len() >= self.config.max_patterns_per_shard {
            self.close_shard()?;
        }
        Ok(())
    }

    pub fn add_record(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Entry(entry) => self.add_entry(entry),
            Record::ShardBreak => self.close_shard(),
        }
    }

    pub fn add_records<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.add_record(record)?;
        }
        Ok(())
    }

    /// Read every record of a lexicon file.
    pub fn add_file(&mut self, path: &Path, format: RecordFormat) -> Result<()> {
        let file = File::open(path).map_err(|e| persistence_error(path, e))?;
        for record in read_records(BufReader::new(file), format) {
            let record = record.map_err(|e| persistence_error(path, e))?;
            self.add_record(record)?;
        }
        Ok(())
    }

    /// Compile the pending batch into a shard. Does nothing if the batch is
    /// empty.
    pub fn close_shard(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let instant = Instant::now();
        let batch = std::mem::take(&mut self.pending);
        let stop_terms = &self.stop_terms;
        let minimize = self.config.minimize;

        let compiled: Vec<Result<Automaton>> = batch
            .par_iter()
            .map(|entry| compile_entry(entry, stop_terms, minimize))
            .collect();

        let mut automata = Vec::with_capacity(compiled.len());
        for result in compiled {
            match result {
                Ok(a) => automata.push(a),
                Err(e @ TermatonError::EmptyAfterPruning { .. }) => {
                    warn!("dropping entry: {e}");
                    self.stats.skipped_empty += 1;
                }
                Err(e) => {
                    warn!("skipping entry: {e}");
                    self.stats.skipped_invalid += 1;
                }
            }
        }
        self.stats.compiled += automata.len();
        if automata.is_empty() {
            info!("batch of {} entries produced no shard", batch.len());
            return Ok(());
        }

        let mut shard = union_all(automata.iter());
        drop(automata);
        shard.determinize();
        if minimize {
            shard.minimize();
        }

        let n = self.shards.len();
        if let Some(dir) = &self.store {
            fs::create_dir_all(dir).map_err(|e| persistence_error(dir, e))?;
            let path = dir.join(format!("{}{n}", self.config.shard_prefix));
            save_automaton(&path, &shard).map_err(|e| persistence_error(&path, e))?;
        }

        let table = RunAutomaton::new(&shard);
        self.stats.shards += 1;
        self.stats.states += table.len();
        info!(
            "shard {n}: {} entries in {} ms",
            batch.len(),
            instant.elapsed().as_millis()
        );
        debug!(
            "shard {n}: {} states, {} transitions",
            shard.num_states(),
            shard.num_transitions()
        );
        self.shards.push(table);
        Ok(())
    }

    pub fn build(self) -> Result<Dictionary> {
        self.build_with_stats().map(|(dict, _)| dict)
    }

    pub fn build_with_stats(mut self) -> Result<(Dictionary, BuildStats)> {
        self.close_shard()?;
        debug!("build stats: {:?}", self.stats);
        let dict = Dictionary::new(self.shards, self.config.boundary);
        Ok((dict, self.stats))
    }
}

/// Compile one entry, remove its stop terms and tag its accept states.
fn compile_entry(entry: &Entry, stop_terms: &StopTerms, minimize: bool) -> Result<Automaton> {
    let mut a = compile_regexp(&entry.pattern).map_err(|source| TermatonError::Pattern {
        pattern: entry.pattern.clone(),
        source,
    })?;
    if let Some(exclusion) = stop_terms.exclusion_for(&a) {
        a = minus(&a, &exclusion);
        a.minimize();
        if is_empty(&a) || is_empty_string(&a) {
            return Err(TermatonError::EmptyAfterPruning {
                pattern: entry.pattern.clone(),
            });
        }
    } else if minimize {
        a.minimize();
    }
    a.tag_accept_states(&Actor::from_ids(&entry.ids));
    Ok(a)
}
