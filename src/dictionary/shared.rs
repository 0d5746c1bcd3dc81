//! A dictionary that can be replaced while it is being queried.
//!
//! Queries load the current snapshot without locking and keep using it for
//! the whole call. Rebuilds run outside any query path and are serialized by a
//! mutex; the finished dictionary is published with one atomic store.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::{Dictionary, DictionaryConfig, EntityMatch};
use crate::Result;

/// Thread-safe holder of the current [`Dictionary`].
///
/// See `tests::test_concurrent_queries_during_publish` for usage.
pub struct SharedDictionary {
    /// Published snapshot, lock-free reads
    current: ArcSwap<Dictionary>,
    /// Held for the whole duration of a rebuild
    reload_lock: Mutex<()>,
}

impl Default for SharedDictionary {
    fn default() -> Self {
        Self::new(Dictionary::default())
    }
}

impl SharedDictionary {
    pub fn new(dict: Dictionary) -> Self {
        Self {
            current: ArcSwap::from_pointee(dict),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<Dictionary> {
        self.current.load_full()
    }

    /// Replace the current dictionary and return the previous one.
    pub fn publish(&self, dict: Dictionary) -> Arc<Dictionary> {
        let _guard = self.reload_lock.lock();
        self.current.swap(Arc::new(dict))
    }

    /// Build a new dictionary with `build` and publish it. On error the
    /// current dictionary stays in place.
    pub fn rebuild<F>(&self, build: F) -> Result<Arc<Dictionary>>
    where
        F: FnOnce() -> Result<Dictionary>,
    {
        let _guard = self.reload_lock.lock();
        let dict = Arc::new(build()?);
        self.current.store(Arc::clone(&dict));
        Ok(dict)
    }

    pub fn reload_from_dir(&self, dir: &Path, config: &DictionaryConfig) -> Result<Arc<Dictionary>> {
        self.rebuild(|| Dictionary::load_dir(dir, config))
    }

    pub fn find_entries(&self, text: &str) -> BTreeSet<EntityMatch> {
        self.current.load().find_entries(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Entry;
    use crate::TermatonError;
    use std::thread;

    fn dict(entries: &[(&str, &str)]) -> Dictionary {
        Dictionary::from_entries(
            entries.iter().map(|(ids, p)| Entry::new(*ids, *p)),
            &DictionaryConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_dictionary_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dictionary>();
        assert_send_sync::<SharedDictionary>();
    }

    #[test]
    fn test_concurrent_queries_during_publish() {
        let shared = Arc::new(SharedDictionary::new(dict(&[("G1", "p53")])));
        let text = "p53 and BRCA1";

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let found = shared.find_entries(text);
                        assert!(!found.is_empty());
                        assert!(found.iter().all(|m| m.ids == ["G1"] || m.ids == ["G2"]));
                    }
                })
            })
            .collect();

        shared.publish(dict(&[("G1", "p53"), ("G2", "BRCA1")]));
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.find_entries(text).len(), 2);
    }

    #[test]
    fn test_failed_rebuild_keeps_snapshot() {
        let shared = SharedDictionary::new(dict(&[("G1", "p53")]));
        let err = shared
            .rebuild(|| Err(TermatonError::Config("boom".into())))
            .unwrap_err();
        assert!(matches!(err, TermatonError::Config(_)));
        assert_eq!(shared.find_entries("p53").len(), 1);
    }

    #[test]
    fn test_reload_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        dict(&[("D1", "cancer")]).store_dir(dir.path(), "dictionary").unwrap();

        let shared = SharedDictionary::default();
        assert!(shared.find_entries("cancer").is_empty());
        let loaded = shared
            .reload_from_dir(dir.path(), &DictionaryConfig::default())
            .unwrap();
        assert_eq!(loaded.shard_count(), 1);
        assert_eq!(shared.snapshot().find_entries("lung cancer").len(), 1);
    }
}
