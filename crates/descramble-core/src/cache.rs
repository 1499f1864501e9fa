//! Per-instance result cache.
//!
//! Keyed by a content hash, bounded at `CAPACITY` entries. Eviction removes
//! the oldest *inserted* key, not the least recently used one: lookups do not
//! refresh a key's position. Downstream consumers rely on that insertion
//! -order behaviour, so this must not be upgraded to a true LRU.

use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::DeobfuscateResult;

pub const CAPACITY: usize = 100;

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<String, DeobfuscateResult>,
    order: VecDeque<String>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&DeobfuscateResult> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, result: DeobfuscateResult) {
        if self.entries.insert(key.clone(), result).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > CAPACITY {
            match self.order.pop_front() {
                Some(oldest) => {
                    debug!(evicted = %oldest, "cache at capacity, dropping oldest entry");
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Cache key over the leading code fragment plus every flag that changes the
/// stage plan. Two calls differing only beyond the first 1000 characters
/// share a key; that is accepted, matching the original behaviour.
pub fn cache_key(code: &str, flags: &[(&str, bool)]) -> String {
    let head: String = code.chars().take(1000).collect();
    let mut hasher = Sha256::new();
    hasher.update(head.as_bytes());
    for (name, value) in flags {
        hasher.update(name.as_bytes());
        hasher.update(if *value { b"=1;" } else { b"=0;" });
    }
    hex::encode(hasher.finalize())
}
