use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::report::AggregatedReport;

const CACHE_TARGET: &str = "editguard::cache";

/// Content-addressed key over the file path, its bytes and the full
/// configuration.
pub fn fingerprint<C: Serialize>(path: &Path, content: &[u8], config: &C) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    hasher.update([0u8]);
    // Config types are plain data; serialization cannot fail for them.
    hasher.update(serde_json::to_vec(config).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    report: AggregatedReport,
    inserted_at: Instant,
    sequence: u64,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

/// In-memory validation cache shared by every orchestrator in the process.
///
/// Entries expire after the TTL. Once the map grows past `max_entries`, the
/// earliest inserted entries are evicted first; reads do not refresh an
/// entry's position.
pub struct ValidationCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    max_entries: usize,
}

impl ValidationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_sequence: 0,
            }),
            ttl,
            max_entries,
        }
    }

    /// Returns a copy of a live entry, marked `cached`.
    pub fn get(&self, key: &str) -> Option<AggregatedReport> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match state.entries.get(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
        };
        if expired {
            debug!(target: CACHE_TARGET, key, "dropping expired entry");
            state.entries.remove(key);
            return None;
        }
        state.entries.get(key).map(|entry| {
            let mut report = entry.report.clone();
            report.cached = true;
            report
        })
    }

    pub fn insert(&self, key: String, report: &AggregatedReport) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut report = report.clone();
        report.cached = false;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                report,
                inserted_at: Instant::now(),
                sequence,
            },
        );

        while state.entries.len() > self.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.sequence)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!(target: CACHE_TARGET, key = %key, "evicting oldest entry");
                    state.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .clear();
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
