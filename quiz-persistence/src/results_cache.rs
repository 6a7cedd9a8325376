use quiz_types::GameResults;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    expires_at: Instant,
    results: GameResults,
}

/// Short-TTL in-process cache for finalized game results, so post-game
/// result views do not recompute aggregates from history rows. Expired
/// entries are evicted lazily on access.
pub struct ResultsCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResultsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn set(&self, key: &str, results: GameResults) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, entry| entry.expires_at > Instant::now());
        entries.insert(
            key.to_string(),
            CacheEntry {
                expires_at: Instant::now() + self.ttl,
                results,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<GameResults> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.results.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}
