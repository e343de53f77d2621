//! TTL-bounded store of resolved node identities
//!
//! Entries are keyed by instance id and become unreturnable once their age
//! reaches the TTL. Expired entries are dropped lazily on lookup and by
//! [`IdentityCache::purge_expired`].

use crate::error::{NodebootError, NodebootResult};
use crate::identity::clock::{Clock, SystemClock};
use crate::identity::Info;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default lifetime of a cached identity
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    info: Info,
    inserted_at: Instant,
}

/// Concurrent TTL cache of [`Info`]
#[derive(Debug)]
pub struct IdentityCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace the entry for `info.instance_id`, restarting its TTL
    pub fn put(&self, info: Info) -> NodebootResult<()> {
        let entry = CacheEntry {
            inserted_at: self.clock.now(),
            info,
        };
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        debug!("Caching identity of {}", entry.info.instance_id);
        entries.insert(entry.info.instance_id.clone(), entry);
        Ok(())
    }

    /// Look up a live entry; `None` when absent or expired
    pub fn get(&self, instance_id: &str) -> NodebootResult<Option<Info>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            match entries.get(instance_id) {
                None => return Ok(None),
                Some(entry) if !self.is_expired(entry, now) => return Ok(Some(entry.info.clone())),
                Some(_) => {}
            }
        }

        // Expired: reap it, unless a concurrent put refreshed it meanwhile.
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if let Some(entry) = entries.get(instance_id) {
            if !self.is_expired(entry, now) {
                return Ok(Some(entry.info.clone()));
            }
            debug!("Cached identity of {} expired", instance_id);
            entries.remove(instance_id);
        }
        Ok(None)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> NodebootResult<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        Ok(before - entries.len())
    }

    /// Number of live entries
    pub fn len(&self) -> NodebootResult<usize> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count())
    }

    pub fn is_empty(&self) -> NodebootResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> NodebootResult<()> {
        self.entries.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.ttl
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

fn poisoned() -> NodebootError {
    NodebootError::CacheUnavailable("lock poisoned by a panicked writer".to_string())
}
