use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::repository::{KeyTtl, SeatStore, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process store with lazy expiry, used by tests and local runs.
///
/// Expiry is driven by `tokio::time`, so a paused test clock controls it.
/// Scan cursors remember the last key returned, so keys that stay live for
/// the whole scan are reported whatever expires or is written meanwhile.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
    cursors: Arc<Mutex<HashMap<u64, String>>>,
    next_cursor: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the deadline lies beyond what `Instant` can represent.
    fn deadline(ttl_seconds: u64) -> Option<Instant> {
        Instant::now().checked_add(Duration::from_secs(ttl_seconds))
    }

    /// Drop the entry for `key` if it has expired and return what is left.
    fn live<'a>(entries: &'a mut BTreeMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl SeatStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live(&mut entries, key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at: None });
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: Self::deadline(ttl_seconds) },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        if Self::live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: Self::deadline(ttl_seconds) },
        );
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) if entry.value == expected => {
                entry.value = value.to_string();
                entry.expires_at = ttl_seconds.and_then(Self::deadline);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let matches = Self::live(&mut entries, key).is_some_and(|entry| entry.value == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn persist(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(entry) => Ok(entry.expires_at.take().is_some()),
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut entries = self.entries.lock().await;
        let ttl = match Self::live(&mut entries, key) {
            None => KeyTtl::Missing,
            Some(Entry { expires_at: None, .. }) => KeyTtl::NoExpiry,
            Some(Entry { expires_at: Some(at), .. }) => {
                let millis = at.saturating_duration_since(Instant::now()).as_millis();
                // Rounded to the nearest second
                KeyTtl::Expires(((millis + 500) / 1000) as u64)
            }
        };
        Ok(ttl)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<(u64, Vec<String>)> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));

        let mut cursors = self.cursors.lock().await;
        let after = match cursor {
            0 => None,
            // Unknown or already consumed cursor: nothing left to report
            _ => match cursors.remove(&cursor) {
                Some(key) => Some(key),
                None => return Ok((0, Vec::new())),
            },
        };

        let lower = match &after {
            Some(key) => Bound::Excluded(key.as_str()),
            None => Bound::Unbounded,
        };
        let mut range = entries.range::<str, _>((lower, Bound::Unbounded)).map(|(key, _)| key);
        let page: Vec<&String> = range.by_ref().take(count.max(1)).collect();
        let more = range.next().is_some();

        let keys: Vec<String> = page
            .iter()
            .filter(|key| glob_match(pattern, key))
            .map(|key| key.to_string())
            .collect();

        let next_cursor = match page.last() {
            Some(last) if more => {
                let id = self.next_cursor.fetch_add(1, Ordering::Relaxed) + 1;
                cursors.insert(id, last.to_string());
                id
            }
            _ => 0,
        };
        Ok((next_cursor, keys))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Glob match supporting `*` and `?`, as used by scan patterns.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}
