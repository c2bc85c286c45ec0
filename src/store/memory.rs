use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use snafu::OptionExt as _;
use tokio::time::Instant;

use super::{KeyValueStore, NotAnIntegerSnafu, Result};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

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

/// Process-local store.
///
/// Counts live only as long as the process and are not shared between
/// instances. Reads ignore expired entries; writes evict them in a sweep
/// at most once per [SWEEP_INTERVAL].
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    next_sweep: Mutex<Instant>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_sweep: Mutex::new(Instant::now() + SWEEP_INTERVAL),
        }
    }

    /// Drops every expired entry once the sweep interval has passed.
    ///
    /// Must not be called while holding a guard into `entries`.
    fn sweep(&self, now: Instant) {
        let Ok(mut next_sweep) = self.next_sweep.lock() else {
            return;
        };
        if now < *next_sweep {
            return;
        }
        *next_sweep = now + SWEEP_INTERVAL;
        drop(next_sweep);

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        tracing::trace!(evicted = before.saturating_sub(self.entries.len()), "swept expired entries");
    }

    fn read(&self, key: &str, now: Instant) -> Option<String> {
        let entry = self.entries.get(key)?;
        entry.is_live(now).then(|| entry.value.clone())
    }

    fn parse(key: &str, value: &str) -> Result<i64> {
        value.parse().ok().context(NotAnIntegerSnafu { key })
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn increment(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        self.sweep(now);

        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let entry = occupied.get_mut();
                let next = Self::parse(key, &entry.value)? + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            MapEntry::Occupied(mut occupied) => {
                occupied.insert(Entry {
                    value: "1".to_owned(),
                    expires_at: None,
                });
                Ok(1)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: "1".to_owned(),
                    expires_at: None,
                });
                Ok(1)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        self.read(key, Instant::now())
            .map(|value| Self::parse(key, &value))
            .transpose()
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        let now = Instant::now();

        keys.iter()
            .map(|key| {
                self.read(key, now)
                    .map(|value| Self::parse(key, &value))
                    .transpose()
            })
            .collect()
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        self.sweep(now);

        let entry = Entry {
            value: value.to_owned(),
            expires_at: Some(now + ttl),
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        self.sweep(now);
        let entry = Entry {
            value: value.to_owned(),
            expires_at: Some(now + ttl),
        };

        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(occupied) if occupied.get().is_live(now) => Ok(false),
            MapEntry::Occupied(mut occupied) => {
                occupied.insert(entry);
                Ok(true)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read(key, Instant::now()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_starts_from_zero() {
        let store = MemoryStore::new();

        assert_eq!(store.get("views:a").await.unwrap(), None);
        assert_eq!(store.increment("views:a").await.unwrap(), 1);
        assert_eq!(store.increment("views:a").await.unwrap(), 2);
        assert_eq!(store.get("views:a").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn increment_rejects_text_values() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("marker", "not a number", Duration::from_secs(10))
            .await
            .unwrap();

        assert!(store.increment("marker").await.is_err());
        assert!(store.get("marker").await.is_err());
    }

    #[tokio::test]
    async fn get_many_keeps_order() {
        let store = MemoryStore::new();
        store.increment("b").await.unwrap();
        store.increment("b").await.unwrap();

        let keys = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        assert_eq!(store.get_many(&keys).await.unwrap(), vec![None, Some(2), None]);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("marker", "1", Duration::from_secs(900))
            .await
            .unwrap();
        assert!(store.exists("marker").await.unwrap());

        tokio::time::advance(Duration::from_secs(899)).await;
        assert!(store.exists("marker").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!store.exists("marker").await.unwrap(), "marker should expire at its deadline");
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_only_writes_once_per_window() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.set_if_absent("gate", "1", ttl).await.unwrap());
        assert!(!store.set_if_absent("gate", "2", ttl).await.unwrap());

        tokio::time::advance(ttl).await;
        assert!(
            store.set_if_absent("gate", "3", ttl).await.unwrap(),
            "an expired entry counts as absent"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn writes_evict_expired_entries() {
        let store = MemoryStore::new();
        for visitor in 0..1000 {
            let key = format!("view_cooldown:post:{visitor}");
            store.set_with_ttl(&key, "1", Duration::from_secs(900)).await.unwrap();
        }
        store.increment("views:post").await.unwrap();
        assert_eq!(store.entries.len(), 1001);

        tokio::time::advance(Duration::from_secs(2 * 24 * 60 * 60)).await;
        for _ in 0..10 {
            store.increment("views:post").await.unwrap();
        }

        assert_eq!(store.entries.len(), 1, "only the counter should survive");
        assert_eq!(store.get("views:post").await.unwrap(), Some(11));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_live_entries() {
        let store = MemoryStore::new();
        store.set_with_ttl("short", "1", Duration::from_secs(30)).await.unwrap();
        store.set_with_ttl("long", "1", Duration::from_secs(3600)).await.unwrap();

        tokio::time::advance(SWEEP_INTERVAL).await;
        store.set_with_ttl("fresh", "1", Duration::from_secs(30)).await.unwrap();

        assert!(!store.entries.contains_key("short"));
        assert!(store.entries.contains_key("long"));
        assert!(store.entries.contains_key("fresh"));
    }
}
