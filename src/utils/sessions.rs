// Session store - short-lived per-user state with explicit expiry
// Used for pending confirmations and multi-step command drafts.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug)]
pub struct SessionStore<K: Eq + Hash, V> {
    ttl: Duration,
    entries: DashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> SessionStore<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_for(key, value, self.ttl);
    }

    pub fn insert_for(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(key, (Instant::now() + ttl, value));
    }

    /// Live value for `key`; an expired entry is dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = {
            let entry = self.entries.get(key)?;
            if entry.0 > Instant::now() {
                return Some(entry.1.clone());
            }
            true
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Remove the live entry only if its value satisfies `pred`.
    pub fn take_if(&self, key: &K, pred: impl FnOnce(&V) -> bool) -> Option<V> {
        let now = Instant::now();
        self.entries
            .remove_if(key, |_, (expires_at, value)| *expires_at > now && pred(value))
            .map(|(_, (_, value))| value)
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (expires_at, _)| *expires_at > now);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let sessions: SessionStore<u64, String> = SessionStore::new(Duration::from_secs(60));
        sessions.insert(1, "rules".to_string());

        assert_eq!(sessions.get(&1).as_deref(), Some("rules"));
        assert!(sessions.contains(&1));
        sessions.remove(&1);
        assert_eq!(sessions.get(&1), None);
    }

    #[test]
    fn test_entries_expire() {
        let sessions: SessionStore<u64, u8> = SessionStore::new(Duration::ZERO);
        sessions.insert(1, 9);
        assert_eq!(sessions.get(&1), None);

        sessions.insert(2, 9);
        sessions.insert_for(3, 9, Duration::from_secs(60));
        assert_eq!(sessions.purge_expired(), 1);
        assert!(sessions.contains(&3));
    }

    #[test]
    fn test_take_if() {
        let sessions: SessionStore<u64, u8> = SessionStore::new(Duration::from_secs(60));
        sessions.insert(1, 5);
        assert_eq!(sessions.take_if(&1, |v| *v == 6), None);
        assert_eq!(sessions.take_if(&1, |v| *v == 5), Some(5));
        assert!(!sessions.contains(&1));

        let stale: SessionStore<u64, u8> = SessionStore::new(Duration::ZERO);
        stale.insert(1, 5);
        assert_eq!(stale.take_if(&1, |v| *v == 5), None);
    }
}
