use super::Cache;
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory TTL cache for tests and cache-disabled deployments.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str) -> Option<String> {
        // Clone out before touching the map again; holding the entry guard
        // across a remove on the same shard would deadlock.
        let entry = self
            .entries
            .get(key)
            .map(|e| (e.value().0.clone(), e.value().1));
        match entry {
            Some((value, expires)) if expires > Instant::now() => Some(value),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }
}

/// Glob match supporting `*` only, which is all the key schema needs.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }

    async fn del_pattern(&self, pattern: &str) -> Result<()> {
        self.entries.retain(|key, _| !glob_match(pattern, key));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache.set_ex("k", "v", Duration::from_millis(10)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn delete_and_pattern_delete() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set_ex("seat:s1", "a", ttl).await.unwrap();
        cache.set_ex("seat:s2", "b", ttl).await.unwrap();
        cache.set_ex("event-seats:e1", "c", ttl).await.unwrap();

        cache.del(&["seat:s1"]).await.unwrap();
        assert!(!cache.exists("seat:s1").await.unwrap());
        assert!(cache.exists("seat:s2").await.unwrap());

        cache.del_pattern("seat:*").await.unwrap();
        assert!(!cache.exists("seat:s2").await.unwrap());
        assert!(cache.exists("event-seats:e1").await.unwrap());
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("seat:*", "seat:s1"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("event-seats:e1", "event-seats:e1"));
        assert!(!glob_match("seat:*", "event-seats:e1"));
        assert!(glob_match("seat:*:v", "seat:s1:v"));
        assert!(!glob_match("seat:*:v", "seat:s1:w"));
    }
}
