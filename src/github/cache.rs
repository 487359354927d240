//! In-memory TTL cache for idempotent GitHub reads.
//!
//! Entries hold the decoded JSON payload of a successful response and expire
//! a fixed duration after insertion. Expired entries are dropped lazily, when
//! read or when any new entry is stored. A cache can be owned by one client or shared between several clients
//! bound to the same credential.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use url::form_urlencoded;

/// Per-operation time-to-live settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// TTL for `GET /user`.
    pub profile_ttl: Duration,
    /// TTL for repository, issue, and pull request listings.
    pub list_ttl: Duration,
    /// TTL for `GET /repos/{owner}/{repo}`.
    pub repository_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            profile_ttl: Duration::from_secs(300),
            list_ttl: Duration::from_secs(300),
            repository_ttl: Duration::from_secs(600),
        }
    }
}

/// Cache key derived from method, URL, and sorted query parameters.
///
/// Keys never include credentials or response content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds a key. Parameters are sorted so that their order does not
    /// matter.
    ///
    /// # Example
    ///
    /// ```
    /// use devsync_github::github::cache::CacheKey;
    ///
    /// let a = CacheKey::new("GET", "https://api.github.com/user/repos", &[("page", "1"), ("per_page", "30")]);
    /// let b = CacheKey::new("GET", "https://api.github.com/user/repos", &[("per_page", "30"), ("page", "1")]);
    /// assert_eq!(a, b);
    /// ```
    #[must_use]
    pub fn new(method: &str, url: &str, params: &[(&str, &str)]) -> Self {
        let mut sorted = params.to_vec();
        sorted.sort_unstable();

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(sorted)
            .finish();

        Self(format!("{} {url}?{query}", method.to_ascii_uppercase()))
    }

    /// Borrow the key text.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Thread-safe TTL store of prior successful read responses.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value when present and not yet expired.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    pub fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
        self.put_at(key, value, ttl, Instant::now());
    }

    fn get_at(&self, key: &CacheKey, now: Instant) -> Option<Value> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now >= entry.expires_at {
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn put_at(&self, key: CacheKey, value: Value, ttl: Duration, now: Instant) {
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::{CacheKey, ResponseCache};

    const USER_URL: &str = "https://api.github.com/user";

    #[fixture]
    fn cache() -> ResponseCache {
        ResponseCache::new()
    }

    #[fixture]
    fn key() -> CacheKey {
        CacheKey::new("GET", USER_URL, &[])
    }

    #[rstest]
    fn returns_value_within_ttl(cache: ResponseCache, key: CacheKey) {
        cache.put(key.clone(), json!({"login": "octo"}), Duration::from_secs(60));

        assert_eq!(cache.get(&key), Some(json!({"login": "octo"})));
    }

    #[rstest]
    fn expired_entries_are_misses_and_evicted(cache: ResponseCache, key: CacheKey) {
        let start = Instant::now();
        cache.put_at(key.clone(), json!(1), Duration::from_secs(300), start);

        assert_eq!(
            cache.get_at(&key, start + Duration::from_secs(299)),
            Some(json!(1))
        );
        assert_eq!(cache.get_at(&key, start + Duration::from_secs(300)), None);
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[rstest]
    fn storing_sweeps_expired_entries_under_other_keys(cache: ResponseCache) {
        let start = Instant::now();
        for page in ["1", "2", "3"] {
            let key = CacheKey::new("GET", USER_URL, &[("page", page)]);
            cache.put_at(key, json!(page), Duration::from_secs(60), start);
        }

        let fresh = CacheKey::new("GET", USER_URL, &[("page", "4")]);
        cache.put_at(fresh.clone(), json!("4"), Duration::from_secs(60), start + Duration::from_secs(61));

        assert_eq!(cache.len(), 1, "expired pages should be swept on insert");
        assert_eq!(
            cache.get_at(&fresh, start + Duration::from_secs(62)),
            Some(json!("4"))
        );
    }

    #[rstest]
    fn expired_entries_can_be_overwritten(cache: ResponseCache, key: CacheKey) {
        cache.put(key.clone(), json!("old"), Duration::ZERO);
        cache.put(key.clone(), json!("new"), Duration::from_secs(60));

        assert_eq!(cache.get(&key), Some(json!("new")));
        assert_eq!(cache.len(), 1);
    }

    #[rstest]
    #[case(&[("page", "1"), ("per_page", "30")], &[("per_page", "30"), ("page", "1")], true)]
    #[case(&[("page", "1")], &[("page", "2")], false)]
    #[case(&[("state", "open")], &[("state", "closed")], false)]
    fn keys_ignore_parameter_order(
        #[case] left: &[(&str, &str)],
        #[case] right: &[(&str, &str)],
        #[case] equal: bool,
    ) {
        let url = "https://api.github.com/repos/o/r/issues";
        assert_eq!(
            CacheKey::new("GET", url, left) == CacheKey::new("get", url, right),
            equal
        );
    }

    #[test]
    fn key_text_is_stable() {
        let key = CacheKey::new(
            "GET",
            "https://api.github.com/user/repos",
            &[("sort", "updated"), ("affiliation", "owner,collaborator")],
        );

        insta::assert_snapshot!(
            key.as_str(),
            @"GET https://api.github.com/user/repos?affiliation=owner%2Ccollaborator&sort=updated"
        );
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let shared = Arc::new(ResponseCache::new());
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let cache = Arc::clone(&shared);
                thread::spawn(move || {
                    let page = index.to_string();
                    let key = CacheKey::new("GET", USER_URL, &[("page", page.as_str())]);
                    cache.put(key, json!(index), Duration::from_secs(60));
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread should finish");
        }

        assert_eq!(shared.len(), 8);
    }
}
