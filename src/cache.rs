use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Vault { chain_id: String, address: String },
    PeriodSummaries { chain_id: String, address: String },
    ChainVaults(String),
    CuratorVaults(String),
}

impl CacheKey {
    pub fn vault(chain_id: &str, address: &str) -> Self {
        CacheKey::Vault {
            chain_id: chain_id.to_string(),
            address: address.to_lowercase(),
        }
    }

    pub fn period_summaries(chain_id: &str, address: &str) -> Self {
        CacheKey::PeriodSummaries {
            chain_id: chain_id.to_string(),
            address: address.to_lowercase(),
        }
    }

    pub fn chain_vaults(chain_id: &str) -> Self {
        CacheKey::ChainVaults(chain_id.to_string())
    }

    pub fn curator_vaults(curator_id: &str) -> Self {
        CacheKey::CuratorVaults(curator_id.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Vault { chain_id, address } => write!(f, "vault:{}:{}", chain_id, address),
            CacheKey::PeriodSummaries { chain_id, address } => write!(f, "periods:{}:{}", chain_id, address),
            CacheKey::ChainVaults(chain_id) => write!(f, "chain:{}", chain_id),
            CacheKey::CuratorVaults(curator_id) => write!(f, "curator:{}", curator_id),
        }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Option<u64>,
}

pub struct TtlCache<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            clock,
        }
    }

    fn is_live(&self, entry: &Entry<V>) -> bool {
        entry.expires_at.map_or(true, |deadline| self.clock.now() < deadline)
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        let live = self.entries.get(key).map(|entry| self.is_live(entry))?;
        if !live {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// `ttl` of `None` uses the cache default; a cache without a default keeps the entry forever.
    pub fn set(&mut self, key: CacheKey, value: V, ttl: Option<Duration>) {
        let expires_at = ttl
            .or(self.default_ttl)
            .map(|ttl| self.clock.now().saturating_add(ttl.as_secs()));
        self.entries.insert(key, Entry { value, expires_at });
    }

    pub fn has(&mut self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.expires_at.map_or(true, |deadline| now < deadline));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    pub(crate) struct StepClock(pub AtomicU64);

    impl StepClock {
        pub(crate) fn advance(&self, seconds: u64) {
            self.0.fetch_add(seconds, Ordering::SeqCst);
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn cache(ttl: u64) -> (TtlCache<String>, Arc<StepClock>) {
        let clock = Arc::new(StepClock(AtomicU64::new(1_000)));
        let cache = TtlCache::with_clock(Some(Duration::from_secs(ttl)), clock.clone());
        (cache, clock)
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (mut cache, clock) = cache(300);
        let key = CacheKey::vault("42161", "0xABC");
        cache.set(key.clone(), "vault".to_string(), None);

        clock.advance(299);
        assert_eq!(cache.get(&key).as_deref(), Some("vault"));

        clock.advance(1);
        assert!(!cache.has(&key));
        assert!(cache.is_empty());
    }

    #[test]
    fn explicit_ttl_overrides_default() {
        let (mut cache, clock) = cache(300);
        let key = CacheKey::chain_vaults("1");
        cache.set(key.clone(), "list".to_string(), Some(Duration::from_secs(10)));
        clock.advance(10);
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn vault_keys_ignore_address_case() {
        assert_eq!(CacheKey::vault("1", "0xAbC"), CacheKey::vault("1", "0xabc"));
        assert_eq!(CacheKey::vault("1", "0xAbC").to_string(), "vault:1:0xabc");
        assert_ne!(CacheKey::vault("1", "0xabc"), CacheKey::period_summaries("1", "0xabc"));
    }

    #[test]
    fn delete_flush_and_purge() {
        let (mut cache, clock) = cache(60);
        cache.set(CacheKey::chain_vaults("1"), "a".to_string(), None);
        cache.set(CacheKey::chain_vaults("2"), "b".to_string(), Some(Duration::from_secs(600)));
        cache.set(CacheKey::curator_vaults("c"), "c".to_string(), None);

        assert!(cache.delete(&CacheKey::curator_vaults("c")));
        assert!(!cache.delete(&CacheKey::curator_vaults("c")));

        clock.advance(120);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);

        cache.flush();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_without_default_keeps_entries() {
        let clock = Arc::new(StepClock(AtomicU64::new(0)));
        let mut cache: TtlCache<u32> = TtlCache::with_clock(None, clock.clone());
        cache.set(CacheKey::chain_vaults("1"), 7, None);
        clock.advance(u64::MAX / 2);
        assert_eq!(cache.get(&CacheKey::chain_vaults("1")), Some(7));
    }
}
