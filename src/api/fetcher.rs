use anyhow::Result;
use futures_util::future::join_all;
use log::debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

use super::provider::DataProvider;
use crate::cache::{CacheKey, TtlCache};
use crate::clock::{Clock, SystemClock};
use crate::config::FetcherConfig;
use crate::model::vault::{PeriodSummaryRecord, VaultRecord};

/// Cache-fronted provider wrapper that caps in-flight upstream requests.
pub struct RateLimitedFetcher<P> {
    provider: Arc<P>,
    permits: Semaphore,
    vaults: Mutex<TtlCache<VaultRecord>>,
    periods: Mutex<TtlCache<Vec<PeriodSummaryRecord>>>,
    lists: Mutex<TtlCache<Vec<VaultRecord>>>,
}

impl<P: DataProvider> RateLimitedFetcher<P> {
    pub fn new(provider: Arc<P>, config: &FetcherConfig) -> Self {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    pub fn with_clock(provider: Arc<P>, config: &FetcherConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = Some(Duration::from_secs(config.cache_ttl_secs));
        Self {
            provider,
            permits: Semaphore::new(config.max_concurrent_requests.max(1)),
            vaults: Mutex::new(TtlCache::with_clock(ttl, clock.clone())),
            periods: Mutex::new(TtlCache::with_clock(ttl, clock.clone())),
            lists: Mutex::new(TtlCache::with_clock(ttl, clock)),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn cached<V, F, Fut>(&self, cache: &Mutex<TtlCache<V>>, key: CacheKey, fetch: F) -> Result<V>
    where
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let hit = cache.lock().await.get(&key);
        if let Some(value) = hit {
            debug!("Cache hit for {}", key);
            return Ok(value);
        }

        let value = {
            let _permit = self.permits.acquire().await?;
            debug!("Fetching {} from upstream", key);
            fetch().await?
        };

        cache.lock().await.set(key, value.clone(), None);
        Ok(value)
    }

    pub async fn vault(&self, chain_id: &str, address: &str) -> Result<VaultRecord> {
        self.cached(&self.vaults, CacheKey::vault(chain_id, address), || {
            self.provider.get_vault(chain_id, address)
        })
        .await
    }

    pub async fn period_summaries(&self, chain_id: &str, address: &str) -> Result<Vec<PeriodSummaryRecord>> {
        self.cached(&self.periods, CacheKey::period_summaries(chain_id, address), || {
            self.provider.get_period_summaries(chain_id, address)
        })
        .await
    }

    pub async fn chain_vaults(&self, chain_id: &str) -> Result<Vec<VaultRecord>> {
        self.cached(&self.lists, CacheKey::chain_vaults(chain_id), || {
            self.provider.get_chain_vaults(chain_id)
        })
        .await
    }

    pub async fn curator_vaults(&self, curator_id: &str) -> Result<Vec<VaultRecord>> {
        self.cached(&self.lists, CacheKey::curator_vaults(curator_id), || {
            self.provider.get_curator_vaults(curator_id)
        })
        .await
    }

    /// Results come back in the order of `addresses`. No retries.
    pub async fn fetch_many(&self, chain_id: &str, addresses: &[String]) -> Vec<Result<VaultRecord>> {
        join_all(addresses.iter().map(|address| self.vault(chain_id, address))).await
    }

    pub async fn invalidate(&self, chain_id: &str, address: &str) {
        self.vaults.lock().await.delete(&CacheKey::vault(chain_id, address));
        self.periods
            .lock()
            .await
            .delete(&CacheKey::period_summaries(chain_id, address));
    }
}
