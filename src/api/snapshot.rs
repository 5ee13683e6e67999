use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::provider::{DataProvider, DataSourceStatus};
use crate::model::vault::{PeriodSummaryRecord, VaultRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub vaults: Vec<VaultRecord>,
    /// Keyed by vault address.
    #[serde(default)]
    pub period_summaries: HashMap<String, Vec<PeriodSummaryRecord>>,
}

pub struct SnapshotProvider {
    snapshot: Snapshot,
}

fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl SnapshotProvider {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot: Snapshot =
            serde_json::from_str(&text).with_context(|| format!("parsing snapshot {}", path.display()))?;
        info!("Loaded snapshot with {} vaults from {}", snapshot.vaults.len(), path.display());
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

#[async_trait]
impl DataProvider for SnapshotProvider {
    async fn get_vault(&self, chain_id: &str, address: &str) -> Result<VaultRecord> {
        self.snapshot
            .vaults
            .iter()
            .find(|vault| vault.chain.id == chain_id && same_address(&vault.address, address))
            .cloned()
            .ok_or_else(|| anyhow!("vault {} not found on chain {}", address, chain_id))
    }

    async fn get_period_summaries(&self, _chain_id: &str, address: &str) -> Result<Vec<PeriodSummaryRecord>> {
        Ok(self
            .snapshot
            .period_summaries
            .iter()
            .find(|(key, _)| same_address(key, address))
            .map(|(_, periods)| periods.clone())
            .unwrap_or_default())
    }

    async fn get_chain_vaults(&self, chain_id: &str) -> Result<Vec<VaultRecord>> {
        Ok(self
            .snapshot
            .vaults
            .iter()
            .filter(|vault| vault.chain.id == chain_id)
            .cloned()
            .collect())
    }

    async fn get_curator_vaults(&self, curator_id: &str) -> Result<Vec<VaultRecord>> {
        Ok(self
            .snapshot
            .vaults
            .iter()
            .filter(|vault| vault.curator_ids().any(|id| id == curator_id))
            .cloned()
            .collect())
    }

    async fn get_status(&self) -> DataSourceStatus {
        if self.snapshot.vaults.is_empty() {
            DataSourceStatus::Error("snapshot holds no vaults".to_string())
        } else {
            DataSourceStatus::Connected
        }
    }
}
