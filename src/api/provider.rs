use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::vault::{PeriodSummaryRecord, VaultRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSourceStatus {
    Connected,
    Disconnected,
    Error(String),
}

/// Upstream source of indexed vault records.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_vault(&self, chain_id: &str, address: &str) -> Result<VaultRecord>;
    async fn get_period_summaries(&self, chain_id: &str, address: &str) -> Result<Vec<PeriodSummaryRecord>>;
    async fn get_chain_vaults(&self, chain_id: &str) -> Result<Vec<VaultRecord>>;
    async fn get_curator_vaults(&self, curator_id: &str) -> Result<Vec<VaultRecord>>;
    async fn get_status(&self) -> DataSourceStatus;
}
