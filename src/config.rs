use anyhow::{anyhow, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::model::Strategy;

pub const ENV_PREFIX: &str = "VAULT_ANALYTICS_";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub risk_weights: RiskWeights,
    pub risk_parameters: RiskParameters,
    pub prediction: PredictionConfig,
    pub portfolio: PortfolioConfig,
    pub fetcher: FetcherConfig,
    pub alert_thresholds: AlertThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub tvl: f64,
    pub concentration: f64,
    pub volatility: f64,
    pub age: f64,
    pub curator: f64,
    pub fee: f64,
    pub liquidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    pub tvl_floor_usd: Decimal,
    pub tvl_ceiling_usd: Decimal,
    pub young_vault_days: f64,
    pub mature_vault_days: f64,
    pub curator_min_viable_tvl_usd: Decimal,
    pub new_curator_score: f64,
    pub medium_risk_default: f64,
    pub low_fee_drag_pct: f64,
    pub high_fee_drag_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub ema_window: usize,
    pub regression_weight: f64,
    pub forecast_days: f64,
    pub trend_noise_factor: f64,
    pub sample_saturation: usize,
    pub stability_weight: f64,
    pub trend_weight: f64,
    pub horizons_days: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Annual, in percent.
    pub risk_free_rate: f64,
    pub default_strategy: Strategy,
    /// Allocation drift in percentage points.
    pub rebalance_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub max_concurrent_requests: usize,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub risk_score_warning: u8,
    pub risk_score_critical: u8,
    pub min_liquidity_coverage: f64,
    /// Annual fee drag in percent.
    pub fee_drag_warning: f64,
    pub price_impact_warning: f64,
    pub trend_confidence: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            tvl: 0.20,
            concentration: 0.15,
            volatility: 0.15,
            age: 0.10,
            curator: 0.15,
            fee: 0.10,
            liquidity: 0.15,
        }
    }
}

impl RiskWeights {
    pub fn as_array(&self) -> [f64; 7] {
        [
            self.tvl,
            self.concentration,
            self.volatility,
            self.age,
            self.curator,
            self.fee,
            self.liquidity,
        ]
    }

    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            tvl_floor_usd: dec!(10000),
            tvl_ceiling_usd: dec!(10000000),
            young_vault_days: 14.0,
            mature_vault_days: 365.0,
            curator_min_viable_tvl_usd: dec!(100000),
            new_curator_score: 60.0,
            medium_risk_default: 50.0,
            low_fee_drag_pct: 1.0,
            high_fee_drag_pct: 5.0,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            ema_window: 7,
            regression_weight: 0.5,
            forecast_days: 30.0,
            trend_noise_factor: 0.5,
            sample_saturation: 30,
            stability_weight: 0.7,
            trend_weight: 0.3,
            horizons_days: vec![7, 30, 90, 365],
        }
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 4.0,
            default_strategy: Strategy::EqualWeight,
            rebalance_threshold: 5.0,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 2,
            cache_ttl_secs: 300,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            risk_score_warning: 60,
            risk_score_critical: 80,
            min_liquidity_coverage: 1.0,
            fee_drag_warning: 3.0,
            price_impact_warning: 5.0,
            trend_confidence: 0.5,
        }
    }
}

pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config_file = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    validate_config(&config)?;

    Ok(config)
}

pub fn generate_sample_config(path: &str) -> Result<()> {
    let config = Config::default();
    let toml_content = toml::to_string_pretty(&config)?;

    fs::write(path, toml_content)?;

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<()> {
    let weights = &config.risk_weights;
    if weights.as_array().iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
        return Err(anyhow!("risk_weights must be finite and not negative"));
    }
    if (weights.total() - 1.0).abs() > 1e-6 {
        return Err(anyhow!(
            "risk_weights must sum to 1.0, got {:.6}",
            weights.total()
        ));
    }

    let params = &config.risk_parameters;
    let numeric = [
        params.young_vault_days,
        params.mature_vault_days,
        params.new_curator_score,
        params.medium_risk_default,
        params.low_fee_drag_pct,
        params.high_fee_drag_pct,
    ];
    if numeric.iter().any(|value| !value.is_finite()) {
        return Err(anyhow!("risk_parameters must be finite numbers"));
    }
    if params.tvl_floor_usd <= Decimal::ZERO || params.tvl_floor_usd >= params.tvl_ceiling_usd {
        return Err(anyhow!("risk_parameters.tvl_floor_usd must be positive and below tvl_ceiling_usd"));
    }
    if params.curator_min_viable_tvl_usd < Decimal::ZERO {
        return Err(anyhow!("risk_parameters.curator_min_viable_tvl_usd must not be negative"));
    }
    if params.young_vault_days <= 0.0 || params.young_vault_days >= params.mature_vault_days {
        return Err(anyhow!(
            "risk_parameters.young_vault_days must be positive and below mature_vault_days"
        ));
    }
    if params.low_fee_drag_pct <= 0.0 || params.low_fee_drag_pct >= params.high_fee_drag_pct {
        return Err(anyhow!(
            "risk_parameters.low_fee_drag_pct must be positive and below high_fee_drag_pct"
        ));
    }
    for (name, score) in [
        ("new_curator_score", params.new_curator_score),
        ("medium_risk_default", params.medium_risk_default),
    ] {
        if !(0.0..=100.0).contains(&score) {
            return Err(anyhow!("risk_parameters.{} must be within [0, 100]", name));
        }
    }

    let prediction = &config.prediction;
    if prediction.horizons_days.is_empty() {
        return Err(anyhow!("prediction.horizons_days must not be empty"));
    }
    if prediction.ema_window == 0 || prediction.sample_saturation == 0 {
        return Err(anyhow!("prediction.ema_window and sample_saturation must be at least 1"));
    }
    if !(0.0..=1.0).contains(&prediction.regression_weight) {
        return Err(anyhow!("prediction.regression_weight must be within [0, 1]"));
    }

    if config.fetcher.max_concurrent_requests == 0 {
        return Err(anyhow!("fetcher.max_concurrent_requests must be at least 1"));
    }

    let alerts = &config.alert_thresholds;
    if alerts.risk_score_warning > alerts.risk_score_critical {
        return Err(anyhow!("alert_thresholds.risk_score_warning must not exceed risk_score_critical"));
    }

    Ok(())
}
