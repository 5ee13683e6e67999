use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use futures_util::future::try_join_all;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vault_analytics::api::fetcher::RateLimitedFetcher;
use vault_analytics::api::provider::DataProvider;
use vault_analytics::api::snapshot::SnapshotProvider;
use vault_analytics::clock::{Clock, SystemClock};
use vault_analytics::config::{self, Config};
use vault_analytics::math::parse_fixed_point;
use vault_analytics::metrics::{optimize_portfolio, VaultSimulator};
use vault_analytics::model::vault::VaultRecord;
use vault_analytics::model::{SimulationInput, Strategy};
use vault_analytics::report::{analyze_vault, simulation_report, to_position, AnalysisInput, Holding, VaultAnalysis};

#[derive(Parser)]
#[command(name = "vault-analytics")]
#[command(about = "Share pricing, fee simulation, risk and yield analytics for tokenized vaults")]
struct Args {
    #[arg(long, global = true)]
    generate_config: bool,

    #[arg(short, long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(ClapArgs)]
struct VaultArgs {
    /// JSON snapshot of indexer records
    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long)]
    chain: String,

    #[arg(long)]
    vault: String,
}

#[derive(Subcommand)]
enum Command {
    /// Price, APR, risk and yield forecast for one vault
    Analyze(VaultArgs),
    /// Project a vault to a new total asset value
    Simulate {
        #[command(flatten)]
        target: VaultArgs,

        /// New total assets in asset units, e.g. 1050.25
        #[arg(long)]
        new_total_assets: String,

        #[arg(long)]
        settle_deposit: bool,

        /// Evaluation time in unix seconds, defaults to now
        #[arg(long)]
        timestamp: Option<u64>,
    },
    /// Target allocations for a set of holdings
    Optimize {
        #[arg(long)]
        snapshot: PathBuf,

        /// JSON list of { chainId, address, valueUsd }
        #[arg(long)]
        holdings: PathBuf,

        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Allowed drift in percentage points
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if args.generate_config {
        let path = args.config.as_deref().unwrap_or(config::DEFAULT_CONFIG_PATH);
        config::generate_sample_config(path)?;
        info!("Sample configuration generated at {}", path);
        return Ok(());
    }

    let config = config::load_config(args.config.as_deref())?;
    let now = SystemClock.now();

    match args.command {
        Some(Command::Analyze(target)) => {
            let fetcher = open_snapshot(&target.snapshot, &config).await?;
            let analysis = load_analysis(&fetcher, &target.chain, &target.vault, &config, now).await?;
            for alert in &analysis.alerts {
                warn!("{:?} {}: {}", alert.level, alert.metric, alert.message);
            }
            print_json(&analysis)
        }
        Some(Command::Simulate {
            target,
            new_total_assets,
            settle_deposit,
            timestamp,
        }) => {
            let fetcher = open_snapshot(&target.snapshot, &config).await?;
            let vault = fetcher.vault(&target.chain, &target.vault).await?;
            let state = vault.to_state()?;

            let mut input = SimulationInput::new(
                parse_fixed_point(&new_total_assets, i32::from(state.scale.asset_decimals))
                    .with_context(|| format!("invalid --new-total-assets '{}'", new_total_assets))?,
            );
            input.settle_deposit = settle_deposit;
            input.timestamp = timestamp;

            let result = VaultSimulator::new().simulate(Some(&state), &input)?;
            let report = simulation_report(&result, state.scale, &config.alert_thresholds, timestamp.unwrap_or(now))?;
            for alert in &report.alerts {
                warn!("{}: {}", alert.metric, alert.message);
            }
            print_json(&report)
        }
        Some(Command::Optimize {
            snapshot,
            holdings,
            strategy,
            threshold,
        }) => {
            let fetcher = open_snapshot(&snapshot, &config).await?;
            let text = tokio::fs::read_to_string(&holdings)
                .await
                .with_context(|| format!("reading holdings {}", holdings.display()))?;
            let holdings: Vec<Holding> = serde_json::from_str(&text)?;

            let analyses = try_join_all(
                holdings
                    .iter()
                    .map(|holding| load_analysis(&fetcher, &holding.chain_id, &holding.address, &config, now)),
            )
            .await?;
            let positions: Vec<_> = analyses
                .iter()
                .zip(&holdings)
                .map(|(analysis, holding)| to_position(analysis, holding.value_usd))
                .collect();

            let optimization = optimize_portfolio(
                &positions,
                strategy.unwrap_or(config.portfolio.default_strategy),
                threshold.unwrap_or(config.portfolio.rebalance_threshold),
                &config.portfolio,
            );
            info!(
                "Optimized {} positions, rebalance needed: {}",
                optimization.positions.len(),
                optimization.rebalance_needed
            );
            print_json(&optimization)
        }
        None => bail!("no command given, run with --help"),
    }
}

async fn open_snapshot(path: &Path, config: &Config) -> Result<RateLimitedFetcher<SnapshotProvider>> {
    let provider = Arc::new(SnapshotProvider::load(path).await?);
    Ok(RateLimitedFetcher::new(provider, &config.fetcher))
}

async fn load_analysis<P: DataProvider>(
    fetcher: &RateLimitedFetcher<P>,
    chain_id: &str,
    address: &str,
    config: &Config,
    now: u64,
) -> Result<VaultAnalysis> {
    let vault = fetcher.vault(chain_id, address).await?;
    let (periods, chain_vaults) = tokio::try_join!(
        fetcher.period_summaries(chain_id, address),
        fetcher.chain_vaults(chain_id)
    )?;

    let mut curator_vaults: Vec<VaultRecord> = Vec::new();
    for curator_id in vault.curator_ids() {
        for record in fetcher.curator_vaults(curator_id).await? {
            if !curator_vaults.iter().any(|seen| seen.address.eq_ignore_ascii_case(&record.address)) {
                curator_vaults.push(record);
            }
        }
    }

    let input = AnalysisInput {
        vault: &vault,
        periods: &periods,
        chain_vaults: &chain_vaults,
        curator_vaults: &curator_vaults,
    };
    Ok(analyze_vault(&input, config, now)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
