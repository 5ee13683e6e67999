pub mod apr;
pub mod conversion;
pub mod portfolio;
pub mod prediction;
pub mod risk;
pub mod simulation;

pub use apr::{current_apr, derive_apr_reference_points, price_history, yield_history};
pub use conversion::{convert_assets_to_shares, convert_shares_to_assets, price_per_share};
pub use portfolio::optimize_portfolio;
pub use prediction::predict_yield;
pub use risk::analyze_risk;
pub use simulation::{simulate_at, VaultSimulator};
