use thiserror::Error;

/// Structural failures. Sparse-data conditions (zero supply, empty history,
/// new curator, nothing pending) are not errors and never show up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Decimals must be non-negative, got {0}")]
    InvalidDecimals(i64),

    #[error("Input is empty or whitespace only")]
    EmptyInput,

    #[error("Malformed integer: '{0}'")]
    MalformedInteger(String),

    #[error("Malformed decimal: '{0}'")]
    MalformedDecimal(String),

    #[error("'{text}' has more than {decimals} fractional digits")]
    TooManyFractionalDigits { text: String, decimals: u32 },

    #[error("Negative value for '{field}': {value}")]
    NegativeValue { field: String, value: String },

    #[error("Arithmetic overflow while computing {0}")]
    Overflow(String),

    #[error("Division by zero while computing {0}")]
    DivisionByZero(String),

    #[error("Simulation target total assets must be positive")]
    NonPositiveTarget,

    #[error("Vault state is required for this operation")]
    MissingVaultState,

    #[error("Invalid rate for '{field}': {value} bps (max {max})")]
    InvalidRate { field: String, value: u32, max: u32 },

    #[error("Accrued fees ({fees}) exceed total assets ({total_assets})")]
    FeesExceedAssets { fees: String, total_assets: String },
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
