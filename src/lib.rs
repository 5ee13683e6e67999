pub mod alert;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod math;
pub mod metrics;
pub mod model;
pub mod report;

pub use error::{AnalyticsError, AnalyticsResult};
