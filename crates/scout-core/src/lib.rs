//! Shared domain types and configuration for the product-scout workspace.

pub mod app_config;
mod config;
pub mod filters;
pub mod products;
pub mod scan;
pub mod storefront;
pub mod tiers;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use filters::ScanFilters;
pub use products::{
    CandidateProduct, RawCandidate, RawMetrics, Saturation, SourceTag, TrendDirection,
};
pub use scan::{Account, ScanRecord, ScanResult, ScanType};
pub use storefront::{
    AlertType, CatalogItem, ChangeAlert, ChangeSet, PriceChange, StorefrontSnapshot,
};
pub use tiers::{should_scan, Tier};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
