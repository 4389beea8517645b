//! Per-source product discovery collectors and the shared HTTP plumbing they
//! run on.

pub mod error;
pub mod fetch;
pub mod html;
pub mod identity;
pub mod image_search;
pub mod origin;
pub(crate) mod rate_limit;
pub mod registry;
pub mod rss;
pub mod sources;
pub mod storefront;
pub mod strategy;

pub use error::ScraperError;
pub use fetch::{FetchConfig, HttpFetcher};
pub use image_search::{BingImageLookup, ImageLookup, MarketplaceImageLookup};
pub use origin::{extract_domain, extract_origin, store_identity};
pub use registry::{ad_archive, default_collectors, default_image_lookups, Seeds, SourceEndpoints};
pub use sources::meta_ads::{AdArchive, AdSummary};
pub use storefront::StorefrontReader;
pub use strategy::{Collector, FallbackChain, Strategy};
