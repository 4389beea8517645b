//! Normalization, enrichment, image resolution, scan orchestration and
//! competitor-catalog diffing.

pub mod analysis;
pub mod diff;
pub mod enrich;
pub mod error;
pub mod heuristic;
pub mod images;
pub mod llm;
pub mod normalize;
pub mod orchestrator;
pub mod status;

pub use analysis::{ProductAnalysis, ProductAnalyzer, Recommendation};
pub use diff::{diff, price_changes, StoreCheck, StorefrontMonitor};
pub use enrich::{Enricher, Enrichment};
pub use error::PipelineError;
pub use heuristic::HeuristicScorer;
pub use images::{needs_lookup, ImageResolver};
pub use llm::{OpenAiReasoningClient, ReasoningClient};
pub use normalize::{validate, CandidateDraft};
pub use orchestrator::ScoutEngine;
pub use status::{ScanMode, StatusReport};
