use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("reasoning service is not configured")]
    ReasoningDisabled,

    #[error("reasoning service returned HTTP {status}: {body}")]
    ReasoningStatus { status: u16, body: String },

    #[error("reasoning service response had no message content")]
    EmptyCompletion,

    #[error("unexpected reasoning reply: {0}")]
    UnexpectedReply(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error for {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("competitor limit reached for tier {tier} ({limit} stores)")]
    CompetitorLimit { tier: String, limit: usize },

    #[error("store is already monitored: {store_url}")]
    AlreadyMonitored { store_url: String },

    #[error("no active monitored store with id {store_id}")]
    StoreNotFound { store_id: String },

    #[error("no collector registered for source {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Db(#[from] scout_db::DbError),

    #[error(transparent)]
    Scraper(#[from] scout_scraper::ScraperError),
}
