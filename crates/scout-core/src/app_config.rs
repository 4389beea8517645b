#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Postgres URL. Only the scheduler daemon requires it; CLI scans run
    /// without persistence when it is absent.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub http_inter_request_delay_ms: u64,
    pub http_max_retries: u32,
    pub http_backoff_base_secs: u64,
    pub image_concurrency: usize,
    pub enrich_batch_size: usize,
    /// Share of a marketplace retail price assumed to be the supplier cost.
    pub cost_ratio: f64,
    /// Sell price as a multiple of the supplier cost.
    pub markup_multiple: f64,
    pub trend_seeds: Vec<String>,
    pub seed_stores: Vec<String>,
    pub reasoning_api_key: Option<String>,
    pub reasoning_base_url: String,
    pub reasoning_model: String,
    pub reasoning_timeout_secs: u64,
    pub scan_check_cron: String,
    pub rollover_cron: String,
    pub daily_top_n: usize,
}

impl AppConfig {
    /// Returns `true` when a global reasoning-service key is configured.
    #[must_use]
    pub fn reasoning_enabled(&self) -> bool {
        self.reasoning_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field(
                "http_inter_request_delay_ms",
                &self.http_inter_request_delay_ms,
            )
            .field("http_max_retries", &self.http_max_retries)
            .field("http_backoff_base_secs", &self.http_backoff_base_secs)
            .field("image_concurrency", &self.image_concurrency)
            .field("enrich_batch_size", &self.enrich_batch_size)
            .field("cost_ratio", &self.cost_ratio)
            .field("markup_multiple", &self.markup_multiple)
            .field("trend_seeds", &self.trend_seeds)
            .field("seed_stores", &self.seed_stores)
            .field(
                "reasoning_api_key",
                &self.reasoning_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("reasoning_base_url", &self.reasoning_base_url)
            .field("reasoning_model", &self.reasoning_model)
            .field("reasoning_timeout_secs", &self.reasoning_timeout_secs)
            .field("scan_check_cron", &self.scan_check_cron)
            .field("rollover_cron", &self.rollover_cron)
            .field("daily_top_n", &self.daily_top_n)
            .finish()
    }
}
