use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub(crate) const DEFAULT_TREND_SEEDS: &str =
    "gadgets,home decor,kitchen gadgets,beauty tools,pet supplies";

/// Upper bound on candidates sent to the reasoning service in one request.
const MAX_ENRICH_BATCH: usize = 25;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(invalid(var, format!("must be a positive number, got {value}")))
        }
    };

    let env = parse_environment(&or_default("SCOUT_ENV", "development"))?;
    let log_level = or_default("SCOUT_LOG_LEVEL", "info");
    let database_url = optional("DATABASE_URL");

    let db_max_connections = parse_u32("SCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SCOUT_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "SCOUT_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds SCOUT_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("SCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("SCOUT_HTTP_TIMEOUT_SECS", "20")?;
    let http_inter_request_delay_ms = parse_u64("SCOUT_HTTP_INTER_REQUEST_DELAY_MS", "750")?;
    let http_max_retries = parse_u32("SCOUT_HTTP_MAX_RETRIES", "2")?;
    let http_backoff_base_secs = parse_u64("SCOUT_HTTP_BACKOFF_BASE_SECS", "1")?;

    let image_concurrency = parse_usize("SCOUT_IMAGE_CONCURRENCY", "5")?.max(1);
    let enrich_batch_size = parse_usize("SCOUT_ENRICH_BATCH_SIZE", "20")?.clamp(1, MAX_ENRICH_BATCH);
    let cost_ratio = parse_positive_f64("SCOUT_COST_RATIO", "0.30")?;
    if cost_ratio >= 1.0 {
        return Err(invalid(
            "SCOUT_COST_RATIO",
            format!("must be below 1.0, got {cost_ratio}"),
        ));
    }
    let markup_multiple = parse_positive_f64("SCOUT_MARKUP_MULTIPLE", "3.0")?;

    let trend_seeds = split_list(&or_default("SCOUT_TREND_SEEDS", DEFAULT_TREND_SEEDS));
    let seed_stores = split_list(&or_default("SCOUT_SEED_STORES", ""));

    let reasoning_api_key = optional("SCOUT_REASONING_API_KEY");
    let reasoning_base_url = or_default("SCOUT_REASONING_BASE_URL", "https://api.openai.com/v1")
        .trim_end_matches('/')
        .to_string();
    let reasoning_model = or_default("SCOUT_REASONING_MODEL", "gpt-4o-mini");
    let reasoning_timeout_secs = parse_u64("SCOUT_REASONING_TIMEOUT_SECS", "60")?;

    let scan_check_cron = or_default("SCOUT_SCAN_CHECK_CRON", "0 0 * * * *");
    let rollover_cron = or_default("SCOUT_ROLLOVER_CRON", "0 55 6 * * *");
    let daily_top_n = parse_usize("SCOUT_DAILY_TOP_N", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_inter_request_delay_ms,
        http_max_retries,
        http_backoff_base_secs,
        image_concurrency,
        enrich_batch_size,
        cost_ratio,
        markup_multiple,
        trend_seeds,
        seed_stores,
        reasoning_api_key,
        reasoning_base_url,
        reasoning_model,
        reasoning_timeout_secs,
        scan_check_cron,
        rollover_cron,
        daily_top_n,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SCOUT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

/// Split a comma-separated env value, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
