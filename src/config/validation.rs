use crate::config::types::{Config, HarvestConfig, HttpConfig, OutputConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_http_config(&config.http)?;
    validate_harvest_config(&config.harvest)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the catalog site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("landing-url", &config.landing_url)?;
    validate_http_url("origin", &config.origin)?;

    if config.group_path_segment.trim().is_empty() {
        return Err(ConfigError::Validation(
            "group-path-segment cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP request configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates worker pool and delay configuration
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    validate_delay_range(
        "unit-jitter",
        config.unit_jitter_min_ms,
        config.unit_jitter_max_ms,
    )?;
    validate_delay_range(
        "pagination-delay",
        config.pagination_delay_min_ms,
        config.pagination_delay_max_ms,
    )?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.mapping_path.is_empty() {
        return Err(ConfigError::Validation(
            "mapping-path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_dir.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-dir cannot be empty".to_string(),
        ));
    }

    if config.log_path.is_empty() {
        return Err(ConfigError::Validation(
            "log-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a URL parses and uses HTTP or HTTPS
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    Ok(())
}

fn validate_delay_range(name: &str, min_ms: u64, max_ms: u64) -> Result<(), ConfigError> {
    if min_ms > max_ms {
        return Err(ConfigError::Validation(format!(
            "{}-min-ms ({}) must not exceed {}-max-ms ({})",
            name, min_ms, name, max_ms
        )));
    }
    Ok(())
}
