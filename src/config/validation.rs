use crate::config::types::{
    Config, CrawlerConfig, NotifyConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_source_config(&config.source)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_notify_config(&config.notify)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.page_size < 1 || config.page_size > 500 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 500, got {}",
            config.page_size
        )));
    }

    if config.index_keys.is_empty() {
        return Err(ConfigError::Validation(
            "index_keys cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for key in &config.index_keys {
        if key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "index_keys cannot contain empty keys".to_string(),
            ));
        }
        if !seen.insert(key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "index key '{}' is listed more than once",
                key
            )));
        }
    }

    Ok(())
}

/// Validates listing source configuration
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    validate_http_url("listing_url", &config.listing_url)?;

    if !config.entry_url_template.contains("{id}") {
        return Err(ConfigError::Validation(format!(
            "entry_url_template must contain an {{id}} placeholder, got '{}'",
            config.entry_url_template
        )));
    }
    validate_http_url("entry_url_template", &config.entry_url("0"))?;

    if config.sort.trim().is_empty() {
        return Err(ConfigError::Validation("sort cannot be empty".to_string()));
    }

    if config.payload_url_fragment.is_empty() {
        return Err(ConfigError::Validation(
            "payload_url_fragment cannot be empty".to_string(),
        ));
    }

    if config.entry_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "entry_selectors cannot be empty".to_string(),
        ));
    }

    for selector in &config.entry_selectors {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }

    if config.navigation_timeout_ms == 0 || config.payload_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation and payload timeouts must be positive".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates notification configuration
fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        validate_http_url("notify endpoint", endpoint)?;
    }

    if config.subscribers.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "subscribers cannot contain empty addresses".to_string(),
        ));
    }

    Ok(())
}

/// Requires an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
