use crate::config::types::{
    Config, EndpointConfig, HarvestConfig, OutputConfig, PermalinkConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: usize = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_endpoints(&config.endpoints)?;
    validate_permalink_config(&config.permalink)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.start_page < 1 {
        return Err(ConfigError::Validation(
            "start-page must be >= 1".to_string(),
        ));
    }

    if config.marker.trim().is_empty() {
        return Err(ConfigError::Validation("marker cannot be empty".to_string()));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if let Some(empty) = config.excluded_subreddits.iter().find(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "excluded-subreddits contains an empty entry: '{}'",
            empty
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config.name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters and hyphens, got '{}'",
            config.name
        )));
    }

    if config.version.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::Validation(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

fn validate_endpoints(config: &EndpointConfig) -> Result<(), ConfigError> {
    validate_template("listing", &config.listing, &["{page}"])?;
    validate_template("detail", &config.detail, &["{id}"])?;
    validate_template("metadata", &config.metadata, &["{fullname}"])?;
    Ok(())
}

/// Checks that a template carries its placeholders and is a valid URL once filled in
fn validate_template(
    name: &str,
    template: &str,
    placeholders: &[&str],
) -> Result<(), ConfigError> {
    for placeholder in placeholders {
        if !template.contains(placeholder) {
            return Err(ConfigError::InvalidTemplate(format!(
                "{} endpoint '{}' is missing placeholder {}",
                name, template, placeholder
            )));
        }
    }

    let filled = template
        .replace("{page}", "1")
        .replace("{window}", "day")
        .replace("{id}", "x")
        .replace("{fullname}", "t1_x");

    let url = Url::parse(&filled).map_err(|e| {
        ConfigError::InvalidTemplate(format!("{} endpoint '{}': {}", name, template, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidTemplate(format!(
            "{} endpoint '{}' must use http or https",
            name, template
        )));
    }

    Ok(())
}

fn validate_permalink_config(config: &PermalinkConfig) -> Result<(), ConfigError> {
    if config.post_segment == config.comment_segment {
        return Err(ConfigError::Validation(format!(
            "post-segment and comment-segment must differ, both are {}",
            config.post_segment
        )));
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}
