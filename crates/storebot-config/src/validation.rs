// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of failing on the first one.

use crate::diagnostic::ConfigError;
use crate::model::StorebotConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &StorebotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    for (key, url) in [
        ("openai.base_url", config.openai.base_url.as_str()),
        ("meta.graph_base_url", config.meta.graph_base_url.as_str()),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ConfigError::validation(format!(
                "{key} must be an http(s) URL, got `{url}`"
            )));
        }
    }

    let assistant = &config.assistant;
    if assistant.history_limit == 0 {
        errors.push(ConfigError::validation(
            "assistant.history_limit must be at least 1",
        ));
    }
    if assistant.max_tool_rounds == 0 {
        errors.push(ConfigError::validation(
            "assistant.max_tool_rounds must be at least 1",
        ));
    }
    if assistant.poll_interval_ms == 0 {
        errors.push(ConfigError::validation(
            "assistant.poll_interval_ms must be positive",
        ));
    }
    if assistant.poll_interval_ms >= assistant.poll_timeout_secs.saturating_mul(1000) {
        errors.push(ConfigError::validation(format!(
            "assistant.poll_interval_ms ({}) must be shorter than assistant.poll_timeout_secs ({}s)",
            assistant.poll_interval_ms, assistant.poll_timeout_secs
        )));
    }
    if assistant.fallback_reply.trim().is_empty() {
        errors.push(ConfigError::validation(
            "assistant.fallback_reply must not be empty",
        ));
    }

    if config.dedup.ttl_secs == 0 {
        errors.push(ConfigError::validation("dedup.ttl_secs must be positive"));
    }
    if config.dedup.sweep_every == 0 {
        errors.push(ConfigError::validation(
            "dedup.sweep_every must be at least 1",
        ));
    }

    if config.blob.upload_base_url.is_some() != config.blob.public_base_url.is_some() {
        errors.push(ConfigError::validation(
            "blob.upload_base_url and blob.public_base_url must be set together",
        ));
    }

    if config.email.smtp_host.is_some() && config.email.from_address.is_none() {
        errors.push(ConfigError::validation(
            "email.from_address is required when email.smtp_host is set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
