// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{DEFAULT_QUEUE_SIZE_LIMIT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::ConfigError;
use crate::event::Level;
use std::env;

const DEFAULT_SERVER_URL: &str = "http://localhost:5341";

/// Configuration for the delivery pipeline and the bulk sender.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Base URL of the ingestion service
    pub server_url: String,
    /// Key used against the key-management endpoint
    pub admin_api_key: Option<String>,
    /// Title of the application credential
    pub app_title: String,
    /// Token of the application credential
    pub app_token: String,
    /// Capacity of the queue used while unauthorized
    pub queue_size_limit: usize,
    /// Whether to buffer and retry when the startup registration fails
    pub retry_on_failure: bool,
    /// Retry budget, `None` retries forever
    pub retry_count: Option<u32>,
    /// Minimum severity requested when registering the credential
    pub minimum_level: Level,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            admin_api_key: None,
            app_title: String::new(),
            app_token: String::new(),
            queue_size_limit: DEFAULT_QUEUE_SIZE_LIMIT,
            retry_on_failure: true,
            retry_count: None,
            minimum_level: Level::Information,
            https_proxy: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl DeliveryConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url = env::var("INGEST_SERVER_URL")
            .map_err(|_| ConfigError::Missing("INGEST_SERVER_URL"))?;
        let app_title =
            env::var("INGEST_APP_TITLE").map_err(|_| ConfigError::Missing("INGEST_APP_TITLE"))?;
        let app_token =
            env::var("INGEST_APP_TOKEN").map_err(|_| ConfigError::Missing("INGEST_APP_TOKEN"))?;
        let admin_api_key = env::var("INGEST_ADMIN_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let queue_size_limit = match env::var("INGEST_QUEUE_SIZE_LIMIT") {
            Ok(val) => val.trim().parse::<usize>().map_err(|_| {
                ConfigError::Invalid(format!("INGEST_QUEUE_SIZE_LIMIT '{val}' is not a number"))
            })?,
            Err(_) => DEFAULT_QUEUE_SIZE_LIMIT,
        };
        let retry_on_failure = env::var("INGEST_RETRY_ON_FAILURE")
            .map(|val| val.to_lowercase() != "false")
            .unwrap_or(true);
        let retry_count = match env::var("INGEST_RETRY_COUNT") {
            Ok(val) if !val.trim().is_empty() => Some(val.trim().parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!("INGEST_RETRY_COUNT '{val}' is not a number"))
            })?),
            _ => None,
        };
        let minimum_level = match env::var("INGEST_MINIMUM_LEVEL") {
            Ok(val) => val
                .parse::<Level>()
                .map_err(|_| ConfigError::Invalid(format!("Unknown minimum level '{val}'")))?,
            Err(_) => Level::Information,
        };
        let https_proxy = env::var("INGEST_HTTPS_PROXY")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let request_timeout_secs = env::var("INGEST_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let log_level = env::var("INGEST_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            server_url,
            admin_api_key,
            app_title,
            app_token,
            queue_size_limit,
            retry_on_failure,
            retry_count,
            minimum_level,
            https_proxy,
            request_timeout_secs,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "INGEST_SERVER_URL cannot be empty".to_string(),
            ));
        }
        if self.app_title.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "INGEST_APP_TITLE cannot be empty".to_string(),
            ));
        }
        if self.app_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "INGEST_APP_TOKEN cannot be empty".to_string(),
            ));
        }
        if self.queue_size_limit == 0 {
            return Err(ConfigError::Invalid(
                "Queue size limit must be greater than 0".to_string(),
            ));
        }
        if self.retry_count == Some(0) {
            return Err(ConfigError::Invalid(
                "Retry count must be greater than 0 when set".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
