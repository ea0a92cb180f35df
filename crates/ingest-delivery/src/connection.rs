// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::DeliveryConfig;
use crate::constants::{API_KEYS_PATH, RAW_EVENTS_PATH};
use crate::http::get_client;

/// Where and how to reach the ingestion service.
#[derive(Debug, Clone)]
pub struct IngestConnection {
    server_url: String,
    admin_api_key: Option<String>,
    client: reqwest::Client,
}

impl IngestConnection {
    #[must_use]
    pub fn new(
        server_url: impl Into<String>,
        admin_api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            server_url,
            admin_api_key,
            client,
        }
    }

    #[must_use]
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(
            config.server_url.clone(),
            config.admin_api_key.clone(),
            get_client(config),
        )
    }

    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    #[must_use]
    pub fn admin_api_key(&self) -> Option<&str> {
        self.admin_api_key.as_deref()
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn raw_events_url(&self) -> String {
        format!("{}{}", self.server_url, RAW_EVENTS_PATH)
    }

    #[must_use]
    pub fn api_keys_url(&self) -> String {
        format!("{}{}", self.server_url, API_KEYS_PATH)
    }

    #[must_use]
    pub fn api_key_url(&self, id: &str) -> String {
        format!("{}{}/{}", self.server_url, API_KEYS_PATH, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let connection =
            IngestConnection::new("https://ingest.example.com/", None, reqwest::Client::new());
        assert_eq!(connection.server_url(), "https://ingest.example.com");
        assert_eq!(
            connection.raw_events_url(),
            "https://ingest.example.com/api/events/raw"
        );
        assert_eq!(
            connection.api_keys_url(),
            "https://ingest.example.com/api/apikeys"
        );
        assert_eq!(
            connection.api_key_url("apikey-12"),
            "https://ingest.example.com/api/apikeys/apikey-12"
        );
    }

    #[test]
    fn test_from_config() {
        let config = DeliveryConfig {
            server_url: "http://localhost:5341".to_string(),
            admin_api_key: Some("admin".to_string()),
            ..Default::default()
        };
        let connection = IngestConnection::from_config(&config);
        assert_eq!(connection.admin_api_key(), Some("admin"));
    }
}
