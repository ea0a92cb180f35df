// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction.
//!
//! One `reqwest::Client` is shared by the registrar, the bulk sender and the
//! downstream batcher. It carries the request timeout, connection pooling
//! settings and the optional HTTPS proxy from [`DeliveryConfig`].

use crate::config::DeliveryConfig;
use core::time::Duration;
use std::error::Error;
use tracing::error;

/// Creates the shared HTTP client.
///
/// An invalid proxy configuration is logged and the client falls back to a
/// direct connection, so delivery keeps working with a misconfigured proxy.
#[must_use]
pub fn get_client(config: &DeliveryConfig) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(
    config: &DeliveryConfig,
    allow_proxy: bool,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        // Detect dead connections while the pipeline sits idle
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(https_uri.clone())?;
            client = client.proxy(proxy);
        }
    }

    Ok(client.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_client_without_proxy() {
        let config = DeliveryConfig::default();
        assert!(build_client(&config, true).is_ok());
    }

    #[test]
    fn test_get_client_falls_back_on_bad_proxy() {
        let config = DeliveryConfig {
            https_proxy: Some("not a url at all".to_string()),
            ..Default::default()
        };
        // Still hands out a usable client
        let _client = get_client(&config);
        assert!(build_client(&config, false).is_ok());
    }
}
