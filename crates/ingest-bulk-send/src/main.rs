// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, path::PathBuf, process::ExitCode, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ingest_delivery::{
    constants::REGISTRATION_ATTEMPT_TIMEOUT,
    logger::Formatter,
    registrar::register,
    transport::HttpChunkTransport,
    ApiKeyRegistrar, ApplicationCredential, ChunkedBulkSender, DeliveryConfig, DeliveryError,
    IngestConnection,
};

const LOG_FILE_VAR: &str = "INGEST_LOG_FILE";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Internal log filter for `log_level`, with the HTTP stack silenced.
fn log_filter(log_level: &str) -> EnvFilter {
    let directives = format!("h2=off,hyper=off,rustls=off,{}", log_level);
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = DeliveryConfig::from_env();
    let log_level = config
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str());

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(log_filter(log_level))
        .event_format(Formatter)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
    }
    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(path) = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::var_os(LOG_FILE_VAR).map(PathBuf::from))
    else {
        error!("Usage: ingest-bulk-send <event log path> (or set {LOG_FILE_VAR})");
        return ExitCode::FAILURE;
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling bulk transfer");
            ctrl_c.cancel();
        }
    });

    let connection = IngestConnection::from_config(&config);
    let credential = ApplicationCredential::new(config.app_title.clone(), config.app_token.clone());

    if connection.admin_api_key().is_some() {
        let registrar = ApiKeyRegistrar::new(connection.clone(), config.minimum_level);
        match register(&registrar, &credential, REGISTRATION_ATTEMPT_TIMEOUT, &cancel).await {
            Ok(true) => info!("Application key '{}' registered", credential.title()),
            Ok(false) => {
                error!(
                    "Application key '{}' could not be registered",
                    credential.title()
                );
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!("Registration did not complete: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        debug!("No admin key configured, skipping registration");
    }

    let sender = ChunkedBulkSender::new(Arc::new(HttpChunkTransport::new(connection)));
    info!("Sending {}", path.display());
    match sender.send_file(&path, &credential, &cancel).await {
        Ok(summary) => {
            info!("Sent {} bytes in {} chunks", summary.bytes, summary.chunks);
            ExitCode::SUCCESS
        }
        Err(DeliveryError::Cancelled) => {
            warn!("Bulk transfer cancelled");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Bulk transfer failed: {e}");
            ExitCode::FAILURE
        }
    }
}
