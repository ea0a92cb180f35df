// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Authorization of an application credential with the ingestion service.
//!
//! A [`Registrar`] performs exactly one attempt and has no retry logic. The
//! [`register`] helper bounds an attempt with a timeout and a cancellation
//! token and keeps the two outcomes apart:
//!
//! - `Ok(true)`: the credential is authorized
//! - `Ok(false)`: the service was unreachable or declined (retryable)
//! - `Err(RegistrationInterrupted)`: the attempt was cut short
//!
//! # Wire protocol
//!
//! ```text
//!   POST /api/apikeys ──► 2xx ─────────────────────────────► registered
//!        │
//!        └─► 409 (already exists)
//!               │
//!               v
//!           GET /api/apikeys ──► find by title
//!               │
//!               v
//!           PUT /api/apikeys/{id} (applied properties) ──► 2xx ► registered
//! ```

use crate::connection::IngestConnection;
use crate::constants::{API_KEY_HEADER, APPLICATION_PROPERTY, INGEST_PERMISSION};
use crate::credential::ApplicationCredential;
use crate::error::RegistrationInterrupted;
use crate::event::Level;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[async_trait]
pub trait Registrar: Send + Sync {
    /// Makes one authorization attempt for `credential`.
    ///
    /// Returns `false` for every ordinary failure; never panics on I/O errors.
    async fn try_register(&self, credential: &ApplicationCredential) -> bool;
}

/// Runs one registration attempt bounded by `timeout` and `cancel`.
///
/// Cancellation takes precedence when both fire together.
pub async fn register(
    registrar: &dyn Registrar,
    credential: &ApplicationCredential,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<bool, RegistrationInterrupted> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RegistrationInterrupted::Cancelled),
        result = tokio::time::timeout(timeout, registrar.try_register(credential)) => {
            result.map_err(|_| RegistrationInterrupted::TimedOut(timeout))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ApiKeyRequest<'a> {
    title: &'a str,
    token: &'a str,
    assigned_permissions: [&'static str; 1],
    input_settings: InputSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InputSettings {
    minimum_level: Level,
    applied_properties: Vec<AppliedProperty>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AppliedProperty {
    name: &'static str,
    value: String,
}

fn applied_properties(credential: &ApplicationCredential) -> Vec<AppliedProperty> {
    vec![AppliedProperty {
        name: APPLICATION_PROPERTY,
        value: credential.title().to_string(),
    }]
}

enum CreateOutcome {
    Created,
    AlreadyExists,
    Declined(StatusCode),
}

/// Registers credentials through the service's key-management endpoint.
#[derive(Debug, Clone)]
pub struct ApiKeyRegistrar {
    connection: IngestConnection,
    minimum_level: Level,
}

impl ApiKeyRegistrar {
    #[must_use]
    pub fn new(connection: IngestConnection, minimum_level: Level) -> Self {
        Self {
            connection,
            minimum_level,
        }
    }

    fn with_admin_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.connection.admin_api_key() {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn create(
        &self,
        credential: &ApplicationCredential,
    ) -> Result<CreateOutcome, reqwest::Error> {
        let body = ApiKeyRequest {
            title: credential.title(),
            token: credential.token(),
            assigned_permissions: [INGEST_PERMISSION],
            input_settings: InputSettings {
                minimum_level: self.minimum_level,
                applied_properties: applied_properties(credential),
            },
        };
        let request = self
            .connection
            .client()
            .post(self.connection.api_keys_url())
            .json(&body);
        let resp = self.with_admin_key(request).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }
        if status == StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }
        if status == StatusCode::BAD_REQUEST {
            let text = resp.text().await.unwrap_or_default();
            if text.to_lowercase().contains("already exists") {
                return Ok(CreateOutcome::AlreadyExists);
            }
        }
        Ok(CreateOutcome::Declined(status))
    }

    /// Replaces the applied properties of the existing entry with `credential`'s title.
    async fn update_applied_properties(
        &self,
        credential: &ApplicationCredential,
    ) -> Result<bool, reqwest::Error> {
        let request = self.connection.client().get(self.connection.api_keys_url());
        let resp = self.with_admin_key(request).send().await?;
        if !resp.status().is_success() {
            warn!("Listing application keys failed: {}", resp.status());
            return Ok(false);
        }
        let entries: Vec<Value> = resp.json().await?;

        let Some(mut entry) = entries
            .into_iter()
            .find(|entry| entry.get("Title").and_then(Value::as_str) == Some(credential.title()))
        else {
            warn!(
                "Application key '{}' reported as existing but was not listed",
                credential.title()
            );
            return Ok(false);
        };
        let Some(id) = entry.get("Id").and_then(Value::as_str).map(str::to_string) else {
            warn!("Application key '{}' has no id", credential.title());
            return Ok(false);
        };

        let properties = json!(applied_properties(credential));
        match entry.get_mut("InputSettings") {
            Some(Value::Object(settings)) => {
                settings.insert("AppliedProperties".to_string(), properties);
            }
            _ => {
                entry["InputSettings"] = json!({ "AppliedProperties": properties });
            }
        }

        let request = self
            .connection
            .client()
            .put(self.connection.api_key_url(&id))
            .json(&entry);
        let resp = self.with_admin_key(request).send().await?;
        if resp.status().is_success() {
            Ok(true)
        } else {
            warn!(
                "Updating application key '{}' failed: {}",
                credential.title(),
                resp.status()
            );
            Ok(false)
        }
    }
}

#[async_trait]
impl Registrar for ApiKeyRegistrar {
    async fn try_register(&self, credential: &ApplicationCredential) -> bool {
        match self.create(credential).await {
            Ok(CreateOutcome::Created) => {
                debug!("Registered application key '{}'", credential.title());
                true
            }
            Ok(CreateOutcome::AlreadyExists) => {
                debug!(
                    "Application key '{}' already exists, updating applied properties",
                    credential.title()
                );
                match self.update_applied_properties(credential).await {
                    Ok(updated) => updated,
                    Err(e) => {
                        warn!("Failed to update application key: {}", e);
                        false
                    }
                }
            }
            Ok(CreateOutcome::Declined(status)) => {
                warn!(
                    "Registration of application key '{}' declined: {}",
                    credential.title(),
                    status
                );
                false
            }
            Err(e) => {
                warn!("Failed to reach the key-management endpoint: {}", e);
                false
            }
        }
    }
}
