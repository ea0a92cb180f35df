// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A registration attempt that ended without an answer from the service.
///
/// This is distinct from a declined registration, which is reported as
/// `Ok(false)` by [`crate::registrar::register`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationInterrupted {
    #[error("registration attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("registration attempt cancelled")]
    Cancelled,
}

/// Failure of a single chunk transmission.
#[derive(Debug, thiserror::Error)]
pub enum TransmissionError {
    #[error("ingestion endpoint answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("transmission task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

/// Outcome of a failed bulk transfer.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The caller's cancellation signal fired. Never wraps anything.
    #[error("delivery cancelled")]
    Cancelled,

    /// One or more transmissions failed; the causes are kept in order.
    #[error("event delivery failed: {}", join_causes(.0))]
    Failed(Vec<TransmissionError>),

    #[error("failed to read event log: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    #[must_use]
    pub fn causes(&self) -> &[TransmissionError] {
        match self {
            Self::Failed(causes) => causes,
            _ => &[],
        }
    }
}

fn join_causes(causes: &[TransmissionError]) -> String {
    causes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
