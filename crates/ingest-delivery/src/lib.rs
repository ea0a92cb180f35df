// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reliable delivery of structured events to an ingestion service that has to
//! authorize the producing application first.
//!
//! - [`pipeline`]: one startup registration attempt decides between a direct
//!   sink and a [`buffered`] sink driven by a background [`worker`]
//! - [`registrar`]: authorization of the application credential
//! - [`bulk`]: chunked, pipelined upload of a previously written event log
//! - [`batching`]: the downstream batcher putting events on the wire

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batching;
pub mod buffered;
pub mod bulk;
pub mod config;
pub mod connection;
pub mod constants;
pub mod credential;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod http;
pub mod logger;
pub mod pipeline;
pub mod queue;
pub mod registrar;
pub mod sink;
pub mod transport;
pub mod worker;

pub use buffered::{BufferedDeliverySink, RegistrationState};
pub use bulk::{ChunkedBulkSender, SendSummary};
pub use config::DeliveryConfig;
pub use connection::IngestConnection;
pub use credential::ApplicationCredential;
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use error::{ConfigError, DeliveryError, RegistrationInterrupted, TransmissionError};
pub use event::{Event, Level};
pub use pipeline::{Pipeline, PipelineFactory, PipelineOptions};
pub use registrar::{ApiKeyRegistrar, Registrar};
pub use sink::EventSink;
pub use worker::{RegistrationOutcome, RegistrationWorker, RegistrationWorkerHandle, RetryPolicy};
