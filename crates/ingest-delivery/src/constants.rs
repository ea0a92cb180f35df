// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed limits, timings and wire strings shared by the delivery pipeline.
//!
//! # Timings
//!
//! Registration uses two different attempt timeouts:
//! - **Startup**: a short bound ([`STARTUP_REGISTRATION_TIMEOUT`]) so building a
//!   pipeline never stalls the host application for long
//! - **Background**: a longer bound ([`REGISTRATION_ATTEMPT_TIMEOUT`]) for each
//!   retry performed by the registration worker
//!
//! Retries are spaced by a constant [`RETRY_BACKOFF_INTERVAL`]. There is no
//! exponential growth.

use std::time::Duration;

/// Maximum number of bytes accumulated into one bulk-transfer chunk.
///
/// # Value: 5MB (5,242,880 bytes)
///
/// A chunk is finalized before the line that would make it reach this size is
/// appended, so regular chunks stay strictly below the limit.
pub const CHUNK_SIZE_LIMIT_BYTES: usize = 5 * 1_024 * 1_024;

/// Default capacity of the queue that buffers events while unauthorized.
pub const DEFAULT_QUEUE_SIZE_LIMIT: usize = 100_000;

/// Upper bound for a single background registration attempt.
pub const REGISTRATION_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the registration attempt made while building a pipeline.
pub const STARTUP_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between two unsuccessful registration attempts.
pub const RETRY_BACKOFF_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum number of events in one payload posted by the downstream batcher.
pub const MAX_BATCH_EVENTS: usize = 1_000;

/// Period at which the downstream batcher posts whatever it has accumulated.
pub const BATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying either the application token or the admin key.
pub const API_KEY_HEADER: &str = "X-Seq-ApiKey";

/// Media type of newline-delimited compact JSON event payloads.
pub const CLEF_CONTENT_TYPE: &str = "application/vnd.serilog.clef";

/// Path of the raw-events ingestion endpoint.
pub const RAW_EVENTS_PATH: &str = "/api/events/raw";

/// Path of the key-management endpoint.
pub const API_KEYS_PATH: &str = "/api/apikeys";

/// Permission granted to every registered application key.
pub const INGEST_PERMISSION: &str = "Ingest";

/// Name of the property the service stamps on events received with the key.
pub const APPLICATION_PROPERTY: &str = "Application";
