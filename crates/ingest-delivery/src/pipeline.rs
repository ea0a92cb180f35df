// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Construction of the sink handed to event producers.
//!
//! One registration attempt is made up front. Depending on its result the
//! producer gets the downstream batcher directly, a buffered sink fronted by a
//! running [`RegistrationWorker`], or nothing at all.

use crate::batching::{BatchingService, BatchingSink};
use crate::buffered::{BufferedDeliverySink, RegistrationState};
use crate::config::DeliveryConfig;
use crate::connection::IngestConnection;
use crate::constants::{DEFAULT_QUEUE_SIZE_LIMIT, STARTUP_REGISTRATION_TIMEOUT};
use crate::credential::ApplicationCredential;
use crate::diagnostics::Diagnostics;
use crate::event::{Event, Level};
use crate::registrar::{register, ApiKeyRegistrar, Registrar};
use crate::sink::EventSink;
use crate::transport::HttpChunkTransport;
use crate::worker::{RegistrationWorker, RegistrationWorkerHandle, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Buffer and keep retrying when the startup attempt fails
    pub retry_on_failure: bool,
    pub queue_size_limit: usize,
    /// Bound of the single attempt made before anything is constructed
    pub startup_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry_on_failure: true,
            queue_size_limit: DEFAULT_QUEUE_SIZE_LIMIT,
            startup_timeout: STARTUP_REGISTRATION_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn new(retry_on_failure: bool, retry_count: Option<u32>) -> Self {
        Self {
            retry_on_failure,
            retry_policy: RetryPolicy::with_retry_count(retry_count),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            queue_size_limit: config.queue_size_limit,
            ..Self::new(config.retry_on_failure, config.retry_count)
        }
    }
}

/// The sink producers emit into.
pub enum Pipeline {
    /// The credential was authorized up front; events go straight downstream.
    Direct(Arc<dyn EventSink>),
    /// Events are buffered until the worker registers the credential.
    Buffered {
        sink: Arc<BufferedDeliverySink>,
        worker: RegistrationWorkerHandle,
    },
}

impl Pipeline {
    #[must_use]
    pub fn state(&self) -> RegistrationState {
        match self {
            Self::Direct(_) => RegistrationState::Registered,
            Self::Buffered { sink, .. } => sink.state(),
        }
    }

    #[must_use]
    pub fn is_buffered(&self) -> bool {
        matches!(self, Self::Buffered { .. })
    }

    #[must_use]
    pub fn worker(&self) -> Option<&RegistrationWorkerHandle> {
        match self {
            Self::Direct(_) => None,
            Self::Buffered { worker, .. } => Some(worker),
        }
    }
}

impl EventSink for Pipeline {
    fn emit(&self, event: Event) {
        match self {
            Self::Direct(downstream) => downstream.emit(event),
            Self::Buffered { sink, .. } => sink.emit(event),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Pipeline::Direct"),
            Self::Buffered { sink, worker } => f
                .debug_struct("Pipeline::Buffered")
                .field("sink", sink)
                .field("worker", worker)
                .finish(),
        }
    }
}

pub struct PipelineFactory {
    registrar: Arc<dyn Registrar>,
    downstream: Arc<dyn EventSink>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl PipelineFactory {
    #[must_use]
    pub fn new(
        registrar: Arc<dyn Registrar>,
        downstream: Arc<dyn EventSink>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registrar,
            downstream,
            diagnostics,
        }
    }

    /// Wires the HTTP registrar and a batcher posting to `connection`.
    ///
    /// The returned [`BatchingService`] must be run (usually spawned) by the
    /// caller; the [`BatchingSink`] can be used to flush it.
    #[must_use]
    pub fn connect(
        connection: IngestConnection,
        credential: &ApplicationCredential,
        minimum_level: Level,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> (Self, BatchingService, BatchingSink) {
        let transport = Arc::new(HttpChunkTransport::new(connection.clone()));
        let (service, batcher) =
            BatchingService::new(transport, credential.clone(), Arc::clone(&diagnostics));
        let registrar = Arc::new(ApiKeyRegistrar::new(connection, minimum_level));
        let factory = Self::new(registrar, Arc::new(batcher.clone()), diagnostics);
        (factory, service, batcher)
    }

    /// Makes one bounded registration attempt and builds the matching pipeline.
    ///
    /// Returns `None` when the attempt fails and `retry_on_failure` is off,
    /// or when the registration worker cannot be started.
    pub async fn create_pipeline(
        &self,
        credential: ApplicationCredential,
        options: PipelineOptions,
    ) -> Option<Pipeline> {
        let registered = match register(
            self.registrar.as_ref(),
            &credential,
            options.startup_timeout,
            &CancellationToken::new(),
        )
        .await
        {
            Ok(registered) => registered,
            Err(e) => {
                debug!("Startup registration did not complete: {}", e);
                false
            }
        };

        if registered {
            info!(
                "Application key '{}' registered, delivering directly",
                credential.title()
            );
            return Some(Pipeline::Direct(Arc::clone(&self.downstream)));
        }

        if !options.retry_on_failure {
            warn!(
                "Application key '{}' could not be registered, delivery is disabled",
                credential.title()
            );
            return None;
        }

        let sink = Arc::new(BufferedDeliverySink::new(
            options.queue_size_limit,
            Arc::clone(&self.downstream),
            Arc::clone(&self.diagnostics),
        ));
        let worker = RegistrationWorker::new(
            Arc::clone(&self.registrar),
            credential,
            &sink,
            options.retry_policy,
        );
        match worker.start() {
            Ok(worker) => {
                info!(
                    "Registration pending, buffering up to {} events",
                    options.queue_size_limit
                );
                Some(Pipeline::Buffered { sink, worker })
            }
            Err(e) => {
                self.diagnostics
                    .report(&format!("Failed to start registration worker: {e}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedRegistrar {
        outcomes: Mutex<VecDeque<bool>>,
        calls: AtomicUsize,
    }

    impl ScriptedRegistrar {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Registrar for ScriptedRegistrar {
        async fn try_register(&self, _credential: &ApplicationCredential) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap().pop_front().unwrap_or(false)
        }
    }

    struct HangingRegistrar;

    #[async_trait]
    impl Registrar for HangingRegistrar {
        async fn try_register(&self, _credential: &ApplicationCredential) -> bool {
            std::future::pending::<()>().await;
            true
        }
    }

    #[derive(Debug, Default)]
    struct SpySink {
        received: Mutex<Vec<String>>,
    }

    impl EventSink for SpySink {
        fn emit(&self, event: Event) {
            self.received.lock().unwrap().push(event.message_template);
        }
    }

    #[derive(Debug, Default)]
    struct RecordingDiagnostics {
        messages: Mutex<Vec<String>>,
    }

    impl Diagnostics for RecordingDiagnostics {
        fn report(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn credential() -> ApplicationCredential {
        ApplicationCredential::new("billing", "app-token")
    }

    fn factory(registrar: Arc<dyn Registrar>, downstream: Arc<SpySink>) -> PipelineFactory {
        PipelineFactory::new(
            registrar,
            downstream,
            Arc::new(RecordingDiagnostics::default()),
        )
    }

    #[tokio::test]
    async fn test_registered_up_front_is_direct() {
        let registrar = Arc::new(ScriptedRegistrar::new(&[true]));
        let downstream = Arc::new(SpySink::default());
        let pipeline = factory(registrar.clone(), downstream.clone())
            .create_pipeline(credential(), PipelineOptions::default())
            .await
            .unwrap();

        assert!(!pipeline.is_buffered());
        assert!(pipeline.worker().is_none());
        assert_eq!(pipeline.state(), RegistrationState::Registered);
        pipeline.emit(Event::new(Level::Information, "hello"));
        assert_eq!(*downstream.received.lock().unwrap(), vec!["hello"]);
        assert_eq!(registrar.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_without_retry_returns_none() {
        let registrar = Arc::new(ScriptedRegistrar::new(&[false]));
        let pipeline = factory(registrar.clone(), Arc::default())
            .create_pipeline(credential(), PipelineOptions::new(false, None))
            .await;

        assert!(pipeline.is_none());
        assert_eq!(registrar.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_startup_timeout_counts_as_failure() {
        let options = PipelineOptions {
            startup_timeout: Duration::from_millis(20),
            ..PipelineOptions::new(false, None)
        };
        let pipeline = factory(Arc::new(HangingRegistrar), Arc::default())
            .create_pipeline(credential(), options)
            .await;

        assert!(pipeline.is_none());
    }

    #[tokio::test]
    async fn test_failure_with_retry_buffers_until_registered() {
        // Startup attempt fails, the worker's first attempt succeeds
        let registrar = Arc::new(ScriptedRegistrar::new(&[false, true]));
        let downstream = Arc::new(SpySink::default());
        let options = PipelineOptions {
            retry_policy: RetryPolicy {
                retry_count: Some(3),
                attempt_timeout: Duration::from_secs(1),
                backoff: Duration::from_millis(10),
            },
            ..PipelineOptions::default()
        };
        let pipeline = factory(registrar.clone(), downstream.clone())
            .create_pipeline(credential(), options)
            .await
            .unwrap();

        assert!(pipeline.is_buffered());
        let Pipeline::Buffered { worker, .. } = pipeline else {
            panic!("expected a buffered pipeline");
        };
        let outcome = tokio::task::spawn_blocking(move || worker.join())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            Some(crate::worker::RegistrationOutcome::Registered { attempts: 1, .. })
        ));
        assert_eq!(registrar.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_options_from_config() {
        let config = DeliveryConfig {
            retry_on_failure: false,
            retry_count: Some(4),
            queue_size_limit: 12,
            ..DeliveryConfig::default()
        };
        let options = PipelineOptions::from_config(&config);

        assert!(!options.retry_on_failure);
        assert_eq!(options.queue_size_limit, 12);
        assert_eq!(options.retry_policy.retry_count, Some(4));
        assert_eq!(options.startup_timeout, STARTUP_REGISTRATION_TIMEOUT);
    }
}
