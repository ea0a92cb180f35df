// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background registration retry loop.
//!
//! # Loop
//!
//! ```text
//!   ┌──────────────────────┐
//!   │ attempt (10s bound)  │◄─────────────┐
//!   └──────────┬───────────┘              │
//!              │                          │
//!     success  │  declined / timed out    │
//!   ┌──────────┴──────────┐               │
//!   v                     v               │
//! Registered        budget left? ── yes ──► sleep 10s
//! drain queue             │
//!                         no
//!                         v
//!                 PermanentlyFailed
//!                 clear queue
//! ```
//!
//! The worker runs on one dedicated OS thread with its own single-threaded
//! runtime, so an unbounded retry loop never occupies a worker of the host's
//! shared runtime. Inside that thread the loop is an async task that selects
//! over the backoff timer and a cancellation token.
//!
//! Dropping the [`RegistrationWorkerHandle`] detaches the worker; only
//! [`RegistrationWorkerHandle::stop`] ends the loop early. A stopped worker
//! moves the buffer to `PermanentlyFailed` so producers stop queueing events
//! nobody will drain.

use crate::buffered::{BufferedDeliverySink, DeliveryBuffer, RegistrationState};
use crate::constants::{REGISTRATION_ATTEMPT_TIMEOUT, RETRY_BACKOFF_INTERVAL};
use crate::credential::ApplicationCredential;
use crate::diagnostics::Diagnostics;
use crate::error::RegistrationInterrupted;
use crate::registrar::{register, Registrar};
use crate::sink::EventSink;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WORKER_THREAD_NAME: &str = "ingest-registration";

/// Retry behaviour of the registration worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts made by the worker, `None` for unbounded.
    pub retry_count: Option<u32>,
    pub attempt_timeout: Duration,
    /// Constant pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: None,
            attempt_timeout: REGISTRATION_ATTEMPT_TIMEOUT,
            backoff: RETRY_BACKOFF_INTERVAL,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_retry_count(retry_count: Option<u32>) -> Self {
        Self {
            retry_count,
            ..Default::default()
        }
    }
}

/// How the worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { attempts: u32, forwarded: usize },
    PermanentlyFailed { attempts: u32, discarded: usize },
    /// Stopped through the handle; the queue was discarded.
    Stopped { attempts: u32, discarded: usize },
}

pub struct RegistrationWorker {
    registrar: Arc<dyn Registrar>,
    credential: ApplicationCredential,
    buffer: Arc<DeliveryBuffer>,
    downstream: Arc<dyn EventSink>,
    diagnostics: Arc<dyn Diagnostics>,
    policy: RetryPolicy,
}

impl RegistrationWorker {
    /// Creates a worker driving `sink`'s state. Nothing runs until [`start`](Self::start)
    /// or [`run`](Self::run) is called.
    #[must_use]
    pub fn new(
        registrar: Arc<dyn Registrar>,
        credential: ApplicationCredential,
        sink: &BufferedDeliverySink,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registrar,
            credential,
            buffer: sink.buffer(),
            downstream: sink.downstream(),
            diagnostics: sink.diagnostics(),
            policy,
        }
    }

    /// Runs the retry loop until a terminal state is reached or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> RegistrationOutcome {
        let mut attempts: u32 = 0;
        // A zero budget allows no attempt at all
        if self.policy.retry_count == Some(0) {
            return self.give_up(attempts);
        }
        loop {
            attempts = attempts.saturating_add(1);
            match register(
                self.registrar.as_ref(),
                &self.credential,
                self.policy.attempt_timeout,
                &cancel,
            )
            .await
            {
                Ok(true) => {
                    let forwarded = self
                        .buffer
                        .mark_registered(self.downstream.as_ref(), self.diagnostics.as_ref());
                    info!(
                        "Application key '{}' registered after {} attempt(s), forwarded {} queued events",
                        self.credential.title(),
                        attempts,
                        forwarded
                    );
                    return RegistrationOutcome::Registered {
                        attempts,
                        forwarded,
                    };
                }
                Ok(false) => {
                    debug!("Registration attempt {} declined", attempts);
                }
                Err(RegistrationInterrupted::TimedOut(timeout)) => {
                    warn!(
                        "Registration attempt {} timed out after {:?}",
                        attempts, timeout
                    );
                }
                Err(RegistrationInterrupted::Cancelled) => {
                    debug!("Registration worker stopped during attempt {}", attempts);
                    return self.stopped(attempts);
                }
            }

            if let Some(limit) = self.policy.retry_count {
                if attempts >= limit {
                    return self.give_up(attempts);
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Registration worker stopped during backoff");
                    return self.stopped(attempts);
                }
                () = tokio::time::sleep(self.policy.backoff) => {}
            }
        }
    }

    fn give_up(&self, attempts: u32) -> RegistrationOutcome {
        let discarded = self.buffer.mark_failed();
        self.diagnostics.report(&format!(
            "Giving up registering application key '{}' after {} attempts, discarded {} queued events",
            self.credential.title(),
            attempts,
            discarded
        ));
        RegistrationOutcome::PermanentlyFailed {
            attempts,
            discarded,
        }
    }

    fn stopped(&self, attempts: u32) -> RegistrationOutcome {
        let discarded = self.buffer.mark_failed();
        self.diagnostics.report(&format!(
            "Registration of application key '{}' stopped after {} attempts, discarded {} queued events",
            self.credential.title(),
            attempts,
            discarded
        ));
        RegistrationOutcome::Stopped {
            attempts,
            discarded,
        }
    }

    /// Spawns the retry loop on its own thread and returns a handle to it.
    pub fn start(self) -> std::io::Result<RegistrationWorkerHandle> {
        let cancel = CancellationToken::new();
        let buffer = Arc::clone(&self.buffer);
        let token = cancel.clone();

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(self.run(token)),
                    Err(e) => {
                        self.diagnostics.report(&format!(
                            "Failed to start registration runtime: {e}"
                        ));
                        self.stopped(0)
                    }
                }
            })?;

        Ok(RegistrationWorkerHandle {
            cancel,
            buffer,
            thread: Some(thread),
        })
    }
}

/// Control over a started [`RegistrationWorker`]. Dropping the handle detaches the worker.
#[derive(Debug)]
pub struct RegistrationWorkerHandle {
    cancel: CancellationToken,
    buffer: Arc<DeliveryBuffer>,
    thread: Option<JoinHandle<RegistrationOutcome>>,
}

impl RegistrationWorkerHandle {
    #[must_use]
    pub fn state(&self) -> RegistrationState {
        self.buffer.state()
    }

    /// Asks the worker to stop at its next await point.
    ///
    /// Unless registration already completed, the buffer becomes
    /// `PermanentlyFailed` and its queue is discarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the worker thread exits.
    ///
    /// Returns `None` if the thread was already joined or panicked.
    pub fn join(self) -> Option<RegistrationOutcome> {
        self.thread?.join().ok()
    }
}
