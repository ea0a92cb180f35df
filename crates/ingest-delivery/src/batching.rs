// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Downstream batcher that puts authorized events on the wire.
//!
//! # Actor pattern
//!
//! ```text
//!    ┌──────────────┐
//!    │ BatchingSink │ (cloneable, emit never blocks)
//!    └──────┬───────┘
//!           │ commands via unbounded channel
//!           v
//!    ┌─────────────────┐
//!    │ BatchingService │ (single task, owns the batch)
//!    └──────┬──────────┘
//!           │ one payload per flush
//!           v
//!    ┌─────────────────┐
//!    │ ChunkTransport  │
//!    └─────────────────┘
//! ```
//!
//! A batch is posted when it reaches [`MAX_BATCH_EVENTS`] events, when the
//! next event would bring it to the chunk size limit, on every flush tick, on
//! an explicit flush and when the service stops. Failed posts are reported to
//! the diagnostics channel and dropped.

use crate::constants::{BATCH_FLUSH_INTERVAL, CHUNK_SIZE_LIMIT_BYTES, MAX_BATCH_EVENTS};
use crate::credential::ApplicationCredential;
use crate::diagnostics::Diagnostics;
use crate::event::Event;
use crate::sink::EventSink;
use crate::transport::ChunkTransport;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug)]
pub enum BatchCommand {
    Insert(Event),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle producers emit into. Cheap to clone.
#[derive(Clone, Debug)]
pub struct BatchingSink {
    tx: mpsc::UnboundedSender<BatchCommand>,
}

impl BatchingSink {
    /// Posts everything accumulated so far and waits for the post to finish.
    pub async fn flush(&self) -> Result<(), String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(BatchCommand::Flush(response_tx))
            .map_err(|e| format!("Failed to send flush command: {}", e))?;

        response_rx
            .await
            .map_err(|e| format!("Failed to receive flush response: {}", e))
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<BatchCommand>> {
        self.tx.send(BatchCommand::Shutdown)
    }
}

impl EventSink for BatchingSink {
    fn emit(&self, event: Event) {
        if self.tx.send(BatchCommand::Insert(event)).is_err() {
            debug!("Batching service stopped, dropping event");
        }
    }
}

pub struct BatchingService {
    rx: mpsc::UnboundedReceiver<BatchCommand>,
    transport: Arc<dyn ChunkTransport>,
    credential: ApplicationCredential,
    diagnostics: Arc<dyn Diagnostics>,
    batch: Vec<u8>,
    batch_events: usize,
    max_batch_events: usize,
    max_batch_bytes: usize,
    flush_interval: Duration,
}

impl BatchingService {
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
        credential: ApplicationCredential,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> (Self, BatchingSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            rx,
            transport,
            credential,
            diagnostics,
            batch: Vec::new(),
            batch_events: 0,
            max_batch_events: MAX_BATCH_EVENTS,
            max_batch_bytes: CHUNK_SIZE_LIMIT_BYTES,
            flush_interval: BATCH_FLUSH_INTERVAL,
        };
        (service, BatchingSink { tx })
    }

    #[must_use]
    pub fn with_limits(mut self, max_batch_events: usize, max_batch_bytes: usize) -> Self {
        self.max_batch_events = max_batch_events.max(1);
        self.max_batch_bytes = max_batch_bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Processes commands until shutdown, cancellation or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("Batching service started");
        let mut ticker = tokio::time::interval(self.flush_interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(BatchCommand::Insert(event)) => self.insert(&event).await,
                    Some(BatchCommand::Flush(response_tx)) => {
                        self.flush().await;
                        if response_tx.send(()).is_err() {
                            error!("Failed to send flush response - receiver dropped");
                        }
                    }
                    Some(BatchCommand::Shutdown) | None => break,
                },
                _ = ticker.tick() => self.flush().await,
                () = cancel.cancelled() => break,
            }
        }

        self.flush().await;
        debug!("Batching service stopped");
    }

    async fn insert(&mut self, event: &Event) {
        let line = event.render_line();
        if self.batch_events > 0 && self.batch.len() + line.len() >= self.max_batch_bytes {
            self.flush().await;
        }
        self.batch.extend_from_slice(line.as_bytes());
        self.batch_events += 1;
        if self.batch_events >= self.max_batch_events {
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        if self.batch_events == 0 {
            return;
        }
        let events = std::mem::take(&mut self.batch_events);
        let body = Bytes::from(std::mem::take(&mut self.batch));
        if let Err(e) = self.transport.send_chunk(&self.credential, body).await {
            self.diagnostics
                .report(&format!("Failed to deliver a batch of {events} events: {e}"));
        }
    }
}
