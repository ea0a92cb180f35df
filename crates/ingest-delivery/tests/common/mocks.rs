// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock implementations of the delivery seams for testing

use async_trait::async_trait;
use bytes::Bytes;
use ingest_delivery::transport::ChunkTransport;
use ingest_delivery::{
    ApplicationCredential, Diagnostics, Event, EventSink, Registrar, TransmissionError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Downstream sink recording the message templates it receives
#[derive(Debug, Default)]
pub struct SpySink {
    received: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl SpySink {
    pub fn templates(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl EventSink for SpySink {
    fn emit(&self, event: Event) {
        self.received.lock().unwrap().push(event.message_template);
    }
}

/// Registrar answering from a script, then `false` forever
#[allow(dead_code)]
pub struct ScriptedRegistrar {
    outcomes: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedRegistrar {
    pub fn new(outcomes: &[bool]) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrar for ScriptedRegistrar {
    async fn try_register(&self, _credential: &ApplicationCredential) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// Registrar that declines the startup attempt and holds the next one until opened
#[allow(dead_code)]
#[derive(Default)]
pub struct GatedRegistrar {
    calls: AtomicUsize,
    gate: Notify,
}

#[allow(dead_code)]
impl GatedRegistrar {
    pub fn open(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrar for GatedRegistrar {
    async fn try_register(&self, _credential: &ApplicationCredential) -> bool {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return false;
        }
        self.gate.notified().await;
        true
    }
}

#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    messages: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingDiagnostics {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Transport recording every body it is asked to send
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingTransport {
    bodies: Mutex<Vec<Bytes>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChunkTransport for RecordingTransport {
    async fn send_chunk(
        &self,
        _credential: &ApplicationCredential,
        body: Bytes,
    ) -> Result<(), TransmissionError> {
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}
