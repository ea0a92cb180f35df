// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffering of events while the application credential is not yet authorized.
//!
//! # State machine
//!
//! ```text
//!              ┌────────────┐
//!              │  Pending   │  events are queued (drop-oldest)
//!              └─────┬──────┘
//!          success   │   retry budget exhausted
//!        ┌───────────┴───────────┐
//!        v                       v
//!  ┌────────────┐        ┌───────────────────┐
//!  │ Registered │        │ PermanentlyFailed │
//!  └────────────┘        └───────────────────┘
//!  forward directly       drop silently
//! ```
//!
//! Both terminal states are final. Only the registration worker moves the
//! state; [`BufferedDeliverySink`] only reads it.
//!
//! # Synchronization
//!
//! The state flip is the point producers synchronize on. The worker flips the
//! state and then drains the queue under a consumer-side lock. A producer that
//! enqueued after reading `Pending` re-reads the state; if it now observes
//! `Registered` it drains under the same lock, so no event is stranded and the
//! queued events still reach the downstream sink in FIFO order, exactly once.
//!
//! Direct forwarding starts only once the worker's drain has completed. Until
//! then a producer observing `Registered` still enqueues and drains under the
//! lock, so none of its events overtakes one of its own still queued.

use crate::diagnostics::Diagnostics;
use crate::event::Event;
use crate::queue::DeliveryQueue;
use crate::sink::EventSink;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrationState {
    Pending = 0,
    Registered = 1,
    PermanentlyFailed = 2,
}

impl RegistrationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Registered,
            2 => Self::PermanentlyFailed,
            _ => Self::Pending,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

/// State and queue shared between producers and the registration worker.
#[derive(Debug)]
pub(crate) struct DeliveryBuffer {
    state: AtomicU8,
    queue: DeliveryQueue<Event>,
    drain_lock: Mutex<()>,
    /// Set once the worker's drain after `Registered` has completed
    drained: AtomicBool,
    evicted: AtomicU64,
}

impl DeliveryBuffer {
    pub(crate) fn new(queue_size_limit: usize) -> Self {
        Self {
            state: AtomicU8::new(RegistrationState::Pending as u8),
            queue: DeliveryQueue::new(queue_size_limit),
            drain_lock: Mutex::new(()),
            drained: AtomicBool::new(false),
            evicted: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> RegistrationState {
        RegistrationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, to: RegistrationState) -> bool {
        self.state
            .compare_exchange(
                RegistrationState::Pending as u8,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Flips `Pending` to `Registered` and drains the queue into `downstream`.
    ///
    /// Returns the number of forwarded events, zero if the state was already terminal.
    pub(crate) fn mark_registered(
        &self,
        downstream: &dyn EventSink,
        diagnostics: &dyn Diagnostics,
    ) -> usize {
        if !self.transition(RegistrationState::Registered) {
            return 0;
        }
        fence(Ordering::SeqCst);
        let _guard = self
            .drain_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let forwarded = self.drain_locked(downstream, diagnostics);
        self.drained.store(true, Ordering::SeqCst);
        forwarded
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.drained.load(Ordering::SeqCst)
    }

    /// Flips `Pending` to `PermanentlyFailed` and discards the queue.
    ///
    /// Returns the number of discarded events.
    pub(crate) fn mark_failed(&self) -> usize {
        if !self.transition(RegistrationState::PermanentlyFailed) {
            return 0;
        }
        fence(Ordering::SeqCst);
        self.queue.clear()
    }

    fn drain_into(&self, downstream: &dyn EventSink, diagnostics: &dyn Diagnostics) -> usize {
        let _guard = self
            .drain_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.drain_locked(downstream, diagnostics)
    }

    /// Caller must hold `drain_lock`.
    fn drain_locked(&self, downstream: &dyn EventSink, diagnostics: &dyn Diagnostics) -> usize {
        let mut forwarded = 0;
        while let Some(event) = self.queue.pop() {
            forward(downstream, event, diagnostics);
            forwarded += 1;
        }
        forwarded
    }

    fn enqueue(&self, event: Event) {
        if self.queue.push(event).is_some() && self.evicted.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!(
                "Delivery queue is full ({} events), dropping oldest events until registration completes",
                self.queue.capacity()
            );
        }
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

/// Hands `event` to `downstream`, routing a panic to `diagnostics`.
pub(crate) fn forward(downstream: &dyn EventSink, event: Event, diagnostics: &dyn Diagnostics) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| downstream.emit(event))) {
        diagnostics.report(&format!(
            "Downstream sink failed to accept an event: {}",
            panic_message(panic.as_ref())
        ));
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Decorates a downstream sink with a bounded queue used until registration completes.
///
/// `emit` never fails and never blocks on the network:
/// - `Pending`: enqueue, evicting the oldest event when at capacity
/// - `Registered`: forward to the downstream sink
/// - `PermanentlyFailed`: drop
pub struct BufferedDeliverySink {
    buffer: Arc<DeliveryBuffer>,
    downstream: Arc<dyn EventSink>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl BufferedDeliverySink {
    #[must_use]
    pub fn new(
        queue_size_limit: usize,
        downstream: Arc<dyn EventSink>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            buffer: Arc::new(DeliveryBuffer::new(queue_size_limit)),
            downstream,
            diagnostics,
        }
    }

    #[must_use]
    pub fn state(&self) -> RegistrationState {
        self.buffer.state()
    }

    /// Number of events currently waiting for registration.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.buffer.queued()
    }

    /// Number of events dropped so far because the queue was full.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.buffer.evicted()
    }

    pub(crate) fn buffer(&self) -> Arc<DeliveryBuffer> {
        Arc::clone(&self.buffer)
    }

    pub(crate) fn downstream(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.downstream)
    }

    pub(crate) fn diagnostics(&self) -> Arc<dyn Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    fn emit_inner(&self, event: Event) {
        match self.buffer.state() {
            RegistrationState::PermanentlyFailed => {}
            RegistrationState::Registered if self.buffer.is_drained() => {
                self.downstream.emit(event);
            }
            RegistrationState::Registered => {
                // The worker is still draining; queue behind the earlier events
                self.buffer.enqueue(event);
                self.buffer
                    .drain_into(self.downstream.as_ref(), self.diagnostics.as_ref());
            }
            RegistrationState::Pending => {
                self.buffer.enqueue(event);
                fence(Ordering::SeqCst);
                // The worker may have flipped the state while we were enqueuing
                match self.buffer.state() {
                    RegistrationState::Pending => {}
                    RegistrationState::Registered => {
                        let drained = self
                            .buffer
                            .drain_into(self.downstream.as_ref(), self.diagnostics.as_ref());
                        if drained > 0 {
                            debug!("Forwarded {} late queued events", drained);
                        }
                    }
                    RegistrationState::PermanentlyFailed => {
                        self.buffer.queue.clear();
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for BufferedDeliverySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedDeliverySink")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl EventSink for BufferedDeliverySink {
    fn emit(&self, event: Event) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.emit_inner(event))) {
            self.diagnostics.report(&format!(
                "Failed to emit event: {}",
                panic_message(panic.as_ref())
            ));
        }
    }
}
