// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::Event;

/// A consumer of events.
///
/// Implemented by the downstream batcher, by the buffered sink that fronts it
/// while unauthorized, and by the pipeline handed to producers. `emit` is
/// called from arbitrary producer threads and must not block on the network.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn emit(&self, event: Event) {
        (**self).emit(event);
    }
}
