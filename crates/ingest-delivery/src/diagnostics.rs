// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Self-diagnostic channel of the delivery pipeline.
//!
//! Components that must never surface a failure to the event producer (the
//! buffered sink, the registration worker, the batcher) report internal faults
//! here instead. The channel is passed explicitly to each component.

use std::fmt::Debug;
use tracing::error;

pub trait Diagnostics: Send + Sync + Debug {
    /// Records one internal fault or notable transition.
    fn report(&self, message: &str);
}

/// Forwards diagnostics to the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, message: &str) {
        error!("INGEST | {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_diagnostics_does_not_panic_without_subscriber() {
        TracingDiagnostics.report("registration failed");
    }
}
