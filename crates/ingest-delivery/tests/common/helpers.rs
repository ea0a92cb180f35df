// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use ingest_delivery::{ApplicationCredential, Event, IngestConnection, Level};
use std::time::Duration;

pub fn credential() -> ApplicationCredential {
    ApplicationCredential::new("billing", "app-token")
}

pub fn event(template: &str) -> Event {
    Event::new(Level::Information, template)
}

/// Connection to a mock server with a short-timeout client.
pub fn connection(server_url: String) -> IngestConnection {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build test client");
    IngestConnection::new(server_url, Some("admin-key".to_string()), client)
}

/// Builds a log of exactly `total` bytes made of newline-terminated lines of `line_len` bytes.
///
/// The last line is shorter when `total` is not a multiple of `line_len`.
pub fn synthetic_log(total: usize, line_len: usize) -> Vec<u8> {
    let mut log = Vec::with_capacity(total);
    let mut n = 0usize;
    while log.len() < total {
        let len = line_len.min(total - log.len());
        let fill = b'a' + (n % 26) as u8;
        log.extend(std::iter::repeat(fill).take(len - 1));
        log.push(b'\n');
        n += 1;
    }
    log
}
