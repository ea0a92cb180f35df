// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

/// The (title, token) pair identifying an application to the ingestion service.
///
/// The token is presented on every registration attempt and every bulk-send
/// request. `Debug` output never includes it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApplicationCredential {
    title: String,
    token: String,
}

impl ApplicationCredential {
    #[must_use]
    pub fn new(title: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            token: token.into(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Debug for ApplicationCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationCredential")
            .field("title", &self.title)
            .field("token", &"<redacted>")
            .finish()
    }
}
