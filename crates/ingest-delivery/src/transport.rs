// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::connection::IngestConnection;
use crate::constants::{API_KEY_HEADER, CLEF_CONTENT_TYPE};
use crate::credential::ApplicationCredential;
use crate::error::TransmissionError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Puts one payload of newline-delimited events on the wire.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn send_chunk(
        &self,
        credential: &ApplicationCredential,
        body: Bytes,
    ) -> Result<(), TransmissionError>;
}

/// Posts payloads to the raw-events ingestion endpoint.
#[derive(Debug, Clone)]
pub struct HttpChunkTransport {
    connection: IngestConnection,
}

impl HttpChunkTransport {
    #[must_use]
    pub fn new(connection: IngestConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn send_chunk(
        &self,
        credential: &ApplicationCredential,
        body: Bytes,
    ) -> Result<(), TransmissionError> {
        let size = body.len();
        let resp = self
            .connection
            .client()
            .post(self.connection.raw_events_url())
            .header(API_KEY_HEADER, credential.token())
            .header(CONTENT_TYPE, CLEF_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!("Delivered {} bytes to the ingestion endpoint", size);
            return Ok(());
        }
        // Don't fail harder if the body can't be read, the status is enough
        let body = resp.text().await.unwrap_or_default();
        Err(TransmissionError::Status { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn transport_for(url: String) -> HttpChunkTransport {
        HttpChunkTransport::new(IngestConnection::new(url, None, reqwest::Client::new()))
    }

    #[tokio::test]
    async fn test_send_chunk_posts_body_with_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/events/raw")
            .match_header("X-Seq-ApiKey", "app-token")
            .match_header("Content-Type", "application/vnd.serilog.clef")
            .match_body("{\"@mt\":\"a\"}\n{\"@mt\":\"b\"}\n")
            .with_status(201)
            .create_async()
            .await;

        let credential = ApplicationCredential::new("billing", "app-token");
        let result = transport_for(server.url())
            .send_chunk(
                &credential,
                Bytes::from_static(b"{\"@mt\":\"a\"}\n{\"@mt\":\"b\"}\n"),
            )
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_chunk_reports_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/events/raw")
            .with_status(500)
            .with_body("ingestion paused")
            .create_async()
            .await;

        let credential = ApplicationCredential::new("billing", "app-token");
        let result = transport_for(server.url())
            .send_chunk(&credential, Bytes::from_static(b"{}\n"))
            .await;

        match result {
            Err(TransmissionError::Status { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "ingestion paused");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_chunk_reports_transport_error() {
        let credential = ApplicationCredential::new("billing", "app-token");
        let result = transport_for("http://127.0.0.1:1".to_string())
            .send_chunk(&credential, Bytes::from_static(b"{}\n"))
            .await;
        assert!(matches!(result, Err(TransmissionError::Transport(_))));
    }
}
