// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bulk transfer of a previously written event log.
//!
//! # Pipelining
//!
//! ```text
//!   reader   │ accumulate chunk 1 │ accumulate chunk 2 │ accumulate chunk 3 │
//!   network  │                    │   send chunk 1     │   send chunk 2     │ send 3
//!                                 ^                    ^
//!                          start chunk 1        await chunk 1, start chunk 2
//! ```
//!
//! The log is read line by line into an accumulator. When the next line would
//! bring the accumulator to the chunk limit, the previous transmission is
//! awaited, the accumulator is handed to a new transmission task and reading
//! resumes immediately. At most one transmission is in flight and chunks go
//! out in the order they were cut.
//!
//! # Oversized lines
//!
//! No chunk is cut while the accumulator is empty. A line that alone reaches
//! the limit is therefore sent as a chunk of its own, above the limit, rather
//! than being preceded by an empty request.
//!
//! # Errors
//!
//! A failed transmission stops the transfer and is returned inside
//! [`DeliveryError::Failed`]. Cancellation is returned as
//! [`DeliveryError::Cancelled`] and aborts the in-flight transmission.

use crate::constants::CHUNK_SIZE_LIMIT_BYTES;
use crate::credential::ApplicationCredential;
use crate::error::{DeliveryError, TransmissionError};
use crate::transport::ChunkTransport;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Transmission = JoinHandle<Result<(), TransmissionError>>;

/// What a completed bulk transfer sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub chunks: usize,
    pub bytes: u64,
}

#[derive(Clone)]
pub struct ChunkedBulkSender {
    transport: Arc<dyn ChunkTransport>,
    chunk_size_limit: usize,
}

impl ChunkedBulkSender {
    #[must_use]
    pub fn new(transport: Arc<dyn ChunkTransport>) -> Self {
        Self {
            transport,
            chunk_size_limit: CHUNK_SIZE_LIMIT_BYTES,
        }
    }

    /// Overrides the chunk limit. A limit of zero is treated as one byte.
    #[must_use]
    pub fn with_chunk_size_limit(mut self, chunk_size_limit: usize) -> Self {
        self.chunk_size_limit = chunk_size_limit.max(1);
        self
    }

    #[must_use]
    pub fn chunk_size_limit(&self) -> usize {
        self.chunk_size_limit
    }

    /// Streams the event log at `path` to the ingestion endpoint.
    pub async fn send_file(
        &self,
        path: impl AsRef<Path>,
        credential: &ApplicationCredential,
        cancel: &CancellationToken,
    ) -> Result<SendSummary, DeliveryError> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        self.send_log(BufReader::new(file), credential, cancel)
            .await
    }

    /// Streams `source` to the ingestion endpoint in size-bounded chunks.
    ///
    /// Lines keep their terminators, so the concatenated chunk bodies equal the source.
    pub async fn send_log<R>(
        &self,
        mut source: R,
        credential: &ApplicationCredential,
        cancel: &CancellationToken,
    ) -> Result<SendSummary, DeliveryError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut in_flight: Option<Transmission> = None;
        let mut chunk: Vec<u8> = Vec::new();
        let mut line: Vec<u8> = Vec::new();
        let mut summary = SendSummary::default();

        loop {
            if cancel.is_cancelled() {
                abort(in_flight.take());
                return Err(DeliveryError::Cancelled);
            }

            line.clear();
            let read = match source.read_until(b'\n', &mut line).await {
                Ok(read) => read,
                Err(e) => {
                    abort(in_flight.take());
                    return Err(e.into());
                }
            };
            if read == 0 {
                break;
            }

            if !chunk.is_empty() && chunk.len() + line.len() >= self.chunk_size_limit {
                settle(&mut in_flight, cancel).await?;
                let body = std::mem::take(&mut chunk);
                summary.chunks += 1;
                summary.bytes += body.len() as u64;
                in_flight = Some(self.transmit(body, credential));
            }

            chunk.extend_from_slice(&line);
        }

        settle(&mut in_flight, cancel).await?;
        if !chunk.is_empty() {
            summary.chunks += 1;
            summary.bytes += chunk.len() as u64;
            in_flight = Some(self.transmit(chunk, credential));
            settle(&mut in_flight, cancel).await?;
        }

        debug!(
            "Bulk transfer complete: {} chunks, {} bytes",
            summary.chunks, summary.bytes
        );
        Ok(summary)
    }

    fn transmit(&self, body: Vec<u8>, credential: &ApplicationCredential) -> Transmission {
        let transport = Arc::clone(&self.transport);
        let credential = credential.clone();
        debug!("Starting transmission of a {} byte chunk", body.len());
        tokio::spawn(async move { transport.send_chunk(&credential, Bytes::from(body)).await })
    }
}

impl std::fmt::Debug for ChunkedBulkSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedBulkSender")
            .field("chunk_size_limit", &self.chunk_size_limit)
            .finish_non_exhaustive()
    }
}

fn abort(transmission: Option<Transmission>) {
    if let Some(handle) = transmission {
        handle.abort();
    }
}

/// Waits for the in-flight transmission, if any.
async fn settle(
    in_flight: &mut Option<Transmission>,
    cancel: &CancellationToken,
) -> Result<(), DeliveryError> {
    let Some(handle) = in_flight.take() else {
        return Ok(());
    };
    let abort_handle = handle.abort_handle();

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            abort_handle.abort();
            Err(DeliveryError::Cancelled)
        }
        joined = handle => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryError::Failed(vec![e])),
            Err(e) if e.is_cancelled() => Err(DeliveryError::Cancelled),
            Err(e) => Err(DeliveryError::Failed(vec![TransmissionError::Task(e)])),
        }
    }
}
