//! Chunked upload protocol for large object bodies
//!
//! Splits a byte stream into bounded-size chunks and drives each chunk
//! through the retrier. Two finalization strategies exist, selected by
//! backend capability: sequential writes into one stateful remote writer,
//! and independently-uploaded temporary parts composed into the final
//! object. Chunk order is strictly sequential in both.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::retry::{Retrier, RetryPolicy};

/// A transient unit of transfer, created and destroyed within one put
/// call. Indices are 0-based, contiguous, and assigned in stream order.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub name: String,
    pub index: usize,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Single stateful remote writer for one object; bytes must arrive in
/// chunk order and the writer is never reopened mid-object.
#[async_trait]
pub trait ChunkWriter: Send {
    /// Writes one chunk. A retry resends the same chunk's bytes into the
    /// same writer; prior chunks are never resent.
    async fn write_chunk(&mut self, chunk: &Chunk) -> Result<()>;

    /// Releases the writer on a failure path. Best effort.
    async fn abort(&mut self) -> Result<()> {
        Ok(())
    }

    /// Finalizes the object. Failure here is terminal for the whole put.
    async fn close(self) -> Result<()>;
}

/// Store of independently-retryable temporary parts, later composed into
/// the final object. Each part upload is a fresh remote write, so a retry
/// carries no partial-write state.
#[async_trait]
pub trait PartStore: Send + Sync {
    /// Name of the temporary part holding chunk `index` of `name`.
    fn part_name(&self, name: &str, index: usize) -> String {
        format!("{name}_part_{index:04}")
    }

    /// Uploads one chunk as its own remote object.
    async fn put_part(&self, part_name: &str, chunk: &Chunk) -> Result<()>;

    /// Merges the parts, in order, into the final object. Composing zero
    /// parts must produce an empty object.
    async fn compose(&self, part_names: &[String], name: &str) -> Result<()>;

    /// Deletes one temporary part; an already-absent part is not an error.
    async fn delete_part(&self, part_name: &str) -> Result<()>;
}

/// Drives chunked transfers for one folder's tuning.
#[derive(Debug, Clone)]
pub struct ChunkedUploader {
    max_chunk_size: usize,
    retrier: Retrier,
}

impl ChunkedUploader {
    pub fn new(max_chunk_size: usize, policy: RetryPolicy) -> Self {
        Self {
            max_chunk_size,
            retrier: Retrier::new(policy),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Reads the next chunk, filling the buffer to the chunk size unless
    /// the stream ends first. `None` at end-of-stream; a read failure is a
    /// local-source error, surfaced without retry.
    async fn next_chunk<R>(&self, name: &str, index: usize, content: &mut R) -> Result<Option<Chunk>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buffer = vec![0u8; self.max_chunk_size];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = content
                .read(&mut buffer[filled..])
                .await
                .map_err(|source| Error::LocalSource {
                    name: name.to_string(),
                    chunk: index,
                    source,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buffer.truncate(filled);
        Ok(Some(Chunk {
            name: name.to_string(),
            index,
            data: Bytes::from(buffer),
        }))
    }

    /// Strategy A: appends chunks in order into one open remote writer.
    ///
    /// The writer is aborted on every failure path and closed exactly once
    /// on success; a close failure fails the whole put.
    pub async fn upload_sequential<R, W>(
        &self,
        name: &str,
        mut content: R,
        mut writer: W,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: ChunkWriter,
    {
        tracing::debug!(name, "sequential upload start");
        let mut index = 0;
        loop {
            let chunk = match self.next_chunk(name, index, &mut content).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    let _ = writer.abort().await;
                    return Err(err);
                }
            };

            let written = self
                .retrier
                .run(cancel, async || writer.write_chunk(&chunk).await)
                .await;
            if let Err(err) = written {
                let _ = writer.abort().await;
                return Err(err);
            }
            index += 1;
        }

        writer.close().await?;
        tracing::debug!(name, chunks = index, "sequential upload done");
        Ok(())
    }

    /// Strategy B: uploads each chunk as a temporary part, composes the
    /// parts into the final object, then deletes the parts.
    ///
    /// Part cleanup is retried per part and fails loudly if exhausted, but
    /// never rolls back the already-composed object. A failure before
    /// compose leaves uploaded parts behind for the caller to collect.
    pub async fn upload_composed<R, S>(
        &self,
        name: &str,
        mut content: R,
        store: &S,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        S: PartStore + ?Sized,
    {
        tracing::debug!(name, "composed upload start");
        let mut part_names: Vec<String> = Vec::new();
        while let Some(chunk) = self
            .next_chunk(name, part_names.len(), &mut content)
            .await?
        {
            let part = store.part_name(name, chunk.index);
            self.retrier
                .run(cancel, async || store.put_part(&part, &chunk).await)
                .await?;
            part_names.push(part);
        }

        self.retrier
            .run(cancel, async || store.compose(&part_names, name).await)
            .await?;

        for part in &part_names {
            let deleted = self
                .retrier
                .run(cancel, async || store.delete_part(part).await)
                .await;
            if let Err(err) = deleted {
                tracing::warn!(name, part = part.as_str(), "temporary part left behind");
                return Err(err);
            }
        }

        tracing::debug!(name, parts = part_names.len(), "composed upload done");
        Ok(())
    }
}
