//! Sequential-write upload binding for GCS
//!
//! One buffered multipart writer per put call is the single stateful
//! ordered writer: chunks are appended in order, a retried chunk resends
//! its bytes into the same writer, and shutdown finalizes the object.
//! The writer is never reopened mid-object.

use async_trait::async_trait;
use object_store::buffered::BufWriter;
use tokio::io::AsyncWriteExt;

use depot_core::Result;
use depot_core::uploader::{Chunk, ChunkWriter};

use crate::error::BACKEND;

pub(crate) struct GcsChunkWriter {
    name: String,
    writer: BufWriter,
}

impl GcsChunkWriter {
    pub(crate) fn new(name: String, writer: BufWriter) -> Self {
        Self { name, writer }
    }
}

#[async_trait]
impl ChunkWriter for GcsChunkWriter {
    async fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        tracing::debug!(name = self.name.as_str(), index = chunk.index, "upload chunk");
        self.writer.write_all(&chunk.data).await.map_err(|err| {
            depot_core::Error::transient(
                BACKEND,
                format!(
                    "unable to write chunk {} of '{}': {err}",
                    chunk.index, self.name
                ),
            )
        })
    }

    async fn abort(&mut self) -> Result<()> {
        self.writer.abort().await.map_err(|err| {
            depot_core::Error::transient(
                BACKEND,
                format!("unable to abort writer for '{}': {err}", self.name),
            )
        })
    }

    async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(|err| {
            depot_core::Error::transient(
                BACKEND,
                format!("unable to close '{}': {err}", self.name),
            )
        })
    }
}
