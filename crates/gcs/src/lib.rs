//! depot-gcs: Google Cloud Storage adapter for the depot folder contract
//!
//! Wraps a pre-authenticated, bucket-scoped `object_store` handle and
//! implements the `Folder` trait from depot-core. Uploads use the
//! sequential-write strategy: one buffered writer per object, chunks
//! appended in order, each chunk driven through the retrier.

mod error;
mod folder;
mod writer;

pub use folder::{
    BASE_RETRY_DELAY, CONTEXT_TIMEOUT, DEFAULT_MAX_CHUNK_SIZE, GcsFolder, MAX_CHUNK_SIZE,
    MAX_RETRIES, MAX_RETRY_DELAY, NORMALIZE_PREFIX, SETTING_LIST,
};
