//! depot-s3: S3 adapter for the depot folder contract
//!
//! Wraps a pre-authenticated `aws_sdk_s3::Client` and implements the
//! `Folder` trait from depot-core. Uploads use the compose-from-parts
//! strategy: bounded chunks become temporary objects, merged server-side
//! and cleaned up afterwards, each step driven through the retrier.

mod error;
mod folder;
mod uploader;

pub use folder::{
    BASE_RETRY_DELAY, CONTEXT_TIMEOUT, DEFAULT_MAX_PART_SIZE, MAX_PART_SIZE, MAX_RETRIES,
    MAX_RETRY_DELAY, NORMALIZE_PREFIX, S3Folder, SETTING_LIST, SSE, SSE_KMS_ID, STORAGE_CLASS,
};
pub use uploader::UploadOptions;
