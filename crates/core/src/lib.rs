//! depot-core: Core library for the depot remote-folder abstraction
//!
//! This crate provides the backend-independent pieces of depot:
//! - The folder contract (trait, object and listing types)
//! - The retry driver with capped, jittered exponential backoff
//! - The chunked uploader and its writer/part-store seams
//! - Path joining, prefix parsing, and the settings map
//!
//! Backend adapters (S3, GCS, SFTP) live in sibling crates and bind the
//! folder contract to their vendor clients; this crate never touches a
//! network SDK, allowing the transfer protocol to be tested in isolation.

pub mod backoff;
pub mod error;
pub mod folder;
pub mod path;
pub mod retry;
pub mod settings;
pub mod uploader;

pub use error::{Error, Result};
pub use folder::{Folder, Listing, Object, ObjectStream, object_stream};
pub use retry::{DeadlineGuard, Retrier, RetryPolicy, deadline_token, with_deadline};
pub use settings::{FolderConfig, SettingKeys, Settings};
pub use uploader::{Chunk, ChunkWriter, ChunkedUploader, PartStore};
