//! depot-sftp: SFTP adapter for the depot folder contract
//!
//! Wraps a pre-authenticated `ssh2::Sftp` channel and implements the
//! `Folder` trait from depot-core. libssh2 is blocking, so every call is
//! bridged through `spawn_blocking`; each primitive call is bounded by
//! the folder's retry policy and context deadline.

mod error;
mod folder;

pub use folder::{
    BASE_RETRY_DELAY, CONTEXT_TIMEOUT, MAX_RETRIES, MAX_RETRY_DELAY, NORMALIZE_PREFIX,
    SETTING_LIST, SftpFolder,
};
