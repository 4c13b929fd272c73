//! SFTP folder implementation
//!
//! Binds the depot folder contract to a pre-authenticated `ssh2::Sftp`
//! handle. libssh2 is blocking, so every call runs inside
//! `spawn_blocking`, with the handle shared behind an `Arc`. There is no
//! chunk protocol on this transport; puts create parent directories and
//! stream the body into one remote file, with every primitive call
//! bounded by the retry policy and the context deadline.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use ssh2::Sftp;
use tokio::io::AsyncReadExt;
use tokio::task::spawn_blocking;

use depot_core::{
    Error, Folder, FolderConfig, Listing, Object, ObjectStream, Result, Retrier, SettingKeys,
    Settings, deadline_token, object_stream, path,
};

use crate::error::{BACKEND, is_not_found, join_error, translate};

pub const CONTEXT_TIMEOUT: &str = "SSH_CONTEXT_TIMEOUT";
pub const NORMALIZE_PREFIX: &str = "SSH_NORMALIZE_PREFIX";
pub const MAX_RETRIES: &str = "SSH_MAX_RETRIES";
pub const BASE_RETRY_DELAY: &str = "SSH_BASE_RETRY_DELAY";
pub const MAX_RETRY_DELAY: &str = "SSH_MAX_RETRY_DELAY";

/// Settings recognized by SFTP folders.
pub const SETTING_LIST: &[&str] = &[
    CONTEXT_TIMEOUT,
    NORMALIZE_PREFIX,
    MAX_RETRIES,
    BASE_RETRY_DELAY,
    MAX_RETRY_DELAY,
];

/// Streaming buffer for puts; no chunk protocol, just a copy window.
const WRITE_BUFFER_SIZE: usize = 8 << 20;

const KEYS: SettingKeys = SettingKeys {
    context_timeout: CONTEXT_TIMEOUT,
    normalize_prefix: NORMALIZE_PREFIX,
    max_retries: MAX_RETRIES,
    base_retry_delay: BASE_RETRY_DELAY,
    max_retry_delay: MAX_RETRY_DELAY,
    max_chunk_size: None,
};

/// Folder in a remote file tree reached over SFTP.
pub struct SftpFolder {
    sftp: Arc<Sftp>,
    path: String,
    config: FolderConfig,
}

impl SftpFolder {
    /// Builds a folder at `path` over an established SFTP channel,
    /// consuming the settings map once. Fails fast on unparsable settings.
    pub fn new(sftp: Arc<Sftp>, path: impl Into<String>, settings: &Settings) -> Result<Self> {
        Ok(Self {
            sftp,
            path: path.into(),
            config: FolderConfig::from_settings(settings, &KEYS, WRITE_BUFFER_SIZE)?,
        })
    }

    fn child(&self, path: String) -> Self {
        Self {
            sftp: Arc::clone(&self.sftp),
            path,
            config: self.config.clone(),
        }
    }

    fn resolve(&self, relative: &str) -> String {
        path::resolve(&self.path, relative, self.config.normalize_prefix)
    }

    fn retrier(&self) -> Retrier {
        Retrier::new(self.config.retry.clone())
    }
}

#[async_trait]
impl Folder for SftpFolder {
    fn path(&self) -> &str {
        &self.path
    }

    async fn list_folder(&self) -> Result<Listing> {
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        let directory = self.path.clone();
        let entries = self
            .retrier()
            .run(&cancel, async || {
                let sftp = Arc::clone(&self.sftp);
                let directory = directory.clone();
                spawn_blocking(move || match sftp.readdir(Path::new(&directory)) {
                    Ok(entries) => Ok(entries),
                    // Directories are implicit; a missing one has no children.
                    Err(err) if is_not_found(&err) => Ok(Vec::new()),
                    Err(err) => Err(translate(
                        format!("unable to read folder '{directory}'"),
                        err,
                    )),
                })
                .await
                .map_err(join_error)?
            })
            .await?;

        let mut listing = Listing::empty();
        for (entry_path, stat) in entries {
            let Some(name) = entry_path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if stat.is_dir() {
                listing
                    .sub_folders
                    .push(Box::new(self.child(self.resolve(name))));
            } else {
                let last_modified = stat
                    .mtime
                    .and_then(|seconds| Timestamp::from_second(seconds as i64).ok());
                listing
                    .objects
                    .push(Object::new(name, last_modified, stat.size.unwrap_or(0)));
            }
        }
        Ok(listing)
    }

    async fn exists(&self, object_relative_path: &str) -> Result<bool> {
        let absolute = self.resolve(object_relative_path);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        self.retrier()
            .run(&cancel, async || {
                let sftp = Arc::clone(&self.sftp);
                let absolute = absolute.clone();
                spawn_blocking(move || match sftp.stat(Path::new(&absolute)) {
                    // A directory placeholder is not an object.
                    Ok(stat) => Ok(!stat.is_dir()),
                    Err(err) if is_not_found(&err) => Ok(false),
                    Err(err) => Err(translate(
                        format!("unable to check object existence '{absolute}'"),
                        err,
                    )),
                })
                .await
                .map_err(join_error)?
            })
            .await
    }

    async fn delete_objects(&self, object_relative_paths: &[String]) -> Result<()> {
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);
        let retrier = self.retrier();

        for relative in object_relative_paths {
            let absolute = self.resolve(relative);
            tracing::debug!(path = absolute.as_str(), "delete");

            retrier
                .run(&cancel, async || {
                    let sftp = Arc::clone(&self.sftp);
                    let absolute = absolute.clone();
                    spawn_blocking(move || {
                        match sftp.stat(Path::new(&absolute)) {
                            // Already gone; retried deletes stay successful.
                            Err(err) if is_not_found(&err) => return Ok(()),
                            // Never attempt to remove a directory tree.
                            Ok(stat) if stat.is_dir() => return Ok(()),
                            Ok(_) => {}
                            Err(err) => {
                                return Err(translate(
                                    format!("unable to stat '{absolute}'"),
                                    err,
                                ));
                            }
                        }
                        match sftp.unlink(Path::new(&absolute)) {
                            Ok(()) => Ok(()),
                            Err(err) if is_not_found(&err) => Ok(()),
                            Err(err) => {
                                Err(translate(format!("unable to delete '{absolute}'"), err))
                            }
                        }
                    })
                    .await
                    .map_err(join_error)?
                })
                .await?;
        }
        Ok(())
    }

    fn sub_folder(&self, sub_folder_relative_path: &str) -> Box<dyn Folder> {
        Box::new(self.child(self.resolve(sub_folder_relative_path)))
    }

    async fn read_object(&self, object_relative_path: &str) -> Result<ObjectStream> {
        let absolute = self.resolve(object_relative_path);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        let body = self
            .retrier()
            .run(&cancel, async || {
                let sftp = Arc::clone(&self.sftp);
                let absolute = absolute.clone();
                spawn_blocking(move || {
                    let mut file = match sftp.open(Path::new(&absolute)) {
                        Ok(file) => file,
                        Err(err) if is_not_found(&err) => {
                            return Err(Error::not_found(absolute));
                        }
                        Err(err) => {
                            return Err(translate(format!("unable to open '{absolute}'"), err));
                        }
                    };
                    let mut body = Vec::new();
                    std::io::Read::read_to_end(&mut file, &mut body).map_err(|err| {
                        Error::transient(BACKEND, format!("unable to read '{absolute}': {err}"))
                    })?;
                    Ok(body)
                })
                .await
                .map_err(join_error)?
            })
            .await?;

        Ok(object_stream(std::io::Cursor::new(body)))
    }

    async fn put_object(&self, name: &str, mut content: ObjectStream) -> Result<()> {
        tracing::debug!(name, folder = self.path.as_str(), "put");
        let absolute = self.resolve(name);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        if let Some(parent) = parent_of(&absolute) {
            let parent = parent.to_string();
            self.retrier()
                .run(&cancel, async || {
                    let sftp = Arc::clone(&self.sftp);
                    let parent = parent.clone();
                    spawn_blocking(move || ensure_directories(&sftp, &parent))
                        .await
                        .map_err(join_error)?
                })
                .await?;
        }

        // One blocking create-write-close on the far side of a bounded
        // channel; the stream is consumed once, so the copy itself is not
        // re-attempted. A fresh put truncates any partial leftovers.
        let (tx, rx) = tokio::sync::mpsc::channel::<Vec<u8>>(2);
        let sftp = Arc::clone(&self.sftp);
        let target = absolute.clone();
        let writer = spawn_blocking(move || write_file(&sftp, &target, rx));

        let mut chunk_index = 0usize;
        let mut local_failure: Option<Error> = None;
        loop {
            let mut buffer = vec![0u8; self.config.max_chunk_size];
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    local_failure = Some(Error::Cancelled);
                    break;
                }
                read = content.read(&mut buffer) => read,
            };
            let filled = match read {
                Ok(filled) => filled,
                Err(source) => {
                    local_failure = Some(Error::LocalSource {
                        name: name.to_string(),
                        chunk: chunk_index,
                        source,
                    });
                    break;
                }
            };
            if filled == 0 {
                break;
            }
            buffer.truncate(filled);
            if tx.send(buffer).await.is_err() {
                // The writer bailed out; its error is surfaced below.
                break;
            }
            chunk_index += 1;
        }
        drop(tx);

        let written = writer.await.map_err(join_error)?;
        if let Some(err) = local_failure {
            return Err(err);
        }
        written
    }
}

fn parent_of(absolute: &str) -> Option<&str> {
    let (parent, _) = absolute.rsplit_once('/')?;
    (!parent.is_empty()).then_some(parent)
}

/// Creates every missing component of `directory`, tolerating races with
/// concurrent writers creating the same tree.
fn ensure_directories(sftp: &Sftp, directory: &str) -> Result<()> {
    let mut current = if directory.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };
    for segment in directory.split('/').filter(|segment| !segment.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);

        if sftp.stat(Path::new(&current)).is_ok() {
            continue;
        }
        if let Err(err) = sftp.mkdir(Path::new(&current), 0o755) {
            if sftp.stat(Path::new(&current)).is_err() {
                return Err(translate(
                    format!("unable to create directory '{current}'"),
                    err,
                ));
            }
        }
    }
    Ok(())
}

fn write_file(
    sftp: &Sftp,
    target: &str,
    mut rx: tokio::sync::mpsc::Receiver<Vec<u8>>,
) -> Result<()> {
    use std::io::Write;

    let mut file = sftp
        .create(Path::new(target))
        .map_err(|err| translate(format!("unable to create file '{target}'"), err))?;
    while let Some(buffer) = rx.blocking_recv() {
        file.write_all(&buffer).map_err(|err| {
            Error::transient(BACKEND, format!("unable to write to '{target}': {err}"))
        })?;
    }
    // The handle closes on drop; flush first so a short write surfaces here.
    file.flush()
        .map_err(|err| Error::transient(BACKEND, format!("unable to flush '{target}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_of_strips_last_component() {
        assert_eq!(parent_of("/backups/db/base_0001"), Some("/backups/db"));
        assert_eq!(parent_of("backups/base_0001"), Some("backups"));
        assert_eq!(parent_of("base_0001"), None);
        assert_eq!(parent_of("/base_0001"), None);
    }
}
