//! GCS folder implementation
//!
//! Binds the depot folder contract to a pre-authenticated
//! `object_store` handle scoped to one bucket. Credential discovery and
//! client construction belong to the caller. Uploads are chunked through
//! a single sequential writer; the remaining operations are single calls
//! bounded by the folder's context deadline, as the GCS transport carries
//! no hidden retry loops worth doubling up on.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use jiff::Timestamp;
use object_store::ObjectStore;
use object_store::path::Path as StorePath;
use tokio_util::io::StreamReader;

use depot_core::{
    ChunkedUploader, Folder, FolderConfig, Listing, Object, ObjectStream, Result, SettingKeys,
    Settings, deadline_token, object_stream, path, with_deadline,
};

use crate::error::translate;
use crate::writer::GcsChunkWriter;

pub const CONTEXT_TIMEOUT: &str = "GCS_CONTEXT_TIMEOUT";
pub const NORMALIZE_PREFIX: &str = "GCS_NORMALIZE_PREFIX";
pub const MAX_RETRIES: &str = "GCS_MAX_RETRIES";
pub const BASE_RETRY_DELAY: &str = "GCS_BASE_RETRY_DELAY";
pub const MAX_RETRY_DELAY: &str = "GCS_MAX_RETRY_DELAY";
pub const MAX_CHUNK_SIZE: &str = "GCS_MAX_CHUNK_SIZE";

/// Settings recognized by GCS folders.
pub const SETTING_LIST: &[&str] = &[
    CONTEXT_TIMEOUT,
    NORMALIZE_PREFIX,
    MAX_RETRIES,
    BASE_RETRY_DELAY,
    MAX_RETRY_DELAY,
    MAX_CHUNK_SIZE,
];

/// 50 MiB chunks keep large objects within backend chunk-count limits.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 50 << 20;

const KEYS: SettingKeys = SettingKeys {
    context_timeout: CONTEXT_TIMEOUT,
    normalize_prefix: NORMALIZE_PREFIX,
    max_retries: MAX_RETRIES,
    base_retry_delay: BASE_RETRY_DELAY,
    max_retry_delay: MAX_RETRY_DELAY,
    max_chunk_size: Some(MAX_CHUNK_SIZE),
};

/// Folder in a GCS bucket.
pub struct GcsFolder {
    store: Arc<dyn ObjectStore>,
    path: String,
    config: FolderConfig,
}

impl GcsFolder {
    /// Builds a folder at `path` over a bucket-scoped store handle,
    /// consuming the settings map once. Fails fast on unparsable settings.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        path: impl Into<String>,
        settings: &Settings,
    ) -> Result<Self> {
        Ok(Self {
            store,
            path: path.into(),
            config: FolderConfig::from_settings(settings, &KEYS, DEFAULT_MAX_CHUNK_SIZE)?,
        })
    }

    fn child(&self, path: String) -> Self {
        Self {
            store: Arc::clone(&self.store),
            path,
            config: self.config.clone(),
        }
    }

    fn resolve(&self, relative: &str) -> String {
        path::resolve(&self.path, relative, self.config.normalize_prefix)
    }
}

#[async_trait]
impl Folder for GcsFolder {
    fn path(&self) -> &str {
        &self.path
    }

    async fn list_folder(&self) -> Result<Listing> {
        let base = StorePath::from(self.path.as_str());
        let prefix = (!self.path.is_empty()).then_some(&base);

        let result = with_deadline(self.config.context_timeout, async {
            self.store
                .list_with_delimiter(prefix)
                .await
                .map_err(|err| translate(format!("unable to list '{}'", self.path), err))
        })
        .await?;

        let mut listing = Listing::empty();
        for sub_prefix in result.common_prefixes {
            // The store occasionally echoes the queried prefix as a folder.
            if sub_prefix == base {
                continue;
            }
            listing
                .sub_folders
                .push(Box::new(self.child(sub_prefix.as_ref().to_string())));
        }

        let base_prefix = path::add_delimiter(base.as_ref());
        for meta in result.objects {
            let full = meta.location.as_ref();
            let name = full.strip_prefix(base_prefix.as_str()).unwrap_or(full);
            if name.is_empty() {
                continue;
            }
            let last_modified = Timestamp::from_second(meta.last_modified.timestamp()).ok();
            listing
                .objects
                .push(Object::new(name, last_modified, meta.size as u64));
        }
        Ok(listing)
    }

    async fn exists(&self, object_relative_path: &str) -> Result<bool> {
        let location = StorePath::from(self.resolve(object_relative_path));

        let stat = with_deadline(self.config.context_timeout, async {
            self.store
                .head(&location)
                .await
                .map_err(|err| translate(format!("unable to stat '{location}'"), err))
        })
        .await;

        match stat {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn delete_objects(&self, object_relative_paths: &[String]) -> Result<()> {
        for relative in object_relative_paths {
            let location = StorePath::from(self.resolve(relative));
            tracing::debug!(location = %location, "delete");

            let deleted = with_deadline(self.config.context_timeout, async {
                self.store
                    .delete(&location)
                    .await
                    .map_err(|err| translate(format!("unable to delete '{location}'"), err))
            })
            .await;

            match deleted {
                Ok(()) => {}
                // Already gone (or a directory name that holds no object).
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn sub_folder(&self, sub_folder_relative_path: &str) -> Box<dyn Folder> {
        Box::new(self.child(self.resolve(sub_folder_relative_path)))
    }

    async fn read_object(&self, object_relative_path: &str) -> Result<ObjectStream> {
        let location = StorePath::from(self.resolve(object_relative_path));

        let result = with_deadline(self.config.context_timeout, async {
            self.store
                .get(&location)
                .await
                .map_err(|err| translate(format!("unable to open '{location}'"), err))
        })
        .await?;

        let stream = result.into_stream().map_err(std::io::Error::other);
        Ok(object_stream(StreamReader::new(stream)))
    }

    async fn put_object(&self, name: &str, content: ObjectStream) -> Result<()> {
        tracing::debug!(name, folder = self.path.as_str(), "put");
        let location = StorePath::from(self.resolve(name));
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        let writer = GcsChunkWriter::new(
            location.to_string(),
            object_store::buffered::BufWriter::new(Arc::clone(&self.store), location),
        );
        let uploader = ChunkedUploader::new(self.config.max_chunk_size, self.config.retry.clone());
        uploader
            .upload_sequential(name, content, writer, &cancel)
            .await
    }
}
