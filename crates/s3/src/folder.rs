//! S3 folder implementation
//!
//! Binds the depot folder contract to a pre-authenticated
//! `aws_sdk_s3::Client`. Credential and session bootstrapping belong to
//! the caller; this folder only translates contract operations into SDK
//! calls with uniform semantics.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use jiff::Timestamp;

use depot_core::{
    ChunkedUploader, Error, Folder, FolderConfig, Listing, Object, ObjectStream, Result, Retrier,
    SettingKeys, Settings, deadline_token, object_stream, path,
};

use crate::error::{BACKEND, transfer_error};
use crate::uploader::{S3PartStore, UploadOptions};

pub const CONTEXT_TIMEOUT: &str = "S3_CONTEXT_TIMEOUT";
pub const NORMALIZE_PREFIX: &str = "S3_NORMALIZE_PREFIX";
pub const MAX_RETRIES: &str = "S3_MAX_RETRIES";
pub const BASE_RETRY_DELAY: &str = "S3_BASE_RETRY_DELAY";
pub const MAX_RETRY_DELAY: &str = "S3_MAX_RETRY_DELAY";
pub const MAX_PART_SIZE: &str = "S3_MAX_PART_SIZE";
pub const STORAGE_CLASS: &str = "S3_STORAGE_CLASS";
pub const SSE: &str = "S3_SSE";
pub const SSE_KMS_ID: &str = "S3_SSE_KMS_ID";

/// Settings recognized by S3 folders.
pub const SETTING_LIST: &[&str] = &[
    CONTEXT_TIMEOUT,
    NORMALIZE_PREFIX,
    MAX_RETRIES,
    BASE_RETRY_DELAY,
    MAX_RETRY_DELAY,
    MAX_PART_SIZE,
    STORAGE_CLASS,
    SSE,
    SSE_KMS_ID,
];

pub const DEFAULT_MAX_PART_SIZE: usize = 20 << 20;

/// S3 batches at most this many keys per delete call.
const DELETE_BATCH: usize = 1000;

const KEYS: SettingKeys = SettingKeys {
    context_timeout: CONTEXT_TIMEOUT,
    normalize_prefix: NORMALIZE_PREFIX,
    max_retries: MAX_RETRIES,
    base_retry_delay: BASE_RETRY_DELAY,
    max_retry_delay: MAX_RETRY_DELAY,
    max_chunk_size: Some(MAX_PART_SIZE),
};

/// Folder in an S3 bucket.
pub struct S3Folder {
    client: Client,
    bucket: String,
    path: String,
    config: FolderConfig,
    upload: UploadOptions,
}

impl S3Folder {
    /// Builds a folder at `path` inside `bucket`, consuming the settings
    /// map once. Fails fast on unparsable settings.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        path: impl Into<String>,
        settings: &Settings,
    ) -> Result<Self> {
        Ok(Self {
            client,
            bucket: bucket.into(),
            path: path.into(),
            config: FolderConfig::from_settings(settings, &KEYS, DEFAULT_MAX_PART_SIZE)?,
            upload: UploadOptions::from_settings(settings)?,
        })
    }

    /// Builds a folder from an `s3://bucket/path` prefix.
    pub fn from_prefix(client: Client, prefix: &str, settings: &Settings) -> Result<Self> {
        let normalize = settings.bool_or(NORMALIZE_PREFIX, true)?;
        let (bucket, folder_path) = path::parse_prefix(prefix, normalize)?;
        Self::new(client, bucket, path::add_delimiter(&folder_path), settings)
    }

    fn child(&self, path: String) -> Self {
        Self {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            path,
            config: self.config.clone(),
            upload: self.upload.clone(),
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
impl Folder for S3Folder {
    fn path(&self) -> &str {
        &self.path
    }

    async fn list_folder(&self) -> Result<Listing> {
        let prefix = path::add_delimiter(&self.path);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);
        let retrier = self.retrier();

        let mut listing = Listing::empty();
        let mut token: Option<String> = None;
        loop {
            let page = retrier
                .run(&cancel, async || {
                    self.client
                        .list_objects_v2()
                        .bucket(&self.bucket)
                        .prefix(&prefix)
                        .delimiter("/")
                        .set_continuation_token(token.clone())
                        .send()
                        .await
                        .map_err(|err| {
                            transfer_error(format!("unable to list '{}'", self.path), &err)
                        })
                })
                .await?;

            for common in page.common_prefixes() {
                let Some(sub_prefix) = common.prefix() else {
                    continue;
                };
                listing
                    .sub_folders
                    .push(Box::new(self.child(sub_prefix.to_string())));
            }

            for entry in page.contents() {
                let key = entry.key().unwrap_or_default();
                let name = key.strip_prefix(prefix.as_str()).unwrap_or(key);
                if name.is_empty() {
                    // Some S3 implementations echo the queried prefix back.
                    continue;
                }
                let last_modified = entry
                    .last_modified()
                    .and_then(|modified| Timestamp::from_second(modified.secs()).ok());
                let size_bytes = entry.size().unwrap_or(0).max(0) as u64;
                listing
                    .objects
                    .push(Object::new(name, last_modified, size_bytes));
            }

            token = page.next_continuation_token().map(str::to_string);
            if !page.is_truncated().unwrap_or(false) || token.is_none() {
                break;
            }
        }
        Ok(listing)
    }

    async fn exists(&self, object_relative_path: &str) -> Result<bool> {
        let key = self.resolve(object_relative_path);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        self.retrier()
            .run(&cancel, async || {
                match self
                    .client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .send()
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(err)
                        if err
                            .as_service_error()
                            .is_some_and(|service| service.is_not_found()) =>
                    {
                        Ok(false)
                    }
                    Err(err) => Err(transfer_error(format!("unable to stat '{key}'"), &err)),
                }
            })
            .await
    }

    async fn delete_objects(&self, object_relative_paths: &[String]) -> Result<()> {
        // There are no real directories to guard against here: deleting a
        // "directory" key that holds no object is a successful no-op.
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);
        let retrier = self.retrier();

        for block in object_relative_paths.chunks(DELETE_BATCH) {
            let identifiers = block
                .iter()
                .map(|relative| {
                    let key = self.resolve(relative);
                    tracing::debug!(key = key.as_str(), "delete");
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|err| Error::permanent(BACKEND, err.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|err| Error::permanent(BACKEND, err.to_string()))?;

            retrier
                .run(&cancel, async || {
                    let response = self
                        .client
                        .delete_objects()
                        .bucket(&self.bucket)
                        .delete(delete.clone())
                        .send()
                        .await
                        .map_err(|err| {
                            transfer_error(
                                format!("unable to delete objects under '{}'", self.path),
                                &err,
                            )
                        })?;

                    for failure in response.errors() {
                        // Idempotent delete: already-gone keys are fine.
                        if matches!(failure.code(), Some("NoSuchKey") | Some("NotFound")) {
                            continue;
                        }
                        return Err(Error::transient(
                            BACKEND,
                            format!(
                                "unable to delete '{}': {}",
                                failure.key().unwrap_or("<unknown>"),
                                failure.message().unwrap_or("<no message>")
                            ),
                        ));
                    }
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }

    fn sub_folder(&self, sub_folder_relative_path: &str) -> Box<dyn Folder> {
        Box::new(self.child(self.resolve(sub_folder_relative_path)))
    }

    async fn read_object(&self, object_relative_path: &str) -> Result<ObjectStream> {
        let key = self.resolve(object_relative_path);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        let response = self
            .retrier()
            .run(&cancel, async || {
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|err| {
                        if err
                            .as_service_error()
                            .is_some_and(|service| service.is_no_such_key())
                        {
                            Error::not_found(key.clone())
                        } else {
                            transfer_error(format!("unable to open '{key}'"), &err)
                        }
                    })
            })
            .await?;

        Ok(object_stream(response.body.into_async_read()))
    }

    async fn put_object(&self, name: &str, content: ObjectStream) -> Result<()> {
        tracing::debug!(name, folder = self.path.as_str(), "put");
        let key = self.resolve(name);
        let (cancel, _deadline) = deadline_token(self.config.context_timeout);

        let uploader = ChunkedUploader::new(self.config.max_chunk_size, self.config.retry.clone());
        let store = S3PartStore {
            client: &self.client,
            bucket: &self.bucket,
            options: &self.upload,
        };
        uploader.upload_composed(&key, content, &store, &cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::BehaviorVersion;

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn test_from_prefix_splits_bucket_and_path() {
        let folder = S3Folder::from_prefix(
            offline_client(),
            "s3://test-bucket/backups/db",
            &Settings::new(),
        )
        .unwrap();

        assert_eq!(folder.bucket, "test-bucket");
        assert_eq!(folder.path(), "backups/db/");
    }

    #[test]
    fn test_resolve_honors_normalization_flag() {
        let normalized = S3Folder::new(
            offline_client(),
            "bucket",
            "backups//db/",
            &Settings::new(),
        )
        .unwrap();
        assert_eq!(normalized.resolve("/latest"), "backups/db/latest");

        let verbatim = S3Folder::new(
            offline_client(),
            "bucket",
            "backups//db",
            &Settings::from_iter([(NORMALIZE_PREFIX, "false")]),
        )
        .unwrap();
        assert_eq!(verbatim.resolve("/latest"), "backups//db/latest");
    }

    #[test]
    fn test_sub_folder_extends_path_without_io() {
        let folder =
            S3Folder::new(offline_client(), "bucket", "base", &Settings::new()).unwrap();
        let sub = folder.sub_folder("wal_005");
        assert_eq!(sub.path(), "base/wal_005");
    }

    #[test]
    fn test_bad_setting_fails_at_construction() {
        let settings = Settings::from_iter([(MAX_RETRIES, "several")]);
        let err =
            S3Folder::new(offline_client(), "bucket", "base", &settings).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
