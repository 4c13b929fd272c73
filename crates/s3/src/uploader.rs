//! Compose-from-parts upload binding for S3
//!
//! Chunks become temporary sibling objects uploaded with single put
//! calls, so a retried chunk is a fresh write with no partial-write
//! carryover. The compose step is a multipart upload whose parts are
//! server-side copies of the temporaries; the temporaries are deleted
//! afterwards. Part uploads honor the folder's encryption and storage
//! class settings.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::operation::create_multipart_upload::builders::CreateMultipartUploadFluentBuilder;
use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, ServerSideEncryption, StorageClass,
};
use aws_smithy_types::error::display::DisplayErrorContext;

use depot_core::uploader::{Chunk, PartStore};
use depot_core::{Error, Result, Settings};

use crate::error::{BACKEND, transfer_error};
use crate::folder::{SSE, SSE_KMS_ID, STORAGE_CLASS};

/// Per-folder upload options applied to every part and compose call.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub server_side_encryption: Option<String>,
    pub sse_kms_key_id: Option<String>,
    pub storage_class: Option<String>,
}

impl UploadOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let server_side_encryption = settings.get(SSE).map(str::to_string);
        let sse_kms_key_id = settings.get(SSE_KMS_ID).map(str::to_string);

        // Only aws:kms implies a key id; checked before any network activity.
        let wants_kms = server_side_encryption.as_deref() == Some("aws:kms");
        if wants_kms == sse_kms_key_id.is_none() {
            return Err(Error::config(
                SSE_KMS_ID,
                format!("must be set if and only if {SSE} is aws:kms"),
            ));
        }

        Ok(Self {
            server_side_encryption,
            sse_kms_key_id,
            storage_class: settings.get(STORAGE_CLASS).map(str::to_string),
        })
    }

    fn apply_put(&self, mut request: PutObjectFluentBuilder) -> PutObjectFluentBuilder {
        if let Some(sse) = &self.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse.as_str()));
            if let Some(key_id) = &self.sse_kms_key_id {
                request = request.ssekms_key_id(key_id);
            }
        }
        if let Some(class) = &self.storage_class {
            request = request.storage_class(StorageClass::from(class.as_str()));
        }
        request
    }

    fn apply_create(
        &self,
        mut request: CreateMultipartUploadFluentBuilder,
    ) -> CreateMultipartUploadFluentBuilder {
        if let Some(sse) = &self.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse.as_str()));
            if let Some(key_id) = &self.sse_kms_key_id {
                request = request.ssekms_key_id(key_id);
            }
        }
        if let Some(class) = &self.storage_class {
            request = request.storage_class(StorageClass::from(class.as_str()));
        }
        request
    }
}

/// Part store over one bucket; all names are bucket-absolute keys.
pub(crate) struct S3PartStore<'a> {
    pub client: &'a Client,
    pub bucket: &'a str,
    pub options: &'a UploadOptions,
}

#[async_trait]
impl PartStore for S3PartStore<'_> {
    async fn put_part(&self, part_name: &str, chunk: &Chunk) -> Result<()> {
        tracing::debug!(part = part_name, index = chunk.index, "upload part");
        let request = self
            .client
            .put_object()
            .bucket(self.bucket)
            .key(part_name)
            .body(ByteStream::from(chunk.data.clone()));
        self.options
            .apply_put(request)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| transfer_error(format!("unable to upload part '{part_name}'"), &err))
    }

    async fn compose(&self, part_names: &[String], name: &str) -> Result<()> {
        if part_names.is_empty() {
            // A zero-chunk stream still materializes an empty object.
            let request = self
                .client
                .put_object()
                .bucket(self.bucket)
                .key(name)
                .body(ByteStream::from_static(b""));
            return self
                .options
                .apply_put(request)
                .send()
                .await
                .map(|_| ())
                .map_err(|err| transfer_error(format!("unable to put empty '{name}'"), &err));
        }

        let request = self
            .client
            .create_multipart_upload()
            .bucket(self.bucket)
            .key(name);
        let created = self
            .options
            .apply_create(request)
            .send()
            .await
            .map_err(|err| transfer_error(format!("unable to start compose of '{name}'"), &err))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::permanent(BACKEND, format!("no upload id for '{name}'")))?
            .to_string();

        match self.copy_parts(part_names, name, &upload_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let aborted = self
                    .client
                    .abort_multipart_upload()
                    .bucket(self.bucket)
                    .key(name)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort_err) = aborted {
                    tracing::warn!(
                        name,
                        error = %DisplayErrorContext(&abort_err),
                        "unable to abort compose"
                    );
                }
                Err(err)
            }
        }
    }

    async fn delete_part(&self, part_name: &str) -> Result<()> {
        // Deleting an absent key succeeds on S3, so this stays idempotent.
        self.client
            .delete_object()
            .bucket(self.bucket)
            .key(part_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| transfer_error(format!("unable to delete part '{part_name}'"), &err))
    }
}

impl S3PartStore<'_> {
    async fn copy_parts(&self, part_names: &[String], name: &str, upload_id: &str) -> Result<()> {
        let mut completed = Vec::with_capacity(part_names.len());
        for (index, part) in part_names.iter().enumerate() {
            let part_number = index as i32 + 1;
            // Bucket and separator stay literal; only the key is encoded.
            let source = format!("{}/{}", self.bucket, urlencoding::encode(part));
            let copied = self
                .client
                .upload_part_copy()
                .bucket(self.bucket)
                .key(name)
                .upload_id(upload_id)
                .part_number(part_number)
                .copy_source(source)
                .send()
                .await
                .map_err(|err| {
                    transfer_error(format!("unable to copy part '{part}' into '{name}'"), &err)
                })?;
            let e_tag = copied
                .copy_part_result()
                .and_then(|result| result.e_tag())
                .map(str::to_string);
            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(e_tag)
                    .build(),
            );
        }

        self.client
            .complete_multipart_upload()
            .bucket(self.bucket)
            .key(name)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|err| transfer_error(format!("unable to complete compose of '{name}'"), &err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kms_encryption_requires_key_id() {
        let settings = Settings::from_iter([(SSE, "aws:kms")]);
        let err = UploadOptions::from_settings(&settings).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_key_id_requires_kms_encryption() {
        let settings = Settings::from_iter([(SSE_KMS_ID, "alias/backup")]);
        assert!(UploadOptions::from_settings(&settings).is_err());
    }

    #[test]
    fn test_kms_pair_accepted() {
        let settings = Settings::from_iter([(SSE, "aws:kms"), (SSE_KMS_ID, "alias/backup")]);
        let options = UploadOptions::from_settings(&settings).unwrap();
        assert_eq!(options.server_side_encryption.as_deref(), Some("aws:kms"));
        assert_eq!(options.sse_kms_key_id.as_deref(), Some("alias/backup"));
    }

    #[test]
    fn test_plain_sse_without_kms() {
        let settings =
            Settings::from_iter([(SSE, "AES256"), (STORAGE_CLASS, "STANDARD_IA")]);
        let options = UploadOptions::from_settings(&settings).unwrap();
        assert_eq!(options.server_side_encryption.as_deref(), Some("AES256"));
        assert_eq!(options.storage_class.as_deref(), Some("STANDARD_IA"));
        assert!(options.sse_kms_key_id.is_none());
    }

    #[test]
    fn test_defaults_are_empty() {
        let options = UploadOptions::from_settings(&Settings::new()).unwrap();
        assert!(options.server_side_encryption.is_none());
        assert!(options.storage_class.is_none());
    }
}
