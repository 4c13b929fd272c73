//! The folder contract every backend adapter implements
//!
//! A folder is a value: navigating to a sub-folder shares connection
//! state and extends the path, with no I/O. All operations resolve object
//! names relative to the folder path and present the same observable
//! semantics regardless of backend (not-found mapping, idempotent delete,
//! relative listing names).

use std::pin::Pin;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Readable object body, positioned at the start of the object.
pub type ObjectStream = Pin<Box<dyn AsyncRead + Send>>;

/// Wraps any reader as an [`ObjectStream`].
pub fn object_stream<R>(reader: R) -> ObjectStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(reader)
}

/// A stored object as observed by a listing. Owned by the remote backend;
/// a fresh listing reflects current remote state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Object {
    /// Name relative to the listed folder.
    pub name: String,
    pub last_modified: Option<Timestamp>,
    pub size_bytes: u64,
}

impl Object {
    pub fn new(name: impl Into<String>, last_modified: Option<Timestamp>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            last_modified,
            size_bytes,
        }
    }
}

/// Immediate children of a folder, one level deep.
pub struct Listing {
    pub objects: Vec<Object>,
    pub sub_folders: Vec<Box<dyn Folder>>,
}

impl Listing {
    pub fn empty() -> Self {
        Self {
            objects: Vec::new(),
            sub_folders: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.sub_folders.is_empty()
    }
}

/// Uniform capability set over heterogeneous storage backends.
///
/// Implementations share connection state across sub-folders and are safe
/// for concurrent use; operations on different objects carry no ordering
/// guarantee between them.
#[async_trait]
pub trait Folder: Send + Sync {
    /// Logical path of this folder. Pure, no I/O.
    fn path(&self) -> &str;

    /// Lists immediate children only. An empty or nonexistent remote
    /// directory yields an empty listing, never an error; entries echoing
    /// the folder itself are filtered out.
    async fn list_folder(&self) -> Result<Listing>;

    /// Whether an object (not a directory placeholder) exists at the
    /// resolved path. A genuine not-found maps to `false`.
    async fn exists(&self, object_relative_path: &str) -> Result<bool>;

    /// Deletes each named object. Deleting an already-absent object is
    /// not an error; a path that is actually a directory is skipped.
    async fn delete_objects(&self, object_relative_paths: &[String]) -> Result<()>;

    /// Child folder at the joined path. Pure, no I/O, always succeeds.
    fn sub_folder(&self, sub_folder_relative_path: &str) -> Box<dyn Folder>;

    /// Opens the object for reading. A missing object is
    /// [`Error::NotFound`](crate::Error::NotFound), distinguished from
    /// other failures so callers can branch on it.
    async fn read_object(&self, object_relative_path: &str) -> Result<ObjectStream>;

    /// Stores the full content stream under `name`, replacing any
    /// existing object.
    async fn put_object(&self, name: &str, content: ObjectStream) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_serializes_for_orchestration_layers() {
        let object = Object::new("base_0001/tar.lz4", None, 4096);
        let json = serde_json::to_value(&object).unwrap();

        assert_eq!(json["name"], "base_0001/tar.lz4");
        assert_eq!(json["size_bytes"], 4096);
        assert!(json["last_modified"].is_null());
    }
}
