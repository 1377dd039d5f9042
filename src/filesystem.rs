//! Generic filesystem contract and the attribute records it produces.
//!
//! Paths passed to a `FilesystemAdapter` are relative to whatever root the
//! adapter was configured with.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::netdisk_service::netdisk_models::RenamePolicy;

/// Readable handle returned by `read_stream`.
pub type ReadStream = tokio::fs::File;

/// Lazy, finite, single-pass listing. Re-invoke `list_contents` to restart.
pub type ListStream<'a> = BoxStream<'a, Result<StorageAttributes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Options accepted by write-like operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Remote conflict policy for uploads.
    pub rtype: RenamePolicy,
}

impl WriteOptions {
    pub fn with_rtype(rtype: RenamePolicy) -> Self {
        Self { rtype }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub path: String,
    pub file_size: Option<u64>,
    /// Unix timestamp in seconds.
    pub last_modified: Option<i64>,
}

impl FileAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_size: None,
            last_modified: None,
        }
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = Some(file_size);
        self
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAttributes {
    pub path: String,
    pub last_modified: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageAttributes {
    File(FileAttributes),
    Directory(DirectoryAttributes),
}

impl StorageAttributes {
    pub fn path(&self) -> &str {
        match self {
            StorageAttributes::File(file) => &file.path,
            StorageAttributes::Directory(dir) => &dir.path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StorageAttributes::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, StorageAttributes::Directory(_))
    }

    pub fn last_modified(&self) -> Option<i64> {
        match self {
            StorageAttributes::File(file) => file.last_modified,
            StorageAttributes::Directory(dir) => dir.last_modified,
        }
    }
}

/// Operations a storage backend must provide to be used as a filesystem.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    async fn file_exists(&self, path: &str) -> Result<bool>;

    async fn directory_exists(&self, path: &str) -> Result<bool>;

    async fn write(&self, path: &str, contents: &[u8], options: &WriteOptions) -> Result<()> {
        let mut reader = contents;
        self.write_stream(path, &mut reader, options).await
    }

    async fn write_stream(
        &self,
        path: &str,
        contents: &mut (dyn AsyncRead + Unpin + Send),
        options: &WriteOptions,
    ) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.read_stream(path).await?;
        let mut contents = Vec::new();
        stream
            .read_to_end(&mut contents)
            .await
            .with_context(|| format!("Failed to read contents of {}", path))?;
        Ok(contents)
    }

    async fn read_stream(&self, path: &str) -> Result<ReadStream>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn delete_directory(&self, path: &str) -> Result<()>;

    async fn create_directory(&self, path: &str, options: &WriteOptions) -> Result<()>;

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()>;

    async fn visibility(&self, path: &str) -> Result<FileAttributes>;

    async fn mime_type(&self, path: &str) -> Result<FileAttributes>;

    async fn last_modified(&self, path: &str) -> Result<FileAttributes>;

    async fn file_size(&self, path: &str) -> Result<FileAttributes>;

    /// No remote call happens until the stream is first polled.
    fn list_contents(&self, path: &str, deep: bool) -> ListStream<'_>;

    async fn move_file(&self, source: &str, destination: &str, options: &WriteOptions)
        -> Result<()>;

    async fn copy_file(&self, source: &str, destination: &str, options: &WriteOptions)
        -> Result<()>;
}
