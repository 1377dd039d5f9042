//! Filesystem adapter backed by Baidu Netdisk.
//!
//! Every operation resolves the caller's relative path against the configured
//! root, issues one or more Netdisk API calls and maps the JSON answer back
//! into filesystem attribute records. Nothing is cached between calls.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};
use url::Url;

use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::filesystem::{
    DirectoryAttributes, FileAttributes, FilesystemAdapter, ListStream, ReadStream,
    StorageAttributes, Visibility, WriteOptions,
};
use crate::netdisk_service::http_client::LinkDownloader;
use crate::netdisk_service::netdisk_client::NetdiskClientTrait;
use crate::netdisk_service::netdisk_models::{
    AsyncMode, ManagerOperation, OneUploadRequest, OnDup, Relocation, RemoteEntry,
};
use crate::operations::path_utils::{join_root, split_path};
use crate::operations::staging::Staging;

/// Entries requested per listall page
const LIST_PAGE_SIZE: u32 = 1000;

pub struct NetdiskAdapter {
    client: Arc<dyn NetdiskClientTrait>,
    downloader: Arc<dyn LinkDownloader>,
    config: AdapterConfig,
    staging: Staging,
}

impl NetdiskAdapter {
    pub fn new(
        config: AdapterConfig,
        client: Arc<dyn NetdiskClientTrait>,
        downloader: Arc<dyn LinkDownloader>,
    ) -> Self {
        let staging = Staging::new(config.temp_dir());
        Self {
            client,
            downloader,
            config,
            staging,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Absolute remote path for an adapter-relative path
    fn resolve(&self, path: &str) -> String {
        join_root(self.config.root(), path)
    }

    /// Search hits for the base name of an absolute path. The remote search
    /// is a keyword match, so hits may include similarly named siblings.
    async fn search_hits(&self, location: &str) -> Result<Vec<RemoteEntry>> {
        let (dir, name) = split_path(location);
        let response = self
            .client
            .search(&name, &dir)
            .await
            .with_context(|| format!("Failed to look up {}", location))?;
        Ok(response.list)
    }

    /// The search hit whose path is exactly `location`, if any
    async fn lookup(&self, location: &str) -> Result<Option<RemoteEntry>> {
        let wanted = location.trim_end_matches('/');
        Ok(self
            .search_hits(location)
            .await?
            .into_iter()
            .find(|entry| entry.path.trim_end_matches('/') == wanted))
    }

    async fn require(&self, location: &str) -> Result<RemoteEntry> {
        match self.lookup(location).await? {
            Some(entry) => Ok(entry),
            None => Err(AdapterError::NotFound(location.to_string()).into()),
        }
    }

    /// Direct links are only honoured with the access token appended
    fn direct_link_url(&self, dlink: &str) -> Result<String> {
        let mut url = Url::parse(dlink)
            .with_context(|| format!("Invalid direct download link: {}", dlink))?;
        url.query_pairs_mut()
            .append_pair("access_token", self.config.access_token());
        Ok(url.into())
    }

    /// Like `resolve`, but refuses paths that would address the root itself
    fn resolve_entry(&self, path: &str) -> Result<String> {
        if path.trim_matches('/').is_empty() {
            return Err(AdapterError::InvalidPath(path.to_string()).into());
        }
        Ok(self.resolve(path))
    }

    async fn manage(&self, operation: ManagerOperation) -> Result<()> {
        debug!("Filemanager {}: {:?}", operation.opera(), operation);
        self.client
            .manager(&operation, AsyncMode::Adaptive)
            .await
            .with_context(|| format!("Failed to {} remote entries", operation.opera()))?;
        Ok(())
    }

    /// Move/copy payload. The remote side ignores `overwrite` and `skip`
    /// for relocations, so conflicts always fail.
    fn relocation(&self, source: &str, destination: &str) -> Result<Relocation> {
        let path = self.resolve_entry(source)?;
        let (dest, newname) = split_path(&self.resolve_entry(destination)?);
        Ok(Relocation {
            path,
            dest,
            newname,
            ondup: OnDup::Fail,
        })
    }
}

/// Map a remote entry onto a filesystem record; `None` for unknown kinds.
pub fn storage_attributes(entry: &RemoteEntry) -> Option<StorageAttributes> {
    match entry.isdir {
        0 => Some(StorageAttributes::File(
            FileAttributes::new(entry.path.clone())
                .with_file_size(entry.size)
                .with_last_modified(entry.server_mtime),
        )),
        1 => Some(StorageAttributes::Directory(DirectoryAttributes {
            path: entry.path.clone(),
            last_modified: Some(entry.server_mtime),
        })),
        _ => None,
    }
}

struct ListState {
    client: Arc<dyn NetdiskClientTrait>,
    path: String,
    deep: bool,
    next_start: Option<u64>,
    buffered: VecDeque<RemoteEntry>,
}

async fn next_listed(mut state: ListState) -> Result<Option<(StorageAttributes, ListState)>> {
    loop {
        if let Some(entry) = state.buffered.pop_front() {
            match storage_attributes(&entry) {
                Some(attributes) => return Ok(Some((attributes, state))),
                None => {
                    warn!("Skipping {} with unknown isdir value {}", entry.path, entry.isdir);
                    continue;
                }
            }
        }

        let Some(start) = state.next_start else {
            return Ok(None);
        };

        let page = state
            .client
            .list_all(&state.path, state.deep, start, LIST_PAGE_SIZE)
            .await
            .with_context(|| format!("Failed to list {}", state.path))?;

        // A cursor that does not advance would page forever
        state.next_start = if page.has_more && page.cursor > start {
            Some(page.cursor)
        } else {
            None
        };
        state.buffered.extend(page.list);
    }
}

#[async_trait]
impl FilesystemAdapter for NetdiskAdapter {
    async fn file_exists(&self, path: &str) -> Result<bool> {
        let location = self.resolve(path);
        Ok(!self.search_hits(&location).await?.is_empty())
    }

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        let location = self.resolve(path);
        Ok(self
            .lookup(&location)
            .await?
            .is_some_and(|entry| entry.is_dir()))
    }

    async fn write_stream(
        &self,
        path: &str,
        contents: &mut (dyn AsyncRead + Unpin + Send),
        options: &WriteOptions,
    ) -> Result<()> {
        let location = self.resolve(path);
        let staged = self.staging.upload_file()?;

        let mut file = File::from_std(staged.reopen().context("Failed to open staging file")?);
        let size = tokio::io::copy(contents, &mut file)
            .await
            .context("Failed to stage upload contents")?;
        file.flush().await.context("Failed to flush staging file")?;
        drop(file);

        let request = OneUploadRequest::file(&location, staged.path().to_path_buf(), options.rtype);
        self.client
            .one_upload(&request)
            .await
            .with_context(|| format!("Failed to upload {}", location))?;

        if let Err(e) = staged.close() {
            warn!("Failed to remove staging file after uploading {}: {}", location, e);
        }
        info!("Wrote {} ({} bytes)", location, size);
        Ok(())
    }

    async fn read_stream(&self, path: &str) -> Result<ReadStream> {
        let location = self.resolve(path);
        let entry = self.require(&location).await?;

        let metas = self
            .client
            .file_metas(&[entry.fs_id], true)
            .await
            .with_context(|| format!("Failed to get metadata for {}", location))?;
        let dlink = metas
            .list
            .into_iter()
            .next()
            .and_then(|meta| meta.dlink)
            .ok_or_else(|| AdapterError::MissingDownloadLink(location.clone()))?;

        let url = self.direct_link_url(&dlink)?;
        let mut sink = self.staging.download_sink()?;
        let size = self
            .downloader
            .download_to(&url, &mut sink)
            .await
            .with_context(|| format!("Failed to download {}", location))?;
        sink.rewind().await.context("Failed to rewind download")?;

        info!("Read {} ({} bytes)", location, size);
        Ok(sink)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = self.resolve_entry(path)?;
        self.manage(ManagerOperation::Delete(vec![location.clone()]))
            .await?;
        info!("Deleted {}", location);
        Ok(())
    }

    /// The remote API treats files and directories alike.
    async fn delete_directory(&self, path: &str) -> Result<()> {
        self.delete(path).await
    }

    async fn create_directory(&self, path: &str, options: &WriteOptions) -> Result<()> {
        let location = self.resolve(path);
        self.client
            .one_upload(&OneUploadRequest::directory(&location, options.rtype))
            .await
            .with_context(|| format!("Failed to create directory {}", location))?;
        info!("Created directory {}", location);
        Ok(())
    }

    async fn set_visibility(&self, _path: &str, _visibility: Visibility) -> Result<()> {
        Err(AdapterError::Unsupported("set_visibility").into())
    }

    async fn visibility(&self, _path: &str) -> Result<FileAttributes> {
        Err(AdapterError::Unsupported("visibility").into())
    }

    async fn mime_type(&self, _path: &str) -> Result<FileAttributes> {
        Err(AdapterError::Unsupported("mime_type").into())
    }

    async fn last_modified(&self, path: &str) -> Result<FileAttributes> {
        let location = self.resolve(path);
        let entry = self.require(&location).await?;
        Ok(FileAttributes::new(location).with_last_modified(entry.server_mtime))
    }

    async fn file_size(&self, path: &str) -> Result<FileAttributes> {
        let location = self.resolve(path);
        let entry = self.require(&location).await?;
        Ok(FileAttributes::new(location).with_file_size(entry.size))
    }

    fn list_contents(&self, path: &str, deep: bool) -> ListStream<'_> {
        let state = ListState {
            client: self.client.clone(),
            path: self.resolve(path),
            deep,
            next_start: Some(0),
            buffered: VecDeque::new(),
        };
        stream::try_unfold(state, next_listed).boxed()
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        _options: &WriteOptions,
    ) -> Result<()> {
        let relocation = self.relocation(source, destination)?;
        info!("Moving {} to {}/{}", relocation.path, relocation.dest, relocation.newname);
        self.manage(ManagerOperation::Move(vec![relocation])).await
    }

    async fn copy_file(
        &self,
        source: &str,
        destination: &str,
        _options: &WriteOptions,
    ) -> Result<()> {
        let relocation = self.relocation(source, destination)?;
        info!("Copying {} to {}/{}", relocation.path, relocation.dest, relocation.newname);
        self.manage(ManagerOperation::Copy(vec![relocation])).await
    }
}
