use crate::netdisk_service::http_client::{HttpClient, PAN_API_BASE, PCS_UPLOAD_BASE};
use crate::netdisk_service::netdisk_models::{
    AsyncMode, BlockUploadResponse, FileMetasResponse, ListAllResponse, ManagerOperation,
    ManagerResponse, OneUploadRequest, PrecreateResponse, SearchResponse, UploadResponse,
};
use crate::error::AdapterError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};

const FILE_API: &str = "/rest/2.0/xpan/file";
const MULTIMEDIA_API: &str = "/rest/2.0/xpan/multimedia";
const SUPERFILE_API: &str = "/rest/2.0/pcs/superfile2";

/// Block size an ordinary account may send in one superfile2 part
const SINGLE_BLOCK_LIMIT: u64 = 4 * 1024 * 1024;

/// precreate answers `return_type == 2` when the content is already on the server
const RAPID_UPLOAD_RETURN_TYPE: u8 = 2;

/// Trait defining the Netdisk API calls the filesystem adapter relies on
#[async_trait]
pub trait NetdiskClientTrait: Send + Sync {
    /// Search `dir` (non-recursively) for entries matching `key`.
    async fn search(&self, key: &str, dir: &str) -> Result<SearchResponse>;

    /// Fetch metadata for the given ids, optionally with direct-download links.
    async fn file_metas(&self, fsids: &[u64], dlink: bool) -> Result<FileMetasResponse>;

    /// Upload a file in a single block, or create a directory.
    async fn one_upload(&self, request: &OneUploadRequest) -> Result<UploadResponse>;

    /// Delete, move or copy through the filemanager endpoint.
    async fn manager(&self, operation: &ManagerOperation, mode: AsyncMode)
        -> Result<ManagerResponse>;

    /// One page of the (optionally recursive) listing of `path`.
    async fn list_all(
        &self,
        path: &str,
        recursive: bool,
        start: u64,
        limit: u32,
    ) -> Result<ListAllResponse>;
}

/// Netdisk API client authenticated with a fixed access token.
/// Token acquisition and refresh happen outside this crate.
#[derive(Clone)]
pub struct NetdiskClient {
    http_client: HttpClient,
    upload_client: HttpClient,
    access_token: String,
}

impl NetdiskClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_urls(access_token, PAN_API_BASE, PCS_UPLOAD_BASE)
    }

    /// Point the client at other hosts (local test servers, proxies).
    pub fn with_base_urls(access_token: &str, api_base: &str, upload_base: &str) -> Self {
        Self {
            http_client: HttpClient::with_base_url(api_base),
            upload_client: HttpClient::with_base_url(upload_base),
            access_token: access_token.to_string(),
        }
    }

    fn query(&self, method: &str) -> Vec<(&'static str, String)> {
        vec![
            ("method", method.to_string()),
            ("access_token", self.access_token.clone()),
        ]
    }

    fn file_name_of(path: &str) -> String {
        path.rsplit('/').next().unwrap_or(path).to_string()
    }

    /// Create a directory entry directly, no precreate needed
    async fn create_directory(&self, request: &OneUploadRequest) -> Result<UploadResponse> {
        let form = vec![
            ("path", request.path.clone()),
            ("size", "0".to_string()),
            ("isdir", "1".to_string()),
            ("rtype", request.rtype.code().to_string()),
        ];

        let response: UploadResponse = self
            .http_client
            .post_form(FILE_API, &self.query("create"), &form)
            .await
            .context("Failed to create directory")?;
        response.status.check("create")?;

        info!("Created directory: {}", request.path);
        Ok(response)
    }

    /// precreate -> superfile2 (single block) -> create
    async fn upload_file(&self, request: &OneUploadRequest) -> Result<UploadResponse> {
        let local_path = request
            .local_path
            .as_ref()
            .ok_or_else(|| anyhow!("No local payload given for upload of {}", request.path))?;

        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read staged file: {}", local_path.display()))?;
        let size = data.len() as u64;
        if size > SINGLE_BLOCK_LIMIT {
            warn!(
                "File size {} bytes exceeds the {} bytes block limit, sending as one block anyway",
                size, SINGLE_BLOCK_LIMIT
            );
        }

        let block_md5 = format!("{:x}", md5::compute(&data));
        let block_list = serde_json::to_string(&[&block_md5])?;
        let rtype = request.rtype.code().to_string();

        let precreate_form = vec![
            ("path", request.path.clone()),
            ("size", size.to_string()),
            ("isdir", "0".to_string()),
            ("autoinit", "1".to_string()),
            ("rtype", rtype.clone()),
            ("block_list", block_list.clone()),
        ];
        let precreate: PrecreateResponse = self
            .http_client
            .post_form(FILE_API, &self.query("precreate"), &precreate_form)
            .await
            .context("Failed to precreate upload")?;
        precreate.status.check("precreate")?;
        debug!("Precreated upload {} for {}", precreate.uploadid, request.path);

        if precreate.return_type != RAPID_UPLOAD_RETURN_TYPE {
            let mut block_query = self.query("upload");
            block_query.push(("type", "tmpfile".to_string()));
            block_query.push(("path", request.path.clone()));
            block_query.push(("uploadid", precreate.uploadid.clone()));
            block_query.push(("partseq", "0".to_string()));

            let part = Part::bytes(data).file_name(Self::file_name_of(&request.path));
            let block: BlockUploadResponse = self
                .upload_client
                .post_multipart(SUPERFILE_API, &block_query, Form::new().part("file", part))
                .await
                .context("Failed to upload block")?;
            if let Some(code) = block.error_code.filter(|code| *code != 0) {
                return Err(AdapterError::api(
                    "superfile2",
                    code,
                    block.error_msg.unwrap_or_default(),
                )
                .into());
            }
            debug!("Uploaded block md5 {} for {}", block.md5, request.path);
        }

        let create_form = vec![
            ("path", request.path.clone()),
            ("size", size.to_string()),
            ("isdir", "0".to_string()),
            ("block_list", block_list),
            ("uploadid", precreate.uploadid),
            ("rtype", rtype),
        ];
        let response: UploadResponse = self
            .http_client
            .post_form(FILE_API, &self.query("create"), &create_form)
            .await
            .context("Failed to create uploaded file")?;
        response.status.check("create")?;

        info!("Uploaded file: {} ({} bytes) -> {}", request.path, size, response.fs_id);
        Ok(response)
    }
}

#[async_trait]
impl NetdiskClientTrait for NetdiskClient {
    async fn search(&self, key: &str, dir: &str) -> Result<SearchResponse> {
        let mut query = self.query("search");
        query.push(("key", key.to_string()));
        query.push(("dir", dir.to_string()));
        query.push(("recursion", "0".to_string()));

        let response: SearchResponse = self
            .http_client
            .get(FILE_API, &query)
            .await
            .context("Failed to search")?;
        response.status.check("search")?;

        debug!("Search for '{}' in {} matched {} entries", key, dir, response.list.len());
        Ok(response)
    }

    async fn file_metas(&self, fsids: &[u64], dlink: bool) -> Result<FileMetasResponse> {
        let mut query = self.query("filemetas");
        query.push(("fsids", serde_json::to_string(fsids)?));
        query.push(("dlink", if dlink { "1" } else { "0" }.to_string()));

        let response: FileMetasResponse = self
            .http_client
            .get(MULTIMEDIA_API, &query)
            .await
            .context("Failed to get file metas")?;
        response.status.check("filemetas")?;
        Ok(response)
    }

    async fn one_upload(&self, request: &OneUploadRequest) -> Result<UploadResponse> {
        if request.is_dir {
            self.create_directory(request).await
        } else {
            self.upload_file(request).await
        }
    }

    async fn manager(
        &self,
        operation: &ManagerOperation,
        mode: AsyncMode,
    ) -> Result<ManagerResponse> {
        let mut query = self.query("filemanager");
        query.push(("opera", operation.opera().to_string()));

        let mut form = vec![
            ("async", mode.code().to_string()),
            ("filelist", operation.file_list_json()?),
        ];
        if let Some(ondup) = operation.ondup() {
            form.push(("ondup", ondup.as_str().to_string()));
        }

        let response: ManagerResponse = self
            .http_client
            .post_form(FILE_API, &query, &form)
            .await
            .with_context(|| format!("Failed to {} items", operation.opera()))?;
        response.status.check("filemanager")?;
        if let Some(failed) = response.info.iter().find(|item| item.errno != 0) {
            return Err(AdapterError::api(
                "filemanager",
                failed.errno,
                format!("{} failed for {}", operation.opera(), failed.path),
            )
            .into());
        }

        match response.taskid {
            Some(taskid) if taskid != 0 => {
                info!("Filemanager {} queued as task {}", operation.opera(), taskid)
            }
            _ => info!("Filemanager {} succeeded", operation.opera()),
        }
        Ok(response)
    }

    async fn list_all(
        &self,
        path: &str,
        recursive: bool,
        start: u64,
        limit: u32,
    ) -> Result<ListAllResponse> {
        let mut query = self.query("listall");
        query.push(("path", path.to_string()));
        query.push(("recursion", if recursive { "1" } else { "0" }.to_string()));
        query.push(("start", start.to_string()));
        query.push(("limit", limit.to_string()));

        let response: ListAllResponse = self
            .http_client
            .get(MULTIMEDIA_API, &query)
            .await
            .context("Failed to list directory")?;
        response.status.check("listall")?;

        debug!(
            "Listed {} entries under {} from offset {}",
            response.list.len(),
            path,
            start
        );
        Ok(response)
    }
}
