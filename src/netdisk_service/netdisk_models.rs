use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

use crate::error::AdapterError;

/// Status fields every xpan response carries.
/// `errno` is used by the file APIs, `error_code`/`error_msg` by the
/// OAuth-guarded gateway (expired token, bad app key, ...).
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ApiStatus {
    #[serde(default)]
    pub errno: i64,
    #[serde(default)]
    pub errmsg: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl ApiStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    /// Turn a failed status into an `AdapterError::Api`.
    pub fn check(&self, method: &str) -> Result<(), AdapterError> {
        if let Some(code) = self.error_code.filter(|code| *code != 0) {
            let message = self.error_msg.clone().unwrap_or_default();
            return Err(AdapterError::api(method, code, message));
        }
        if self.errno != 0 {
            let message = self
                .errmsg
                .clone()
                .unwrap_or_else(|| "remote API reported an error".to_string());
            return Err(AdapterError::api(method, self.errno, message));
        }
        Ok(())
    }
}

/// RemoteEntry: one file or directory as returned by search, listall and filemetas.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RemoteEntry {
    pub fs_id: u64,
    pub path: String,
    #[serde(default, alias = "filename")]
    pub server_filename: String,
    #[serde(default)]
    pub size: u64,
    /// 0 for files, 1 for directories.
    #[serde(default)]
    pub isdir: u8,
    #[serde(default)]
    pub server_mtime: i64,
    #[serde(default)]
    pub server_ctime: i64,
    pub md5: Option<String>,
    /// Only present on filemetas responses requested with `dlink=1`.
    pub dlink: Option<String>,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.isdir == 1
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub list: Vec<RemoteEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FileMetasResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub list: Vec<RemoteEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ListAllResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub list: Vec<RemoteEntry>,
    #[serde(default, deserialize_with = "flag")]
    pub has_more: bool,
    /// Start offset of the next page when `has_more` is set.
    #[serde(default)]
    pub cursor: u64,
}

/// Per-file outcome of a filemanager call.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ManagerItemResult {
    #[serde(default)]
    pub errno: i64,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ManagerResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub info: Vec<ManagerItemResult>,
    /// Set when the remote side queued the operation asynchronously.
    pub taskid: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PrecreateResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub uploadid: String,
    /// 2 means the server already holds the content and no block upload is needed.
    #[serde(default)]
    pub return_type: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BlockUploadResponse {
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// Result of `create`: the entry that now exists remotely.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub fs_id: u64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub isdir: u8,
}

/// How the remote side resolves a name clash on upload (`rtype`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenamePolicy {
    /// Refuse to replace an existing path.
    #[default]
    Fail = 0,
    /// Rename the new file when the path already exists.
    Rename = 1,
    /// Rename only when the path exists and the content differs.
    RenameOnDiff = 2,
    Overwrite = 3,
}

impl RenamePolicy {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Fail),
            1 => Some(Self::Rename),
            2 => Some(Self::RenameOnDiff),
            3 => Some(Self::Overwrite),
            _ => None,
        }
    }
}

/// Parameters for a single-shot upload.
#[derive(Debug, Clone, PartialEq)]
pub struct OneUploadRequest {
    pub path: String,
    pub rtype: RenamePolicy,
    /// Local file holding the payload; `None` when creating a directory.
    pub local_path: Option<PathBuf>,
    pub is_dir: bool,
}

impl OneUploadRequest {
    pub fn file(path: impl Into<String>, local_path: PathBuf, rtype: RenamePolicy) -> Self {
        Self {
            path: path.into(),
            rtype,
            local_path: Some(local_path),
            is_dir: false,
        }
    }

    pub fn directory(path: impl Into<String>, rtype: RenamePolicy) -> Self {
        Self {
            path: path.into(),
            rtype,
            local_path: None,
            is_dir: true,
        }
    }
}

/// Duplicate handling for move/copy (`ondup`).
/// Relocations never replace an existing entry, so `fail` is the only policy sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDup {
    Fail,
}

impl OnDup {
    pub fn as_str(self) -> &'static str {
        match self {
            OnDup::Fail => "fail",
        }
    }
}

/// Source/destination pair for move and copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub path: String,
    pub dest: String,
    pub newname: String,
    pub ondup: OnDup,
}

/// One filemanager call. The variant selects `opera`, the payload is the `filelist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerOperation {
    Delete(Vec<String>),
    Move(Vec<Relocation>),
    Copy(Vec<Relocation>),
}

impl ManagerOperation {
    pub fn opera(&self) -> &'static str {
        match self {
            ManagerOperation::Delete(_) => "delete",
            ManagerOperation::Move(_) => "move",
            ManagerOperation::Copy(_) => "copy",
        }
    }

    /// JSON-encoded `filelist` form field.
    pub fn file_list_json(&self) -> serde_json::Result<String> {
        match self {
            ManagerOperation::Delete(paths) => serde_json::to_string(paths),
            ManagerOperation::Move(items) | ManagerOperation::Copy(items) => {
                serde_json::to_string(items)
            }
        }
    }

    /// Request-level `ondup`, taken from the first relocation.
    pub fn ondup(&self) -> Option<OnDup> {
        match self {
            ManagerOperation::Delete(_) => None,
            ManagerOperation::Move(items) | ManagerOperation::Copy(items) => {
                items.first().map(|item| item.ondup)
            }
        }
    }
}

/// `async` parameter of filemanager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncMode {
    Sync = 0,
    Adaptive = 1,
    Async = 2,
}

impl AsyncMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The API is inconsistent about `has_more`: bool in some responses, 0/1 in others.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}
