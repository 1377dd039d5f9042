//! Typed failures the adapter surfaces through `anyhow::Error`.
//!
//! Callers that need to branch on a failure kind downcast:
//! `err.downcast_ref::<AdapterError>()`.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum AdapterError {
    /// The remote API answered with a non-zero `errno` or an `error_code`.
    #[error("Netdisk API call '{method}' failed with errno {errno}: {message}")]
    Api {
        method: String,
        errno: i64,
        message: String,
    },

    #[error("No remote entry found for path: {0}")]
    NotFound(String),

    /// The path addresses the configured root rather than an entry below it.
    #[error("Path does not name an entry below the root: '{0}'")]
    InvalidPath(String),

    #[error("Operation '{0}' is not supported by the Baidu Netdisk adapter")]
    Unsupported(&'static str),

    #[error("Invalid adapter configuration: {0}")]
    InvalidConfig(String),

    #[error("Remote entry has no direct download link: {0}")]
    MissingDownloadLink(String),
}

impl AdapterError {
    pub fn api(method: &str, errno: i64, message: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            errno,
            message: message.into(),
        }
    }
}
