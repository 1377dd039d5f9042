//! Scoped temporary files for upload and download staging.
//!
//! Every file handed out here is removed when its owner is dropped, so an
//! early return or a failed remote call never leaves a staged copy behind.

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::fs::File;

const STAGING_PREFIX: &str = "bdfs-";

#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Named file the upload API can read by path; deleted on drop.
    pub fn upload_file(&self) -> Result<NamedTempFile> {
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.dir)
            .with_context(|| {
                format!("Failed to create staging file in {}", self.dir.display())
            })?;
        debug!("Staging upload in {}", staged.path().display());
        Ok(staged)
    }

    /// Anonymous file for downloads. It has no name on disk once this returns
    /// and its storage is reclaimed when the last handle closes.
    pub fn download_sink(&self) -> Result<File> {
        let file = tempfile::tempfile_in(&self.dir).with_context(|| {
            format!("Failed to create download sink in {}", self.dir.display())
        })?;
        Ok(File::from_std(file))
    }
}

impl Default for Staging {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}
