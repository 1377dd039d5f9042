use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Host of the xpan file/multimedia APIs
pub const PAN_API_BASE: &str = "https://pan.baidu.com";

/// Host that accepts block uploads (superfile2)
pub const PCS_UPLOAD_BASE: &str = "https://d.pcs.baidu.com";

/// Direct links are only served to clients that identify as the Netdisk itself
pub const DLINK_USER_AGENT: &str = "pan.baidu.com";

/// Streams a direct-download link into a local sink.
#[async_trait]
pub trait LinkDownloader: Send + Sync {
    /// Download `url` into `sink`, returning the number of bytes written.
    async fn download_to(&self, url: &str, sink: &mut File) -> Result<u64>;
}

/// HTTP client for Baidu Netdisk API operations
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_base_url(PAN_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get full URL by prepending the API base if needed
    pub fn get_full_url(&self, url: &str) -> String {
        if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    /// Make a GET request with query parameters and decode the JSON body
    pub async fn get<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.get_full_url(url);
        debug!("Getting url: {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .context("Failed to get response")?
            .error_for_status()
            .context("Not a success status")?;

        let response_json = response
            .json::<T>()
            .await
            .context("Failed to deserialize response to type T")?;
        Ok(response_json)
    }

    /// Make a form-encoded POST request and decode the JSON body
    pub async fn post_form<T>(
        &self,
        url: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.get_full_url(url);
        debug!("Posting form to url: {}", url);

        let response = self
            .client
            .post(&url)
            .query(query)
            .form(form)
            .send()
            .await
            .context("Failed to get response for post")?
            .error_for_status()
            .context("Not a success status")?
            .json::<T>()
            .await
            .context("Failed to deserialize response to type T")?;
        Ok(response)
    }

    /// Make a multipart POST request (block upload) and decode the JSON body
    pub async fn post_multipart<T>(&self, url: &str, query: &[(&str, String)], form: Form) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.get_full_url(url);
        debug!("Posting multipart to url: {}", url);

        let response = self
            .client
            .post(&url)
            .query(query)
            .multipart(form)
            .send()
            .await
            .context("Failed to get response for multipart post")?
            .error_for_status()
            .context("Not a success status")?
            .json::<T>()
            .await
            .context("Failed to deserialize response to type T")?;
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkDownloader for HttpClient {
    async fn download_to(&self, url: &str, sink: &mut File) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, DLINK_USER_AGENT)
            .send()
            .await
            .context("Failed to get response for download")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Download failed with status: {}",
                response.status()
            ));
        }

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read download body")?
        {
            sink.write_all(&chunk)
                .await
                .context("Failed to write download chunk")?;
            written += chunk.len() as u64;
        }
        sink.flush().await.context("Failed to flush download sink")?;

        debug!("Downloaded {} bytes", written);
        Ok(written)
    }
}
