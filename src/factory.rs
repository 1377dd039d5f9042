use anyhow::Result;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::NetdiskAdapter;
use crate::config::AdapterConfig;
use crate::netdisk_service::http_client::HttpClient;
use crate::netdisk_service::netdisk_client::NetdiskClient;

/// Wires a `NetdiskAdapter` to the real HTTP-backed client and downloader.
pub struct AdapterFactory;

impl AdapterFactory {
    /// Build from an option map with `access_token` (required), `root` and `temp_dir`.
    pub fn make(options: &HashMap<String, String>) -> Result<NetdiskAdapter> {
        let config = AdapterConfig::from_options(options)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: AdapterConfig) -> NetdiskAdapter {
        let client = Arc::new(NetdiskClient::new(config.access_token()));
        let downloader = Arc::new(HttpClient::new());
        info!("Created Netdisk adapter rooted at {}", config.root());
        NetdiskAdapter::new(config, client, downloader)
    }
}
