pub mod http_client;
pub mod netdisk_client;
pub mod netdisk_models;
