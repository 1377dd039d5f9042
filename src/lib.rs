//! Baidu Netdisk filesystem adapter
//!
//! Exposes the remote drive through the generic `FilesystemAdapter` trait.
//! Build an adapter with `AdapterFactory`, or wire `NetdiskAdapter::new`
//! to your own client implementation.

pub mod adapter;
pub mod config;
pub mod error;
pub mod factory;
pub mod filesystem;
pub mod log_appender;
pub mod netdisk_service;
pub mod operations;

pub use adapter::NetdiskAdapter;
pub use config::AdapterConfig;
pub use error::AdapterError;
pub use factory::AdapterFactory;
pub use filesystem::{
    DirectoryAttributes, FileAttributes, FilesystemAdapter, ListStream, ReadStream,
    StorageAttributes, Visibility, WriteOptions,
};
