//! Operations module for path utilities and temporary-file staging

pub mod path_utils;
pub mod staging;
