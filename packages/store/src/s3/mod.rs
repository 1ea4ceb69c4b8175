//! S3 and S3-compatible object storage

pub mod client;
pub mod config;
pub mod store;

pub use config::{RoleConfig, S3Config, StaticCredentials};
pub use store::S3Store;
