pub mod config;
pub mod simple_db;

pub use config::{Config, FileStorageMgrConfig, MemStorageMgrConfig, StorageMgrConfig};
pub use simple_db::SimpleDB;
