pub mod block_id;
pub mod file_mgr;
pub mod page;

pub use block_id::BlockId;
pub use file_mgr::{FileMgr, MemStorageMgr, StorageMgr};
pub use page::Page;
