pub mod concurrency_mgr;
pub mod lock_table;

pub use concurrency_mgr::{ConcurrencyMgr, LockType};
pub use lock_table::LockTable;
