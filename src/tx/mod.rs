pub mod concurrency;
pub mod recovery;
pub mod transaction;

pub use concurrency::{ConcurrencyMgr, LockTable};
pub use recovery::RecoveryMgr;
pub use transaction::Transaction;
