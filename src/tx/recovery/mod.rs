pub mod checkpoint_record;
pub mod commit_record;
pub mod log_record;
pub mod recovery_mgr;
pub mod rollback_record;
pub mod set_int_record;
pub mod set_string_record;
pub mod start_record;

pub use checkpoint_record::CheckpointRecord;
pub use commit_record::CommitRecord;
pub use log_record::{
    create_log_record, LogRecord, CHECKPOINT, COMMIT, ROLLBACK, SETINT, SETSTRING, START,
};
pub use recovery_mgr::RecoveryMgr;
pub use rollback_record::RollbackRecord;
pub use set_int_record::SetIntRecord;
pub use set_string_record::SetStringRecord;
pub use start_record::StartRecord;
