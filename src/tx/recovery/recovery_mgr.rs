use std::sync::Arc;

use crate::buffer::buffer::Buffer;
use crate::buffer::buffer_mgr::BufferMgr;
use crate::error::DbResult;
use crate::log::LogMgr;

use super::commit_record::CommitRecord;
use super::rollback_record::RollbackRecord;
use super::set_int_record::SetIntRecord;
use super::set_string_record::SetStringRecord;
use super::start_record::StartRecord;

/// Per-transaction recovery support: writes the START/COMMIT/ROLLBACK
/// bracket records and the before-image SETINT/SETSTRING records that let
/// `Transaction::rollback` undo a transaction's writes.
///
/// `recover()` is a deliberate no-op here: rebuilding database state from
/// the log after a crash (redoing committed transactions, undoing
/// in-flight ones) is out of scope for this core. The log this manager
/// writes carries everything a full ARIES-style recover() would need.
pub struct RecoveryMgr<'a> {
    log_mgr: Arc<LogMgr>,
    buffer_mgr: &'a BufferMgr,
    tx_num: i32,
}

impl<'a> RecoveryMgr<'a> {
    pub fn new(tx_num: i32, log_mgr: Arc<LogMgr>, buffer_mgr: &'a BufferMgr) -> DbResult<Self> {
        let start_record = StartRecord::create(tx_num);
        let bytes = start_record.to_bytes()?;
        log_mgr.append(&bytes)?;

        Ok(RecoveryMgr {
            log_mgr,
            buffer_mgr,
            tx_num,
        })
    }

    /// Flushes this transaction's dirty buffers, then appends and flushes
    /// a COMMIT record so it is durable before the caller returns.
    pub fn commit(&self) -> DbResult<()> {
        self.buffer_mgr.flush_all(self.tx_num)?;

        let commit_record = CommitRecord::create(self.tx_num);
        let bytes = commit_record.to_bytes()?;
        let lsn = self.log_mgr.append(&bytes)?;
        self.log_mgr.flush(lsn)?;

        Ok(())
    }

    /// Flushes this transaction's dirty buffers, then appends and flushes
    /// a ROLLBACK record. Undoing the transaction's own writes is the
    /// caller's job (`Transaction::rollback` does that before calling
    /// this).
    pub fn rollback(&self) -> DbResult<()> {
        self.buffer_mgr.flush_all(self.tx_num)?;

        let rollback_record = RollbackRecord::create(self.tx_num);
        let bytes = rollback_record.to_bytes()?;
        let lsn = self.log_mgr.append(&bytes)?;
        self.log_mgr.flush(lsn)?;

        Ok(())
    }

    pub fn recover(&self) -> DbResult<()> {
        Ok(())
    }

    /// Logs the pre-write value of an integer slot and returns the LSN of
    /// that log record.
    pub fn set_int(&self, buffer: &mut Buffer, offset: usize, _new_val: i32) -> DbResult<i32> {
        let old_val = buffer.page().get_int(offset)?;
        let blk = buffer
            .block()
            .expect("buffer passed to RecoveryMgr::set_int has no block assigned")
            .clone();

        let record = SetIntRecord::create(self.tx_num, blk, offset as i32, old_val);
        let bytes = record.to_bytes()?;
        self.log_mgr.append(&bytes)
    }

    /// Logs the pre-write value of a string slot and returns the LSN of
    /// that log record.
    pub fn set_string(&self, buffer: &mut Buffer, offset: usize, _new_val: &str) -> DbResult<i32> {
        let old_val = buffer.page().get_string(offset)?;
        let blk = buffer
            .block()
            .expect("buffer passed to RecoveryMgr::set_string has no block assigned")
            .clone();

        let record = SetStringRecord::create(self.tx_num, blk, offset as i32, old_val);
        let bytes = record.to_bytes()?;
        self.log_mgr.append(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlockId, FileMgr, StorageMgr};
    use tempfile::tempdir;

    #[test]
    fn commit_appends_a_durable_commit_record() -> DbResult<()> {
        let dir = tempdir().unwrap();
        let storage_mgr: Arc<dyn StorageMgr> = Arc::new(FileMgr::new(dir.path(), 400)?);
        let log_mgr = Arc::new(LogMgr::new(Arc::clone(&storage_mgr), "testlog")?);
        let buffer_mgr = BufferMgr::new(Arc::clone(&storage_mgr), Arc::clone(&log_mgr), 3);

        let recovery_mgr = RecoveryMgr::new(1, Arc::clone(&log_mgr), &buffer_mgr)?;
        recovery_mgr.commit()?;

        let mut iter = log_mgr.iterator()?;
        let newest = iter.next()?;
        let record = super::super::log_record::create_log_record(&newest)?;
        assert_eq!(record.op(), super::super::log_record::COMMIT);
        assert_eq!(record.tx_number(), 1);

        Ok(())
    }

    #[test]
    fn set_int_logs_the_old_value() -> DbResult<()> {
        let dir = tempdir().unwrap();
        let storage_mgr: Arc<dyn StorageMgr> = Arc::new(FileMgr::new(dir.path(), 400)?);
        let log_mgr = Arc::new(LogMgr::new(Arc::clone(&storage_mgr), "testlog")?);
        let buffer_mgr = BufferMgr::new(Arc::clone(&storage_mgr), Arc::clone(&log_mgr), 3);

        storage_mgr.append("testfile")?;
        let blk = BlockId::new("testfile".to_string(), 0);
        let guard = buffer_mgr.pin(&blk)?;

        let recovery_mgr = RecoveryMgr::new(1, Arc::clone(&log_mgr), &buffer_mgr)?;
        {
            let mut buffer = guard.borrow_mut();
            buffer.contents_mut().set_int(0, 111)?;
            let lsn = recovery_mgr.set_int(&mut buffer, 0, 222)?;
            assert!(lsn > 0);
        }

        Ok(())
    }
}
