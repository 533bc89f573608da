use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use crate::buffer::{buffer_list::BufferList, buffer_mgr::BufferMgr};
use crate::error::{DbError, DbResult};
use crate::log::LogMgr;
use crate::storage::{BlockId, StorageMgr};

use super::concurrency::{ConcurrencyMgr, LockTable};
use super::recovery::{create_log_record, RecoveryMgr, START};

static NEXT_TX_NUM: AtomicI32 = AtomicI32::new(0);
const END_OF_FILE: i32 = -1;

/// A unit of work against the database: reads and writes go through a
/// `Transaction`, which acquires the locks (via `ConcurrencyMgr`) that
/// guarantee isolation from other concurrent transactions and delegates
/// to `RecoveryMgr` for the log records that let `rollback` undo
/// everything it did.
pub struct Transaction<'a> {
    buffer_mgr: &'a BufferMgr,
    log_mgr: Arc<LogMgr>,
    storage_mgr: Arc<dyn StorageMgr>,
    tx_num: i32,
    buffers: BufferList<'a>,
    concurrency_mgr: ConcurrencyMgr,
    recovery_mgr: RecoveryMgr<'a>,
}

impl<'a> Transaction<'a> {
    pub fn new(
        storage_mgr: Arc<dyn StorageMgr>,
        log_mgr: Arc<LogMgr>,
        buffer_mgr: &'a BufferMgr,
        lock_table: Arc<LockTable>,
    ) -> DbResult<Self> {
        let tx_num = NEXT_TX_NUM.fetch_add(1, Ordering::SeqCst) + 1;
        let recovery_mgr = RecoveryMgr::new(tx_num, Arc::clone(&log_mgr), buffer_mgr)?;
        let buffers = BufferList::new(buffer_mgr);

        Ok(Transaction {
            buffer_mgr,
            log_mgr,
            storage_mgr,
            tx_num,
            buffers,
            concurrency_mgr: ConcurrencyMgr::new(tx_num, lock_table),
            recovery_mgr,
        })
    }

    pub fn tx_num(&self) -> i32 {
        self.tx_num
    }

    pub fn commit(&mut self) -> DbResult<()> {
        self.recovery_mgr.commit()?;
        self.concurrency_mgr.release();
        self.buffers.unpin_all();
        Ok(())
    }

    pub fn rollback(&mut self) -> DbResult<()> {
        self.do_rollback()?;
        self.recovery_mgr.rollback()?;
        self.concurrency_mgr.release();
        self.buffers.unpin_all();
        Ok(())
    }

    /// Walks the log newest-to-oldest, undoing every record this
    /// transaction wrote, stopping at its own START record.
    fn do_rollback(&mut self) -> DbResult<()> {
        let log_mgr = Arc::clone(&self.log_mgr);
        let mut iter = log_mgr.iterator()?;

        while iter.has_next() {
            let bytes = iter.next()?;
            let record = create_log_record(&bytes)?;

            if record.tx_number() == self.tx_num {
                if record.op() == START {
                    return Ok(());
                }
                record.undo(self)?;
            }
        }

        Ok(())
    }

    pub fn pin(&mut self, blk: &BlockId) -> DbResult<()> {
        self.buffers.pin(blk)
    }

    pub fn unpin(&mut self, blk: &BlockId) {
        self.buffers.unpin(blk);
    }

    pub fn get_int(&mut self, blk: &BlockId, offset: usize) -> DbResult<i32> {
        self.concurrency_mgr.lock_shared(blk)?;
        let guard = self
            .buffers
            .get_buffer(blk)
            .ok_or_else(|| DbError::BufferNotFound(blk.clone()))?;
        let buffer = guard.borrow();
        buffer.page().get_int(offset)
    }

    pub fn get_string(&mut self, blk: &BlockId, offset: usize) -> DbResult<String> {
        self.concurrency_mgr.lock_shared(blk)?;
        let guard = self
            .buffers
            .get_buffer(blk)
            .ok_or_else(|| DbError::BufferNotFound(blk.clone()))?;
        let buffer = guard.borrow();
        buffer.page().get_string(offset)
    }

    pub fn set_int(&mut self, blk: &BlockId, offset: usize, val: i32, log: bool) -> DbResult<()> {
        self.concurrency_mgr.lock_exclusive(blk)?;
        let guard = self
            .buffers
            .get_buffer(blk)
            .ok_or_else(|| DbError::BufferNotFound(blk.clone()))?;
        let mut buffer = guard.borrow_mut();

        let lsn = if log {
            self.recovery_mgr.set_int(&mut buffer, offset, val)?
        } else {
            -1
        };

        buffer.contents_mut().set_int(offset, val)?;
        buffer.set_modified(self.tx_num, lsn);
        Ok(())
    }

    pub fn set_string(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: String,
        log: bool,
    ) -> DbResult<()> {
        self.concurrency_mgr.lock_exclusive(blk)?;
        let guard = self
            .buffers
            .get_buffer(blk)
            .ok_or_else(|| DbError::BufferNotFound(blk.clone()))?;
        let mut buffer = guard.borrow_mut();

        let lsn = if log {
            self.recovery_mgr.set_string(&mut buffer, offset, &val)?
        } else {
            -1
        };

        buffer.contents_mut().set_string(offset, &val)?;
        buffer.set_modified(self.tx_num, lsn);
        Ok(())
    }

    pub fn size(&mut self, file_name: &str) -> DbResult<i32> {
        let dummy_blk = BlockId::new(file_name.to_string(), END_OF_FILE);
        self.concurrency_mgr.lock_shared(&dummy_blk)?;
        Ok(self.storage_mgr.block_count(file_name)?)
    }

    pub fn append(&mut self, file_name: &str) -> DbResult<BlockId> {
        let dummy_blk = BlockId::new(file_name.to_string(), END_OF_FILE);
        self.concurrency_mgr.lock_exclusive(&dummy_blk)?;
        self.storage_mgr.append(file_name)
    }

    pub fn block_size(&self) -> usize {
        self.storage_mgr.block_size()
    }

    pub fn available_buffs(&self) -> usize {
        self.buffer_mgr.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileMgr;
    use tempfile::TempDir;

    fn setup(
        temp_dir: &TempDir,
    ) -> DbResult<(Arc<dyn StorageMgr>, Arc<LogMgr>, BufferMgr, Arc<LockTable>)> {
        let storage_mgr: Arc<dyn StorageMgr> = Arc::new(FileMgr::new(temp_dir.path(), 400)?);
        let log_mgr = Arc::new(LogMgr::new(Arc::clone(&storage_mgr), "testlog")?);
        let buffer_mgr = BufferMgr::new(Arc::clone(&storage_mgr), Arc::clone(&log_mgr), 8);
        let lock_table = Arc::new(LockTable::new());
        Ok((storage_mgr, log_mgr, buffer_mgr, lock_table))
    }

    #[test]
    fn test_transaction_basic() -> DbResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let (storage_mgr, log_mgr, buffer_mgr, lock_table) = setup(&temp_dir)?;
        let mut tx = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;

        let blk = tx.append("testfile")?;
        tx.pin(&blk)?;
        tx.set_int(&blk, 0, 123, true)?;
        tx.set_string(&blk, 100, "ABRACADABRA".to_string(), true)?;

        let int_val = tx.get_int(&blk, 0)?;
        assert_eq!(int_val, 123);
        let str_val = tx.get_string(&blk, 100)?;
        assert_eq!(str_val, "ABRACADABRA");

        tx.commit()?;
        Ok(())
    }

    #[test]
    fn test_transaction_rollback1() -> DbResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let (storage_mgr, log_mgr, buffer_mgr, lock_table) = setup(&temp_dir)?;

        let mut tx1 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;

        let blk1 = tx1.append("testfile")?;

        tx1.pin(&blk1)?;
        tx1.set_int(&blk1, 50, 777, true)?;
        tx1.set_string(&blk1, 200, "ABC".to_string(), true)?;

        tx1.commit()?;

        let mut tx2 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;
        tx2.pin(&blk1)?;

        let int_val = tx2.get_int(&blk1, 50)?;
        assert_eq!(int_val, 777);
        let str_val = tx2.get_string(&blk1, 200)?;
        assert_eq!(str_val, "ABC");

        tx2.set_int(&blk1, 50, 999, true)?;
        tx2.set_string(&blk1, 200, "CDE".to_string(), true)?;
        tx2.rollback()?;

        let mut tx3 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;
        tx3.pin(&blk1)?;

        let int_val2 = tx3.get_int(&blk1, 50)?;
        assert_eq!(int_val2, 777);

        Ok(())
    }

    #[test]
    fn test_transaction_rollback() -> DbResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let (storage_mgr, log_mgr, buffer_mgr, lock_table) = setup(&temp_dir)?;

        let mut tx1 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;

        let blk1 = tx1.append("testfile")?;

        tx1.pin(&blk1)?;
        tx1.set_int(&blk1, 50, 777, true)?;
        tx1.set_int(&blk1, 200, 123, true)?;
        tx1.set_string(&blk1, 300, "ABC".to_string(), true)?;

        tx1.commit()?;

        let mut tx2 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;
        tx2.pin(&blk1)?;

        let value1 = tx2.get_int(&blk1, 50)?;
        assert_eq!(value1, 777);
        let value2 = tx2.get_int(&blk1, 200)?;
        assert_eq!(value2, 123);
        let str_val = tx2.get_string(&blk1, 300)?;
        assert_eq!(str_val, "ABC");

        tx2.set_int(&blk1, 50, 999, true)?;
        tx2.set_int(&blk1, 200, 234, true)?;
        tx2.set_string(&blk1, 300, "CDE".to_string(), true)?;
        tx2.rollback()?;

        let mut tx3 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;
        tx3.pin(&blk1)?;

        let value1 = tx3.get_int(&blk1, 50)?;
        assert_eq!(value1, 777);
        let value2 = tx3.get_int(&blk1, 200)?;
        assert_eq!(value2, 123);
        let str_val2 = tx3.get_string(&blk1, 300)?;
        assert_eq!(str_val2, "ABC");

        Ok(())
    }

    #[test]
    fn concurrent_readers_share_a_lock_but_a_writer_blocks_them() -> DbResult<()> {
        use std::thread;
        use std::time::Duration;

        let temp_dir = TempDir::new().unwrap();
        let (storage_mgr, log_mgr, buffer_mgr, lock_table) = setup(&temp_dir)?;

        let mut setup_tx = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;
        let blk = setup_tx.append("testfile")?;
        setup_tx.pin(&blk)?;
        setup_tx.set_int(&blk, 0, 1, true)?;
        setup_tx.commit()?;

        let mut tx1 = Transaction::new(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            &buffer_mgr,
            Arc::clone(&lock_table),
        )?;
        tx1.pin(&blk)?;
        assert_eq!(tx1.get_int(&blk, 0)?, 1);

        let storage_mgr2 = Arc::clone(&storage_mgr);
        let log_mgr2 = Arc::clone(&log_mgr);
        let lock_table2 = Arc::clone(&lock_table);
        let blk2 = blk.clone();
        let handle = thread::spawn(move || -> DbResult<()> {
            let buffer_mgr2 = BufferMgr::new(Arc::clone(&storage_mgr2), Arc::clone(&log_mgr2), 8);
            let mut tx2 = Transaction::new(storage_mgr2, log_mgr2, &buffer_mgr2, lock_table2)?;
            tx2.pin(&blk2)?;
            assert_eq!(tx2.get_int(&blk2, 0)?, 1);
            tx2.commit()
        });

        thread::sleep(Duration::from_millis(50));
        tx1.commit()?;
        handle.join().unwrap()?;

        Ok(())
    }
}
