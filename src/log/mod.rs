use std::mem::size_of;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::error::DbResult;
use crate::storage::{BlockId, Page, StorageMgr};

/// Manages the write-ahead log: a sequence of blocks in one file, each
/// holding variable-length records packed from the high end downward. The
/// first four bytes of a block are the "boundary" — the offset of the
/// oldest (lowest-offset, most-recently-written) record still in the
/// block. Forward iteration from the boundary therefore visits records
/// newest-first within a block; `LogIterator` walks blocks back-to-front
/// to preserve that order across block boundaries.
pub struct LogMgr {
    storage_mgr: Arc<dyn StorageMgr>,
    logfile: String,
    inner: Mutex<LogMgrInner>,
}

struct LogMgrInner {
    logpage: Page,
    current_blk: BlockId,
    latest_lsn: i32,
    last_saved_lsn: i32,
}

impl LogMgr {
    pub fn new(storage_mgr: Arc<dyn StorageMgr>, logfile: &str) -> DbResult<Self> {
        let block_size = storage_mgr.block_size();
        let mut log_page = Page::new(block_size);

        let block_count = storage_mgr.block_count(logfile)?;
        let current_blk = if block_count == 0 {
            Self::append_new_block(&*storage_mgr, logfile)?
        } else {
            let blk = BlockId::new(logfile.to_string(), block_count - 1);
            storage_mgr.read(&blk, &mut log_page)?;
            blk
        };

        Ok(LogMgr {
            storage_mgr,
            logfile: logfile.to_string(),
            inner: Mutex::new(LogMgrInner {
                logpage: log_page,
                current_blk,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    fn append_new_block(storage_mgr: &dyn StorageMgr, logfile: &str) -> DbResult<BlockId> {
        let blk = storage_mgr.append(logfile)?;
        let block_size = storage_mgr.block_size();
        let mut logpage = Page::new(block_size);
        logpage.set_int(0, block_size as i32)?;
        storage_mgr.write(&blk, &logpage)?;
        trace!(block = %blk, "log rolled over to new block");
        Ok(blk)
    }

    fn flush_internal(&self, inner: &mut LogMgrInner) -> DbResult<()> {
        self.storage_mgr.write(&inner.current_blk, &inner.logpage)?;
        inner.last_saved_lsn = inner.latest_lsn;
        trace!(lsn = inner.last_saved_lsn, block = %inner.current_blk, "log block flushed");
        Ok(())
    }

    /// Flushes the log up through `lsn`, unless it is already durable.
    pub fn flush(&self, lsn: i32) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if lsn > inner.last_saved_lsn {
            self.flush_internal(&mut inner)?;
        }
        Ok(())
    }

    /// Appends a record to the log, flushing the current block first if it
    /// has no room. Returns the LSN assigned to the new record.
    pub fn append(&self, logrec: &[u8]) -> DbResult<i32> {
        let mut inner = self.inner.lock().unwrap();

        let boundary = inner.logpage.get_int(0)?;
        let bytes_needed = logrec.len() + size_of::<i32>();

        if (boundary - bytes_needed as i32) < size_of::<i32>() as i32 {
            self.flush_internal(&mut inner)?;
            inner.current_blk = Self::append_new_block(&*self.storage_mgr, &self.logfile)?;
            inner.logpage = Page::new(self.storage_mgr.block_size());
            inner.logpage.set_int(0, self.storage_mgr.block_size() as i32)?;
        }

        let boundary = inner.logpage.get_int(0)?;
        let recpos = boundary - bytes_needed as i32;
        inner.logpage.set_bytes(recpos as usize, logrec)?;
        inner.logpage.set_int(0, recpos)?;

        inner.latest_lsn += 1;
        Ok(inner.latest_lsn)
    }

    /// Returns an iterator over all records written so far, newest first.
    /// Flushes the current block first so the iterator sees every record
    /// already assigned an LSN.
    pub fn iterator(&self) -> DbResult<LogIterator<'_>> {
        let mut inner: MutexGuard<'_, LogMgrInner> = self.inner.lock().unwrap();
        self.flush_internal(&mut inner)?;
        LogIterator::new(&self.storage_mgr, inner.current_blk.clone())
    }
}

impl Drop for LogMgr {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.latest_lsn > inner.last_saved_lsn {
                let _ = self.flush_internal(&mut inner);
            }
        }
    }
}

/// Walks log records from newest to oldest: forward within the current
/// block from its boundary, then to the end of the preceding block once
/// the current one is exhausted.
pub struct LogIterator<'a> {
    storage_mgr: &'a Arc<dyn StorageMgr>,
    blk: BlockId,
    page: Page,
    currentpos: usize,
}

impl<'a> LogIterator<'a> {
    fn new(storage_mgr: &'a Arc<dyn StorageMgr>, blk: BlockId) -> DbResult<Self> {
        let page = Page::new(storage_mgr.block_size());
        let mut iter = LogIterator {
            storage_mgr,
            blk: blk.clone(),
            page,
            currentpos: 0,
        };
        iter.move_to_block(&blk)?;
        Ok(iter)
    }

    fn move_to_block(&mut self, blk: &BlockId) -> DbResult<()> {
        self.storage_mgr.read(blk, &mut self.page)?;
        self.currentpos = self.page.get_int(0)? as usize;
        Ok(())
    }

    pub fn has_next(&self) -> bool {
        self.currentpos < self.storage_mgr.block_size() || self.blk.number() > 0
    }

    pub fn next(&mut self) -> DbResult<Vec<u8>> {
        if self.currentpos == self.storage_mgr.block_size() {
            let new_blk = BlockId::new(self.blk.filename().to_string(), self.blk.number() - 1);
            self.blk = new_blk.clone();
            self.move_to_block(&new_blk)?;
        }

        let rec = self.page.get_bytes(self.currentpos)?;
        self.currentpos += size_of::<i32>() + rec.len();
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileMgr;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_storage_mgr(block_size: usize) -> (tempfile::TempDir, Arc<dyn StorageMgr>) {
        let dir = tempdir().unwrap();
        let mgr: Arc<dyn StorageMgr> = Arc::new(FileMgr::new(dir.path(), block_size).unwrap());
        (dir, mgr)
    }

    #[test]
    fn single_record_round_trip() -> DbResult<()> {
        let (_dir, storage_mgr) = make_storage_mgr(400);
        let log_mgr = LogMgr::new(Arc::clone(&storage_mgr), "testlog")?;

        let test_rec = b"This is a test log record";
        let lsn = log_mgr.append(test_rec)?;
        assert_eq!(lsn, 1);

        let mut iter = log_mgr.iterator()?;
        assert!(iter.has_next());
        assert_eq!(iter.next()?, test_rec);
        assert!(!iter.has_next());

        Ok(())
    }

    #[test]
    fn multiple_records_come_back_newest_first() -> DbResult<()> {
        let (_dir, storage_mgr) = make_storage_mgr(400);
        let log_mgr = LogMgr::new(Arc::clone(&storage_mgr), "testlog")?;

        let records = vec![
            b"First log record".to_vec(),
            b"Second log record".to_vec(),
            b"Third log record".to_vec(),
            b"Fourth log record".to_vec(),
            b"Fifth log record".to_vec(),
        ];

        let mut lsns = Vec::new();
        for rec in &records {
            lsns.push(log_mgr.append(rec)?);
        }
        for (i, lsn) in lsns.iter().enumerate() {
            assert_eq!(*lsn, (i + 1) as i32);
        }

        let mut iter = log_mgr.iterator()?;
        let mut retrieved = Vec::new();
        while iter.has_next() {
            retrieved.push(iter.next()?);
        }
        retrieved.reverse();
        assert_eq!(retrieved, records);

        Ok(())
    }

    /// Scenario S3: writing enough records to span several blocks must not
    /// disturb the newest-to-oldest iteration order across block boundaries.
    #[test]
    fn records_spanning_many_blocks_stay_in_order() -> DbResult<()> {
        let (_dir, storage_mgr) = make_storage_mgr(100);
        let log_mgr = LogMgr::new(Arc::clone(&storage_mgr), "testlog")?;

        let records: Vec<Vec<u8>> = (0..1000).map(|i| format!("Record #{}", i).into_bytes()).collect();
        for rec in &records {
            log_mgr.append(rec)?;
        }

        let mut iter = log_mgr.iterator()?;
        let mut retrieved = Vec::new();
        while iter.has_next() {
            retrieved.push(iter.next()?);
        }
        retrieved.reverse();
        assert_eq!(retrieved, records);

        Ok(())
    }

    #[test]
    fn records_survive_across_log_manager_instances() -> DbResult<()> {
        let (_dir, storage_mgr) = make_storage_mgr(400);
        let records = vec![
            b"First log record".to_vec(),
            b"Second log record".to_vec(),
            b"Third log record".to_vec(),
        ];

        {
            let log_mgr = LogMgr::new(Arc::clone(&storage_mgr), "testlog")?;
            for rec in &records {
                log_mgr.append(rec)?;
            }
        }

        {
            let log_mgr = LogMgr::new(Arc::clone(&storage_mgr), "testlog")?;
            let mut iter = log_mgr.iterator()?;
            let mut retrieved = Vec::new();
            while iter.has_next() {
                retrieved.push(iter.next()?);
            }
            retrieved.reverse();
            assert_eq!(retrieved, records);
        }

        Ok(())
    }

    #[test]
    fn flush_is_a_no_op_below_last_saved_lsn() -> DbResult<()> {
        let (_dir, storage_mgr) = make_storage_mgr(400);
        let log_mgr = LogMgr::new(Arc::clone(&storage_mgr), "testlog")?;

        log_mgr.append(b"one")?;
        log_mgr.append(b"two")?;
        log_mgr.flush(2)?;
        // Flushing an already-durable LSN must not error or reflush.
        log_mgr.flush(1)?;
        Ok(())
    }

    #[test]
    fn concurrent_appends_get_distinct_monotonic_lsns() -> DbResult<()> {
        use std::sync::Barrier;
        use std::thread;

        let (_dir, storage_mgr) = make_storage_mgr(4096);
        let log_mgr = Arc::new(LogMgr::new(Arc::clone(&storage_mgr), "testlog")?);

        let thread_count = 8;
        let records_per_thread = 2000;
        let barrier = Arc::new(Barrier::new(thread_count));

        let mut handles = Vec::new();
        for thread_id in 0..thread_count {
            let log_mgr = Arc::clone(&log_mgr);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                let mut lsns = Vec::new();
                for i in 0..records_per_thread {
                    let record = format!("Thread {} - Record {}", thread_id, i).into_bytes();
                    let lsn = log_mgr.append(&record).unwrap();
                    lsns.push((record, lsn));
                }
                lsns
            }));
        }

        let mut all_records = Vec::new();
        for handle in handles {
            all_records.extend(handle.join().unwrap());
        }
        all_records.sort_by_key(|(_, lsn)| *lsn);

        for (i, (_, lsn)) in all_records.iter().enumerate() {
            assert_eq!(*lsn, (i + 1) as i32);
        }

        let mut iter = log_mgr.iterator()?;
        let mut retrieved = Vec::new();
        while iter.has_next() {
            retrieved.push(iter.next()?);
        }
        retrieved.reverse();

        assert_eq!(retrieved.len(), thread_count * records_per_thread);
        for (i, (record, _)) in all_records.iter().enumerate() {
            assert_eq!(&retrieved[i], record);
        }

        Ok(())
    }
}
