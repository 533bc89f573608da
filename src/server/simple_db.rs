use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferMgr;
use crate::error::DbResult;
use crate::log::LogMgr;
use crate::storage::{FileMgr, MemStorageMgr, StorageMgr};
use crate::tx::{LockTable, Transaction};

use super::{Config, StorageMgrConfig};

/// Top-level handle that wires the storage, log, buffer and lock layers
/// together from a `Config` and hands out transactions.
pub struct SimpleDB<'a> {
    storage_mgr: Arc<dyn StorageMgr>,
    log_mgr: Arc<LogMgr>,
    buffer_mgr: &'a BufferMgr,
    lock_table: Arc<LockTable>,
}

impl<'a> SimpleDB<'a> {
    pub fn with_config(config: Config) -> DbResult<Self> {
        let storage_mgr: Arc<dyn StorageMgr> = match &config.storage_mgr {
            StorageMgrConfig::File(file_cfg) => {
                Arc::new(FileMgr::new(&file_cfg.db_directory, file_cfg.block_size)?)
            }
            StorageMgrConfig::Mem(mem_cfg) => Arc::new(MemStorageMgr::new(mem_cfg.block_size)),
        };

        let log_mgr = Arc::new(LogMgr::new(
            Arc::clone(&storage_mgr),
            &config.log_file_name,
        )?);

        // Leaked once per SimpleDB instance: Transaction borrows BufferMgr for
        // 'a, and a stack-local BufferMgr cannot outlive with_config's frame.
        let buffer_mgr: &'a BufferMgr = Box::leak(Box::new(BufferMgr::with_timeout(
            Arc::clone(&storage_mgr),
            Arc::clone(&log_mgr),
            config.buffer_capacity,
            config.buffer_timeout,
        )));

        let lock_table = Arc::new(LockTable::with_timeout(
            config.lock_timeout.as_millis() as u64,
        ));

        Ok(Self {
            storage_mgr,
            log_mgr,
            buffer_mgr,
            lock_table,
        })
    }

    pub fn new<P: AsRef<Path>>(db_directory: P) -> DbResult<Self> {
        Self::with_config(Config::file(db_directory))
    }

    pub fn new_tx(&'a self) -> DbResult<Transaction<'a>> {
        Transaction::new(
            Arc::clone(&self.storage_mgr),
            Arc::clone(&self.log_mgr),
            self.buffer_mgr,
            Arc::clone(&self.lock_table),
        )
    }

    pub fn storage_mgr(&self) -> Arc<dyn StorageMgr> {
        Arc::clone(&self.storage_mgr)
    }

    pub fn log_mgr(&self) -> Arc<LogMgr> {
        Arc::clone(&self.log_mgr)
    }

    pub fn buffer_mgr(&self) -> &'a BufferMgr {
        self.buffer_mgr
    }

    pub fn lock_table(&self) -> Arc<LockTable> {
        Arc::clone(&self.lock_table)
    }
}
