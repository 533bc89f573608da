use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::error::{DbError, DbResult};
use crate::log::LogMgr;
use crate::storage::BlockId;
use crate::storage::StorageMgr;

const DEFAULT_BUFFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Manages the buffer pool, which consists of a collection of Buffer objects.
/// It employs interior mutability and is thread-safe: `pin`/`unpin` only
/// need `&self`, with a `Mutex` guarding the pin-count bookkeeping and a
/// `Condvar` to wake waiters when a buffer frees up.
pub struct BufferMgr {
    inner: Mutex<BufferMgrInner>,
    buffers: Box<[RwLock<Buffer>]>,
    condvar: Condvar,
    buffer_timeout: Duration,
}

struct BufferMgrInner {
    pins: Box<[usize]>,
    available_cnt: usize,
    block_to_buffer_idx: HashMap<BlockId, usize>,
    /// Set once a buffer flush raises `FatalIo`. After that the WAL may
    /// describe a page write the disk never received, so this buffer
    /// manager refuses every further operation rather than risk masking
    /// the inconsistency.
    poisoned: Option<String>,
}

pub struct PinnedBufferGuard<'a> {
    buffer_mgr: &'a BufferMgr,
    buffer: &'a RwLock<Buffer>,
    idx: usize,
}

impl<'a> std::fmt::Debug for PinnedBufferGuard<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedBufferGuard")
            .field("idx", &self.idx)
            .finish()
    }
}

impl BufferMgr {
    pub fn new(storage_mgr: Arc<dyn StorageMgr>, log_mgr: Arc<LogMgr>, buffer_cnt: usize) -> Self {
        Self::with_timeout(storage_mgr, log_mgr, buffer_cnt, DEFAULT_BUFFER_TIMEOUT)
    }

    pub fn with_timeout(
        storage_mgr: Arc<dyn StorageMgr>,
        log_mgr: Arc<LogMgr>,
        buffer_cnt: usize,
        buffer_timeout: Duration,
    ) -> Self {
        let mut buffers = Vec::with_capacity(buffer_cnt);
        for _ in 0..buffer_cnt {
            buffers.push(RwLock::new(Buffer::new(
                Arc::clone(&storage_mgr),
                Arc::clone(&log_mgr),
            )));
        }

        BufferMgr {
            inner: Mutex::new(BufferMgrInner {
                pins: vec![0; buffer_cnt].into_boxed_slice(),
                available_cnt: buffer_cnt,
                block_to_buffer_idx: HashMap::new(),
                poisoned: None,
            }),
            buffers: buffers.into_boxed_slice(),
            condvar: Condvar::new(),
            buffer_timeout,
        }
    }

    pub fn available(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.available_cnt
    }

    pub fn flush_all(&self, txnum: i32) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        self.check_poisoned(&inner)?;

        for buffer in self.buffers.iter() {
            let mut buffer = buffer.write().unwrap();
            if buffer.modifying_tx() == txnum {
                if let Err(e) = buffer.flush() {
                    return Err(self.poison(&mut inner, e));
                }
            }
        }
        Ok(())
    }

    fn check_poisoned(&self, inner: &BufferMgrInner) -> DbResult<()> {
        match &inner.poisoned {
            Some(msg) => Err(DbError::FatalIo(msg.clone())),
            None => Ok(()),
        }
    }

    /// Records `err` as the poisoning failure if it is fatal, and returns
    /// it unchanged either way.
    fn poison(&self, inner: &mut BufferMgrInner, err: DbError) -> DbError {
        if let DbError::FatalIo(msg) = &err {
            debug!(error = %msg, "buffer manager poisoned by fatal flush failure");
            inner.poisoned = Some(msg.clone());
        }
        err
    }

    /// Pins the block to a buffer.
    /// If the block is already in a buffer, that buffer is used.
    /// Otherwise, an unpinned buffer is chosen.
    pub fn pin<'a>(&'a self, blk: &BlockId) -> DbResult<PinnedBufferGuard<'a>> {
        let start_time = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        self.check_poisoned(&inner)?;
        let mut pinned_buff_id = self.try_to_pin(&mut inner, blk)?;

        while pinned_buff_id.is_none() && start_time.elapsed() < self.buffer_timeout {
            inner = self
                .condvar
                .wait_timeout(inner, self.buffer_timeout)
                .unwrap()
                .0;
            pinned_buff_id = self.try_to_pin(&mut inner, blk)?;
        }

        if let Some(idx) = pinned_buff_id {
            Ok(PinnedBufferGuard {
                buffer_mgr: self,
                buffer: &self.buffers[idx],
                idx,
            })
        } else {
            trace!(block = %blk, timeout = ?self.buffer_timeout, "buffer pin timed out");
            Err(DbError::BufferAbort)
        }
    }

    fn try_to_pin(&self, inner: &mut BufferMgrInner, blk: &BlockId) -> DbResult<Option<usize>> {
        if let Some(&idx) = inner.block_to_buffer_idx.get(blk) {
            if inner.pins[idx] == 0 {
                inner.available_cnt -= 1;
            }
            inner.pins[idx] += 1;
            return Ok(Some(idx));
        }

        if let Some(idx) = self.find_unpinned_buffer(inner) {
            inner.block_to_buffer_idx.insert(blk.clone(), idx);
            inner.pins[idx] = 1;
            inner.available_cnt -= 1;

            let mut buffer = self.buffers[idx].write().unwrap();
            if let Some(block) = buffer.block() {
                inner.block_to_buffer_idx.remove(&block);
            }
            if let Err(e) = buffer.assign_to_block(blk.clone()) {
                return Err(self.poison(inner, e));
            }

            return Ok(Some(idx));
        }

        Ok(None)
    }

    fn find_unpinned_buffer(&self, inner: &BufferMgrInner) -> Option<usize> {
        // TODO O(N)
        for (i, &pin_cnt) in inner.pins.iter().enumerate() {
            if pin_cnt == 0 {
                return Some(i);
            }
        }
        None
    }

    fn unpin_internal(&self, idx: usize) {
        let mut inner = self.inner.lock().unwrap();

        inner.pins[idx] -= 1;

        if inner.pins[idx] == 0 {
            inner.available_cnt += 1;
            self.condvar.notify_all();
        }
    }
}

impl<'a> PinnedBufferGuard<'a> {
    pub fn borrow_mut(&self) -> RwLockWriteGuard<'a, Buffer> {
        self.buffer.write().unwrap()
    }

    pub fn borrow(&self) -> RwLockReadGuard<'a, Buffer> {
        self.buffer.read().unwrap()
    }
}

impl<'a> Drop for PinnedBufferGuard<'a> {
    fn drop(&mut self) {
        self.buffer_mgr.unpin_internal(self.idx);
    }
}
