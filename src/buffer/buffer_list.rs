use crate::error::DbResult;
use crate::storage::BlockId;
use std::collections::HashMap;

use super::{BufferMgr, PinnedBufferGuard};

// TODO currently this class duplicates BufferMgr functionality
pub struct BufferList<'a> {
    buffers: HashMap<BlockId, PinnedBufferGuard<'a>>,
    pins: HashMap<BlockId, usize>,
    buffer_mgr: &'a BufferMgr,
}

impl<'a> BufferList<'a> {
    pub fn new(buffer_mgr: &'a BufferMgr) -> Self {
        BufferList {
            buffers: HashMap::new(),
            pins: HashMap::new(),
            buffer_mgr,
        }
    }

    // That's not so convinient but we keep it close to original implementation
    pub fn get_buffer(&self, blk: &BlockId) -> Option<&PinnedBufferGuard<'a>> {
        self.buffers.get(blk)
    }

    pub fn pin(&mut self, blk: &BlockId) -> DbResult<()> {
        if let Some(count) = self.pins.get_mut(&blk) {
            *count += 1;
            return Ok(());
        }
        let guard = self.buffer_mgr.pin(&blk)?;
        self.buffers.insert(blk.clone(), guard);
        self.pins.insert(blk.clone(), 1);
        Ok(())
    }

    pub fn unpin(&mut self, blk: &BlockId) {
        if let Some(count) = self.pins.get_mut(blk) {
            *count -= 1;
            if *count == 0 {
                if let Some(guard) = self.buffers.remove(blk) {
                    drop(guard);
                }
                self.pins.remove(blk);
            }
        }
    }

    pub fn unpin_all(&mut self) {
        self.buffers.clear();
        self.pins.clear();
    }
}

impl<'a> Drop for BufferList<'a> {
    fn drop(&mut self) {
        self.unpin_all();
    }
}
