use std::fmt;

use crate::error::DbResult;
use crate::storage::{BlockId, Page};
use crate::tx::transaction::Transaction;

use super::log_record::{LogRecord, SETSTRING};

/// Records the value a string slot held *before* a write, so that rolling
/// back can restore it.
pub struct SetStringRecord {
    tx_num: i32,
    offset: i32,
    val: String,
    blk: BlockId,
}

impl SetStringRecord {
    pub fn from_page(page: &Page) -> DbResult<Self> {
        let tx_num = page.get_int(4)?;
        let filename = page.get_string(8)?;
        let pos = 8 + Page::max_length(filename.len());
        let block_num = page.get_int(pos)?;
        let offset = page.get_int(pos + 4)?;
        let val = page.get_string(pos + 8)?;

        Ok(SetStringRecord {
            tx_num,
            offset,
            val,
            blk: BlockId::new(filename, block_num),
        })
    }

    pub fn create(tx_num: i32, blk: BlockId, offset: i32, val: String) -> Self {
        SetStringRecord {
            tx_num,
            offset,
            val,
            blk,
        }
    }

    pub fn len(&self) -> usize {
        8 + Page::max_length(self.blk.filename().len()) + 8 + Page::max_length(self.val.len())
    }

    pub fn write_to_page(&self, page: &mut Page) -> DbResult<()> {
        page.set_int(0, SETSTRING)?;
        page.set_int(4, self.tx_num)?;
        page.set_string(8, self.blk.filename())?;
        let pos = 8 + Page::max_length(self.blk.filename().len());
        page.set_int(pos, self.blk.number())?;
        page.set_int(pos + 4, self.offset)?;
        page.set_string(pos + 8, &self.val)
    }

    pub fn to_bytes(&self) -> DbResult<Vec<u8>> {
        let mut page = Page::new(self.len());
        self.write_to_page(&mut page)?;
        Ok(page.contents().to_vec())
    }
}

impl LogRecord for SetStringRecord {
    fn op(&self) -> i32 {
        SETSTRING
    }

    fn tx_number(&self) -> i32 {
        self.tx_num
    }

    fn undo(&self, tx: &mut Transaction) -> DbResult<()> {
        tx.pin(&self.blk)?;
        tx.set_string(&self.blk, self.offset as usize, self.val.clone(), false)?;
        tx.unpin(&self.blk);
        Ok(())
    }
}

impl fmt::Display for SetStringRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<SETSTRING {} {} {} {}>",
            self.tx_num, self.blk, self.offset, self.val
        )
    }
}
