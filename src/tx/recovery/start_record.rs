use std::fmt;

use crate::error::DbResult;
use crate::storage::Page;
use crate::tx::transaction::Transaction;

use super::log_record::{LogRecord, START};

/// Marks the beginning of a transaction in the log.
pub struct StartRecord {
    tx_num: i32,
}

impl StartRecord {
    pub fn from_page(page: &Page) -> DbResult<Self> {
        Ok(StartRecord {
            tx_num: page.get_int(4)?,
        })
    }

    pub fn create(tx_num: i32) -> Self {
        StartRecord { tx_num }
    }

    pub fn len(&self) -> usize {
        8
    }

    pub fn write_to_page(&self, page: &mut Page) -> DbResult<()> {
        page.set_int(0, START)?;
        page.set_int(4, self.tx_num)
    }

    pub fn to_bytes(&self) -> DbResult<Vec<u8>> {
        let mut page = Page::new(self.len());
        self.write_to_page(&mut page)?;
        Ok(page.contents().to_vec())
    }
}

impl LogRecord for StartRecord {
    fn op(&self) -> i32 {
        START
    }

    fn tx_number(&self) -> i32 {
        self.tx_num
    }

    fn undo(&self, _tx: &mut Transaction) -> DbResult<()> {
        Ok(())
    }
}

impl fmt::Display for StartRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<START {}>", self.tx_num)
    }
}
