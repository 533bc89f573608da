use std::fmt;

use crate::error::DbResult;
use crate::storage::Page;
use crate::tx::transaction::Transaction;

use super::log_record::{LogRecord, COMMIT};

/// Marks that a transaction's changes are durable.
pub struct CommitRecord {
    tx_num: i32,
}

impl CommitRecord {
    pub fn from_page(page: &Page) -> DbResult<Self> {
        Ok(CommitRecord {
            tx_num: page.get_int(4)?,
        })
    }

    pub fn create(tx_num: i32) -> Self {
        CommitRecord { tx_num }
    }

    pub fn len(&self) -> usize {
        8
    }

    pub fn write_to_page(&self, page: &mut Page) -> DbResult<()> {
        page.set_int(0, COMMIT)?;
        page.set_int(4, self.tx_num)
    }

    pub fn to_bytes(&self) -> DbResult<Vec<u8>> {
        let mut page = Page::new(self.len());
        self.write_to_page(&mut page)?;
        Ok(page.contents().to_vec())
    }
}

impl LogRecord for CommitRecord {
    fn op(&self) -> i32 {
        COMMIT
    }

    fn tx_number(&self) -> i32 {
        self.tx_num
    }

    fn undo(&self, _tx: &mut Transaction) -> DbResult<()> {
        Ok(())
    }
}

impl fmt::Display for CommitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<COMMIT {}>", self.tx_num)
    }
}
