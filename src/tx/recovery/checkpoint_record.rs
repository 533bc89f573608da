use std::fmt;

use crate::error::DbResult;
use crate::storage::Page;
use crate::tx::transaction::Transaction;

use super::log_record::{LogRecord, CHECKPOINT};

/// Marks a point in the log before which no active transaction's records
/// need to be examined during recovery. Carries no payload beyond its op
/// code.
pub struct CheckpointRecord;

impl CheckpointRecord {
    pub fn new() -> Self {
        CheckpointRecord
    }

    pub fn len(&self) -> usize {
        4
    }

    pub fn write_to_page(&self, page: &mut Page) -> DbResult<()> {
        page.set_int(0, CHECKPOINT)
    }

    pub fn to_bytes(&self) -> DbResult<Vec<u8>> {
        let mut page = Page::new(self.len());
        self.write_to_page(&mut page)?;
        Ok(page.contents().to_vec())
    }
}

impl LogRecord for CheckpointRecord {
    fn op(&self) -> i32 {
        CHECKPOINT
    }

    fn tx_number(&self) -> i32 {
        -1
    }

    fn undo(&self, _tx: &mut Transaction) -> DbResult<()> {
        Ok(())
    }
}

impl fmt::Display for CheckpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<CHECKPOINT>")
    }
}
