use std::fmt;

use crate::error::{DbError, DbResult};
use crate::storage::Page;
use crate::tx::transaction::Transaction;

use super::checkpoint_record::CheckpointRecord;
use super::commit_record::CommitRecord;
use super::rollback_record::RollbackRecord;
use super::set_int_record::SetIntRecord;
use super::set_string_record::SetStringRecord;
use super::start_record::StartRecord;

pub const CHECKPOINT: i32 = 0;
pub const START: i32 = 1;
pub const COMMIT: i32 = 2;
pub const ROLLBACK: i32 = 3;
pub const SETINT: i32 = 4;
pub const SETSTRING: i32 = 5;

/// A decoded entry from the write-ahead log. Every variant knows its own
/// wire encoding (`write_to_page`/`to_bytes`) and how to undo itself
/// against a live transaction during rollback.
pub trait LogRecord: Send + Sync + fmt::Display {
    fn op(&self) -> i32;

    fn tx_number(&self) -> i32;

    /// Undoes the operation this record describes, against `tx`. Called
    /// only while rolling a transaction back, in newest-to-oldest order.
    fn undo(&self, tx: &mut Transaction) -> DbResult<()>;
}

/// Decodes the op code at the front of `bytes` (big-endian, matching
/// `Page`'s integer codec) and builds the matching `LogRecord`.
pub fn create_log_record(bytes: &[u8]) -> DbResult<Box<dyn LogRecord>> {
    if bytes.len() < 4 {
        return Err(DbError::InvalidLogRecord);
    }
    let page = Page::from_slice(bytes);
    let op = page.get_int(0)?;

    Ok(match op {
        CHECKPOINT => Box::new(CheckpointRecord::new()),
        START => Box::new(StartRecord::from_page(&page)?),
        COMMIT => Box::new(CommitRecord::from_page(&page)?),
        ROLLBACK => Box::new(RollbackRecord::from_page(&page)?),
        SETINT => Box::new(SetIntRecord::from_page(&page)?),
        SETSTRING => Box::new(SetStringRecord::from_page(&page)?),
        other => return Err(DbError::UnknownOpCode(other)),
    })
}
