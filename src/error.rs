use thiserror::Error;

/// Error taxonomy for the storage core. Every fallible operation in
/// `storage`, `log`, `buffer`, and `tx` returns one of these instead of
/// panicking or aborting the process; the one exception is a poisoned
/// mutex, which indicates a prior panic on another thread and is left to
/// propagate same as the rest of the ecosystem.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset {offset} + {len} exceeds block size {block_size}")]
    OffsetOutOfRange {
        offset: usize,
        len: usize,
        block_size: usize,
    },

    #[error("lock not granted within timeout")]
    LockAbort,

    #[error("no buffer became available within timeout")]
    BufferAbort,

    #[error("unknown log record op code: {0}")]
    UnknownOpCode(i32),

    #[error("log record payload too short to contain an op code")]
    InvalidLogRecord,

    #[error("fatal I/O failure while flushing a buffer: {0}")]
    FatalIo(String),

    #[error("no buffer is currently pinned for block {0:?}")]
    BufferNotFound(crate::storage::BlockId),
}

pub type DbResult<T> = std::result::Result<T, DbError>;
