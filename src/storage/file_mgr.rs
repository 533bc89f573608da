use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::DbResult;
use crate::storage::{BlockId, Page};

/// Abstraction over block-addressed storage. `FileMgr` is the on-disk
/// implementation the rest of the core runs against; `MemStorageMgr` is an
/// in-memory double used by tests that don't want to touch the filesystem.
/// Implementors must be safe to share across threads via `Arc`.
pub trait StorageMgr: Send + Sync {
    fn read(&self, blk: &BlockId, page: &mut Page) -> DbResult<()>;

    fn write(&self, blk: &BlockId, page: &Page) -> DbResult<()>;

    /// Appends a new zeroed block to the end of `filename` and returns its id.
    fn append(&self, filename: &str) -> DbResult<BlockId>;

    fn block_count(&self, filename: &str) -> DbResult<i32>;

    /// True if the database directory did not exist, or was empty, at startup.
    fn is_new(&self) -> bool;

    fn block_size(&self) -> usize;

    /// Number of block reads served since startup.
    fn read_count(&self) -> u64;

    /// Number of block writes (including appends) served since startup.
    fn write_count(&self) -> u64;
}

struct Inner {
    open_files: HashMap<String, File>,
    read_count: u64,
    write_count: u64,
}

/// Disk-backed `StorageMgr`. One OS file handle is kept open per logical
/// database file, in a table guarded by the same mutex as the read/write
/// counters, so every block operation is serialized with respect to both.
pub struct FileMgr {
    db_directory: PathBuf,
    block_size: usize,
    is_new: bool,
    inner: Mutex<Inner>,
}

impl FileMgr {
    pub fn new<P: AsRef<Path>>(db_directory: P, block_size: usize) -> DbResult<Self> {
        let db_path = db_directory.as_ref().to_path_buf();

        let is_new = if db_path.exists() {
            fs::read_dir(&db_path)?.next().is_none()
        } else {
            true
        };

        if !db_path.exists() {
            fs::create_dir_all(&db_path)?;
        }

        for entry in fs::read_dir(&db_path)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with("temp") {
                fs::remove_file(entry.path())?;
            }
        }

        debug!(dir = %db_path.display(), block_size, is_new, "file manager started");

        Ok(FileMgr {
            db_directory: db_path,
            block_size,
            is_new,
            inner: Mutex::new(Inner {
                open_files: HashMap::new(),
                read_count: 0,
                write_count: 0,
            }),
        })
    }

    fn open_file<'a>(
        open_files: &'a mut HashMap<String, File>,
        dir: &Path,
        filename: &str,
    ) -> io::Result<&'a mut File> {
        if !open_files.contains_key(filename) {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(dir.join(filename))?;
            open_files.insert(filename.to_string(), file);
        }
        Ok(open_files.get_mut(filename).unwrap())
    }
}

impl StorageMgr for FileMgr {
    fn read(&self, blk: &BlockId, page: &mut Page) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let file = Self::open_file(&mut inner.open_files, &self.db_directory, blk.filename())?;
        let pos = blk.number() as u64 * self.block_size as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(page.contents_mut())?;
        inner.read_count += 1;
        Ok(())
    }

    fn write(&self, blk: &BlockId, page: &Page) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let file = Self::open_file(&mut inner.open_files, &self.db_directory, blk.filename())?;
        let pos = blk.number() as u64 * self.block_size as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(page.contents())?;
        file.flush()?;
        inner.write_count += 1;
        Ok(())
    }

    fn append(&self, filename: &str) -> DbResult<BlockId> {
        let mut inner = self.inner.lock().unwrap();
        let new_block_num = {
            let file = Self::open_file(&mut inner.open_files, &self.db_directory, filename)?;
            (file.metadata()?.len() / self.block_size as u64) as i32
        };
        let blk = BlockId::new(filename.to_string(), new_block_num);

        let file = Self::open_file(&mut inner.open_files, &self.db_directory, filename)?;
        let pos = blk.number() as u64 * self.block_size as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(&vec![0u8; self.block_size])?;
        file.flush()?;
        inner.write_count += 1;

        Ok(blk)
    }

    fn block_count(&self, filename: &str) -> DbResult<i32> {
        let mut inner = self.inner.lock().unwrap();
        let file = Self::open_file(&mut inner.open_files, &self.db_directory, filename)?;
        Ok((file.metadata()?.len() / self.block_size as u64) as i32)
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_count(&self) -> u64 {
        self.inner.lock().unwrap().read_count
    }

    fn write_count(&self) -> u64 {
        self.inner.lock().unwrap().write_count
    }
}

struct MemInner {
    files: HashMap<String, Vec<Vec<u8>>>,
    read_count: u64,
    write_count: u64,
}

/// In-memory `StorageMgr`, used by tests that exercise `LogMgr`/`BufferMgr`
/// without touching a real filesystem.
pub struct MemStorageMgr {
    block_size: usize,
    inner: Mutex<MemInner>,
}

impl MemStorageMgr {
    pub fn new(block_size: usize) -> Self {
        MemStorageMgr {
            block_size,
            inner: Mutex::new(MemInner {
                files: HashMap::new(),
                read_count: 0,
                write_count: 0,
            }),
        }
    }
}

impl StorageMgr for MemStorageMgr {
    fn read(&self, blk: &BlockId, page: &mut Page) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let blocks = inner
            .files
            .get(blk.filename())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))?;
        let block_num = blk.number() as usize;
        let block = blocks
            .get(block_num)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "block out of range"))?;
        page.contents_mut().copy_from_slice(block);
        inner.read_count += 1;
        Ok(())
    }

    fn write(&self, blk: &BlockId, page: &Page) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let blocks = inner
            .files
            .get_mut(blk.filename())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))?;
        let block_num = blk.number() as usize;
        let block = blocks
            .get_mut(block_num)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "block out of range"))?;
        block.copy_from_slice(page.contents());
        inner.write_count += 1;
        Ok(())
    }

    fn append(&self, filename: &str) -> DbResult<BlockId> {
        let mut inner = self.inner.lock().unwrap();
        let block_size = self.block_size;
        let blocks = inner.files.entry(filename.to_string()).or_default();
        let new_block_num = blocks.len() as i32;
        blocks.push(vec![0u8; block_size]);
        inner.write_count += 1;
        Ok(BlockId::new(filename.to_string(), new_block_num))
    }

    fn block_count(&self, filename: &str) -> DbResult<i32> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.files.get(filename).map(|b| b.len() as i32).unwrap_or(0))
    }

    fn is_new(&self) -> bool {
        true
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_count(&self) -> u64 {
        self.inner.lock().unwrap().read_count
    }

    fn write_count(&self) -> u64 {
        self.inner.lock().unwrap().write_count
    }
}
