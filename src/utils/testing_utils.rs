use std::ops::Deref;

use tempfile::TempDir;

use crate::{server::Config, DbResult, SimpleDB};

const TEST_PAGE_SIZE: usize = 400;

/// Bundles a `SimpleDB` with the `TempDir` backing its storage. The
/// directory must outlive the database, so `db` is dropped first.
pub struct TempSimpleDB<'a> {
    db: Option<SimpleDB<'a>>,
    _dir: TempDir,
}

impl<'a> Deref for TempSimpleDB<'a> {
    type Target = SimpleDB<'a>;

    fn deref(&self) -> &Self::Target {
        self.db.as_ref().unwrap()
    }
}

impl<'a> Drop for TempSimpleDB<'a> {
    fn drop(&mut self) {
        self.db.take();
    }
}

pub fn temp_db<'a>() -> DbResult<TempSimpleDB<'a>> {
    temp_db_with_cfg(|cfg| cfg)
}

pub fn temp_db_with_cfg<'a>(
    mut cfg_updater: impl FnMut(Config) -> Config,
) -> DbResult<TempSimpleDB<'a>> {
    let temp_dir = TempDir::new().unwrap();
    let mut cfg = Config::file(temp_dir.path());
    cfg = cfg.block_size(TEST_PAGE_SIZE);
    cfg = cfg_updater(cfg);

    let db = SimpleDB::with_config(cfg)?;
    Ok(TempSimpleDB {
        db: Some(db),
        _dir: temp_dir,
    })
}
