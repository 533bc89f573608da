pub mod testing_utils;

pub use testing_utils::{temp_db, temp_db_with_cfg, TempSimpleDB};
