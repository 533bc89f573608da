use std::env;

use storagecore::error::DbResult;
use storagecore::server::Config;
use storagecore::SimpleDB;

fn main() -> DbResult<()> {
    tracing_subscriber::fmt::init();

    let db_dir = env::args().nth(1).unwrap_or_else(|| "./simpledb_data".to_string());
    let db = SimpleDB::with_config(Config::file(&db_dir).buffer_capacity(8))?;

    let mut tx = db.new_tx()?;
    let block_count_before = tx.size("demo")?;
    let blk = tx.append("demo")?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 0, block_count_before + 1, true)?;
    tx.commit()?;

    println!("opened database at {}", db_dir);
    println!("file \"demo\" now has {} block(s)", block_count_before + 1);
    println!("available buffers: {}", db.buffer_mgr().available());

    Ok(())
}
