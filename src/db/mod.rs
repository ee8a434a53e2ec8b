pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

const SCHEMA_VERSION: i32 = 1;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: one row per parsed tune. Column names follow the `music`
    /// table layout used by earlier exports.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tunes (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                book_number     TEXT NOT NULL DEFAULT '',
                tune_id         TEXT NOT NULL DEFAULT '',
                title           TEXT NOT NULL DEFAULT '',
                alt_title       TEXT NOT NULL DEFAULT '',
                tune_type       TEXT NOT NULL DEFAULT '',
                key_signature   TEXT NOT NULL DEFAULT '',
                notation        TEXT NOT NULL DEFAULT '',

                loaded_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_tunes_book ON tunes(book_number);
            CREATE INDEX IF NOT EXISTS idx_tunes_type ON tunes(tune_type);
            CREATE INDEX IF NOT EXISTS idx_tunes_key ON tunes(key_signature);
            ",
        )?;
        Ok(())
    }
}
