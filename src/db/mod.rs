// Database module
//
// The Store owns the shared connection behind one process-wide mutex. Every
// state-changing operation holds the mutex for its entire duration including
// transaction begin/commit; reads take a single-statement hold (rusqlite's
// Connection is not Sync, so readers share the same primitive). The
// most_recent flip and the successor insert always commit together.

pub mod migrations;
mod transition;

pub mod client;
pub mod episode;
pub mod history;
pub mod job;
pub mod movie;
pub mod quality;
pub mod season;
pub mod series;
pub mod stats;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};

use crate::constants::TIMESTAMP_FORMAT;
use crate::error::Result;

pub use transition::Transition;

/// Optional metadata carried on a state transition. Which fields are
/// persisted depends on the entity kind (download fields for media,
/// error for jobs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionMeta {
    pub download_client_id: Option<i64>,
    pub download_id: Option<String>,
    /// Quality tag of the grabbed release; copied onto the file row when
    /// the download completes.
    pub quality: Option<String>,
    pub is_entire_season_download: Option<bool>,
    pub error: Option<String>,
}

impl TransitionMeta {
    pub fn download(download_client_id: i64, download_id: &str) -> Self {
        Self {
            download_client_id: Some(download_client_id),
            download_id: Some(download_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: &str) -> Self {
        self.quality = Some(quality.to_string());
        self
    }
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create a database at the given path and bring it up to the
    /// current schema version.
    pub fn open(db_path: &Path) -> Result<Store> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        migrations::run_migrations(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    /// In-memory store, fully migrated. Used by tests and one-shot tooling.
    pub fn open_in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_migrations(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    /// Single-statement read scope.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Non-transactional single-statement write scope.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Transactional write scope. The mutex is held across begin/commit; a
    /// failed body rolls back before the error is returned.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => Err(e), // tx dropped here, which rolls back
        }
    }
}

/// Current local time in the store's timestamp format.
pub(crate) fn now_string() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
