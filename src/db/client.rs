// Indexers, indexer sources, and download clients.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{now_string, Store};
use crate::error::{MediarrError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indexer {
    pub id: i64,
    pub name: String,
    pub uri: String,
    pub api_key: Option<String>,
    pub priority: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewIndexer {
    pub name: String,
    pub uri: String,
    pub api_key: Option<String>,
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSource {
    pub id: i64,
    pub indexer_id: i64,
    pub name: String,
    pub media_type: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadClientRow {
    pub id: i64,
    pub name: String,
    pub implementation: String,
    pub scheme: String,
    pub host: String,
    pub port: i64,
    pub api_key: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewDownloadClient {
    pub name: String,
    pub implementation: String,
    pub scheme: String,
    pub host: String,
    pub port: i64,
    pub api_key: Option<String>,
}

fn map_indexer(row: &rusqlite::Row) -> rusqlite::Result<Indexer> {
    Ok(Indexer {
        id: row.get(0)?,
        name: row.get(1)?,
        uri: row.get(2)?,
        api_key: row.get(3)?,
        priority: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_download_client(row: &rusqlite::Row) -> rusqlite::Result<DownloadClientRow> {
    Ok(DownloadClientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        implementation: row.get(2)?,
        scheme: row.get(3)?,
        host: row.get(4)?,
        port: row.get(5)?,
        api_key: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Store {
    // ----- indexer -----

    pub fn create_indexer(&self, indexer: &NewIndexer) -> Result<i64> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO indexer (name, uri, api_key, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![indexer.name, indexer.uri, indexer.api_key, indexer.priority, now_string()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_indexer(&self, id: i64) -> Result<Indexer> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, name, uri, api_key, priority, created_at FROM indexer WHERE id = ?1",
                params![id],
                map_indexer,
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("indexer {}", id)))
        })
    }

    /// Indexers, highest priority first.
    pub fn list_indexers(&self) -> Result<Vec<Indexer>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, uri, api_key, priority, created_at
                 FROM indexer ORDER BY priority DESC, id ASC",
            )?;
            let indexers = stmt
                .query_map([], map_indexer)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(indexers)
        })
    }

    pub fn delete_indexer(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM indexer WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("indexer {}", id)));
            }
            Ok(())
        })
    }

    // ----- indexer_source -----

    pub fn create_indexer_source(&self, indexer_id: i64, name: &str, media_type: &str) -> Result<i64> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO indexer_source (indexer_id, name, media_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![indexer_id, name, media_type, now_string()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_indexer_sources(&self, indexer_id: i64) -> Result<Vec<IndexerSource>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, indexer_id, name, media_type, created_at
                 FROM indexer_source WHERE indexer_id = ?1 ORDER BY id ASC",
            )?;
            let sources = stmt
                .query_map(params![indexer_id], |row| {
                    Ok(IndexerSource {
                        id: row.get(0)?,
                        indexer_id: row.get(1)?,
                        name: row.get(2)?,
                        media_type: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(sources)
        })
    }

    pub fn delete_indexer_source(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM indexer_source WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("indexer source {}", id)));
            }
            Ok(())
        })
    }

    // ----- download_client -----

    pub fn create_download_client(&self, client: &NewDownloadClient) -> Result<i64> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO download_client (name, implementation, scheme, host, port, api_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    client.name,
                    client.implementation,
                    client.scheme,
                    client.host,
                    client.port,
                    client.api_key,
                    now_string()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_download_client(&self, id: i64) -> Result<DownloadClientRow> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, name, implementation, scheme, host, port, api_key, created_at
                 FROM download_client WHERE id = ?1",
                params![id],
                map_download_client,
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("download client {}", id)))
        })
    }

    pub fn list_download_clients(&self) -> Result<Vec<DownloadClientRow>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, implementation, scheme, host, port, api_key, created_at
                 FROM download_client ORDER BY id ASC",
            )?;
            let clients = stmt
                .query_map([], map_download_client)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(clients)
        })
    }

    pub fn delete_download_client(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM download_client WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("download client {}", id)));
            }
            Ok(())
        })
    }
}
