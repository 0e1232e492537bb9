// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.
//
// Applied versions are tracked in schema_migrations. Databases that predate
// the migration system are recognized by their existing catalog tables and
// stamped to version 1 without re-running the initial script. The runner is
// not transactional; individual scripts may open their own transactions.

use rusqlite::{params, Connection};

use super::now_string;
use crate::error::{MediarrError, Result};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in numeric order. Scripts are embedded at build time.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "000001_init",
        sql: include_str!("migrations/000001_init.up.sql"),
    },
    Migration {
        version: 2,
        name: "000002_quality_definition",
        sql: include_str!("migrations/000002_quality_definition.up.sql"),
    },
    Migration {
        version: 3,
        name: "000003_media_transition_download",
        sql: include_str!("migrations/000003_media_transition_download.up.sql"),
    },
    Migration {
        version: 4,
        name: "000004_season_episode_transition_download",
        sql: include_str!("migrations/000004_season_episode_transition_download.up.sql"),
    },
    Migration {
        version: 5,
        name: "000005_job_transition_error",
        sql: include_str!("migrations/000005_job_transition_error.up.sql"),
    },
    Migration {
        version: 6,
        name: "000006_indexer_source",
        sql: include_str!("migrations/000006_indexer_source.up.sql"),
    },
    Migration {
        version: 7,
        name: "000007_transition_indexes",
        sql: include_str!("migrations/000007_transition_indexes.up.sql"),
    },
    Migration {
        version: 8,
        name: "000008_quality_definition_media_type",
        sql: include_str!("migrations/000008_quality_definition_media_type.up.sql"),
    },
];

/// Schema version this build writes.
pub const HEAD_VERSION: i64 = 8;

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn current_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn record_applied(conn: &Connection, version: i64, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![version, name, now_string()],
    )?;
    Ok(())
}

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "schema_migrations")? {
        conn.execute_batch(
            "CREATE TABLE schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );",
        )?;

        // A catalog without tracking is a legacy v1 database. Stamp it so
        // the initial script never runs twice.
        if table_exists(conn, "quality_profile")? {
            record_applied(conn, MIGRATIONS[0].version, MIGRATIONS[0].name)?;
            log::info!("legacy database detected, baselined to schema version 1");
        }
    }

    let current = current_version(conn)?;

    // Refuse to open a DB written by a newer mediarr build
    if current > HEAD_VERSION {
        return Err(MediarrError::Migration(format!(
            "database schema version {} is newer than this build supports (max {})",
            current, HEAD_VERSION
        )));
    }

    if current == HEAD_VERSION {
        return Ok(());
    }

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch(migration.sql).map_err(|e| {
            MediarrError::Migration(format!("applying {}: {}", migration.name, e))
        })?;
        record_applied(conn, migration.version, migration.name)?;
        log::info!("applied migration {}", migration.name);
    }

    Ok(())
}
