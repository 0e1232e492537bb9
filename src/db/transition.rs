// Append-only transition logs.
//
// The five stateful entity kinds share one log shape: entity reference,
// optional from_state, to_state, a unique most_recent flag, and a contiguous
// sort_key starting at 1. This module parameterizes the SQL over the table
// and column names so each entity module works with the same helpers.
// Identifier fragments come from the LogSpec constants below, never from
// callers.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{now_string, TransitionMeta};
use crate::error::{MediarrError, Result};

/// Columns a log table carries beyond the common shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogMeta {
    /// download_client_id / download_id (movie, series)
    Download,
    /// download columns plus is_entire_season_download (season, episode)
    DownloadWithSeasonFlag,
    /// error string (job)
    Error,
}

/// Per-kind log table description.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogSpec {
    pub table: &'static str,
    pub fk: &'static str,
    pub meta: LogMeta,
}

pub(crate) const MOVIE_LOG: LogSpec = LogSpec {
    table: "movie_transition",
    fk: "movie_id",
    meta: LogMeta::Download,
};

pub(crate) const SERIES_LOG: LogSpec = LogSpec {
    table: "series_transition",
    fk: "series_id",
    meta: LogMeta::Download,
};

pub(crate) const SEASON_LOG: LogSpec = LogSpec {
    table: "season_transition",
    fk: "season_id",
    meta: LogMeta::DownloadWithSeasonFlag,
};

pub(crate) const EPISODE_LOG: LogSpec = LogSpec {
    table: "episode_transition",
    fk: "episode_id",
    meta: LogMeta::DownloadWithSeasonFlag,
};

pub(crate) const JOB_LOG: LogSpec = LogSpec {
    table: "job_transition",
    fk: "job_id",
    meta: LogMeta::Error,
};

/// One row of a transition log, in the common shape. Fields a given kind
/// does not persist are None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: i64,
    pub entity_id: i64,
    pub from_state: Option<String>,
    pub to_state: String,
    pub most_recent: bool,
    pub sort_key: i64,
    pub download_client_id: Option<i64>,
    pub download_id: Option<String>,
    pub quality: Option<String>,
    pub is_entire_season_download: Option<bool>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn select_columns(spec: &LogSpec) -> String {
    let (dc, di, quality, flag, err) = match spec.meta {
        LogMeta::Download => ("download_client_id", "download_id", "quality", "NULL", "NULL"),
        LogMeta::DownloadWithSeasonFlag => (
            "download_client_id",
            "download_id",
            "quality",
            "is_entire_season_download",
            "NULL",
        ),
        LogMeta::Error => ("NULL", "NULL", "NULL", "NULL", "error"),
    };
    format!(
        "id, {fk}, from_state, to_state, most_recent, sort_key, {dc}, {di}, {quality}, {flag}, {err}, created_at, updated_at",
        fk = spec.fk,
        dc = dc,
        di = di,
        quality = quality,
        flag = flag,
        err = err,
    )
}

fn map_transition(row: &rusqlite::Row) -> rusqlite::Result<Transition> {
    Ok(Transition {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        from_state: row.get(2)?,
        to_state: row.get(3)?,
        most_recent: row.get(4)?,
        sort_key: row.get(5)?,
        download_client_id: row.get(6)?,
        download_id: row.get(7)?,
        quality: row.get(8)?,
        is_entire_season_download: row.get(9)?,
        error: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Insert the seed row for a freshly created entity: most_recent=1, no
/// from_state, sort_key continuing from any prior log (1 for a new entity,
/// which is the only case outside a re-create over an explicit id).
pub(crate) fn insert_seed(
    conn: &Connection,
    spec: &LogSpec,
    entity_id: i64,
    to_state: &str,
) -> Result<()> {
    let now = now_string();
    conn.execute(
        &format!(
            "UPDATE {table} SET most_recent = 0, updated_at = ?1 WHERE {fk} = ?2 AND most_recent = 1",
            table = spec.table,
            fk = spec.fk,
        ),
        params![now, entity_id],
    )?;
    conn.execute(
        &format!(
            "INSERT INTO {table} ({fk}, from_state, to_state, most_recent, sort_key, created_at, updated_at)
             VALUES (?1, NULL, ?2, 1,
                     COALESCE((SELECT MAX(sort_key) FROM {table} WHERE {fk} = ?1), 0) + 1,
                     ?3, ?3)",
            table = spec.table,
            fk = spec.fk,
        ),
        params![entity_id, to_state, now],
    )?;
    Ok(())
}

/// Flip the prior most_recent row, re-validate through `validate` (which
/// sees the prior to_state as committed), then insert the successor with
/// sort_key + 1. Runs inside the caller's transaction; a validation failure
/// propagates and rolls the flip back.
pub(crate) fn advance(
    conn: &Connection,
    spec: &LogSpec,
    entity_id: i64,
    to_state: &str,
    meta: Option<&TransitionMeta>,
    validate: impl FnOnce(&str) -> Result<()>,
) -> Result<()> {
    let now = now_string();
    let prior: Option<(i64, String)> = conn
        .query_row(
            &format!(
                "UPDATE {table} SET most_recent = 0, updated_at = ?1
                 WHERE {fk} = ?2 AND most_recent = 1
                 RETURNING sort_key, to_state",
                table = spec.table,
                fk = spec.fk,
            ),
            params![now, entity_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (prior_sort, prior_state) = prior.ok_or_else(|| {
        MediarrError::Other(format!(
            "{}: no most_recent row for {} {}",
            spec.table, spec.fk, entity_id
        ))
    })?;

    validate(&prior_state)?;

    let meta = meta.cloned().unwrap_or_default();
    let sort_key = prior_sort + 1;
    match spec.meta {
        LogMeta::Download => {
            conn.execute(
                &format!(
                    "INSERT INTO {table}
                         ({fk}, from_state, to_state, most_recent, sort_key,
                          download_client_id, download_id, quality, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?8)",
                    table = spec.table,
                    fk = spec.fk,
                ),
                params![
                    entity_id,
                    prior_state,
                    to_state,
                    sort_key,
                    meta.download_client_id,
                    meta.download_id,
                    meta.quality,
                    now
                ],
            )?;
        }
        LogMeta::DownloadWithSeasonFlag => {
            conn.execute(
                &format!(
                    "INSERT INTO {table}
                         ({fk}, from_state, to_state, most_recent, sort_key,
                          download_client_id, download_id, quality,
                          is_entire_season_download, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                    table = spec.table,
                    fk = spec.fk,
                ),
                params![
                    entity_id,
                    prior_state,
                    to_state,
                    sort_key,
                    meta.download_client_id,
                    meta.download_id,
                    meta.quality,
                    meta.is_entire_season_download.unwrap_or(false),
                    now
                ],
            )?;
        }
        LogMeta::Error => {
            conn.execute(
                &format!(
                    "INSERT INTO {table}
                         ({fk}, from_state, to_state, most_recent, sort_key, error,
                          created_at, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?6)",
                    table = spec.table,
                    fk = spec.fk,
                ),
                params![entity_id, prior_state, to_state, sort_key, meta.error, now],
            )?;
        }
    }
    Ok(())
}

/// Full ordered history for one entity, oldest first.
pub(crate) fn list(conn: &Connection, spec: &LogSpec, entity_id: i64) -> Result<Vec<Transition>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {cols} FROM {table} WHERE {fk} = ?1 ORDER BY sort_key ASC",
        cols = select_columns(spec),
        table = spec.table,
        fk = spec.fk,
    ))?;
    let rows = stmt
        .query_map(params![entity_id], map_transition)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
