// Series storage: series, series_metadata, series_transition.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::transition::{self, SERIES_LOG};
use super::{now_string, Store, Transition, TransitionMeta};
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::SeriesState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub path: String,
    pub state: SeriesState,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub series_metadata_id: Option<i64>,
    pub added: Option<String>,
    pub download_client_id: Option<i64>,
    pub download_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeries {
    /// 0 lets the store assign a key; a non-zero id upserts that row.
    pub id: i64,
    pub path: String,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub series_metadata_id: Option<i64>,
    pub added: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesFilter {
    pub state: Option<SeriesState>,
    pub monitored: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub first_air_date: Option<String>,
    pub season_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeriesMetadata {
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub first_air_date: Option<String>,
    pub season_count: i64,
}

const SERIES_SELECT: &str = "SELECT s.id, s.path, t.to_state, s.monitored, s.quality_profile_id,
        s.series_metadata_id, s.added, t.download_client_id, t.download_id,
        s.created_at, s.updated_at
 FROM series s
 JOIN series_transition t ON t.series_id = s.id AND t.most_recent = 1";

fn map_series(row: &rusqlite::Row) -> rusqlite::Result<Series> {
    let tag: String = row.get(2)?;
    let state = SeriesState::parse(&tag).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Series {
        id: row.get(0)?,
        path: row.get(1)?,
        state,
        monitored: row.get(3)?,
        quality_profile_id: row.get(4)?,
        series_metadata_id: row.get(5)?,
        added: row.get(6)?,
        download_client_id: row.get(7)?,
        download_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn insert_series(conn: &Connection, series: &NewSeries, state: &str) -> Result<i64> {
    let now = now_string();
    if series.id > 0 {
        conn.execute(
            "INSERT INTO series (id, path, state, monitored, quality_profile_id,
                                 series_metadata_id, added, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(id) DO UPDATE SET
                 path = excluded.path,
                 state = excluded.state,
                 monitored = excluded.monitored,
                 quality_profile_id = excluded.quality_profile_id,
                 series_metadata_id = excluded.series_metadata_id,
                 added = excluded.added,
                 updated_at = excluded.updated_at",
            params![
                series.id,
                series.path,
                state,
                series.monitored,
                series.quality_profile_id,
                series.series_metadata_id,
                series.added,
                now
            ],
        )?;
        Ok(series.id)
    } else {
        conn.execute(
            "INSERT INTO series (path, state, monitored, quality_profile_id,
                                 series_metadata_id, added, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                series.path,
                state,
                series.monitored,
                series.quality_profile_id,
                series.series_metadata_id,
                series.added,
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl Store {
    pub fn create_series(&self, series: &NewSeries, initial: SeriesState) -> Result<i64> {
        SeriesState::New.machine().can_transition(initial)?;
        self.with_tx(|tx| {
            let id = insert_series(tx, series, initial.as_str())?;
            transition::insert_seed(tx, &SERIES_LOG, id, initial.as_str())?;
            Ok(id)
        })
    }

    pub fn get_series(&self, id: i64) -> Result<Series> {
        self.read(|conn| {
            conn.query_row(&format!("{} WHERE s.id = ?1", SERIES_SELECT), params![id], map_series)
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("series {}", id)))
        })
    }

    pub fn get_series_by_path(&self, path: &str) -> Result<Series> {
        self.read(|conn| {
            conn.query_row(
                &format!("{} WHERE s.path = ?1", SERIES_SELECT),
                params![path],
                map_series,
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("series at {}", path)))
        })
    }

    /// Series matching every given filter, ordered by metadata title.
    pub fn list_series(
        &self,
        filter: &SeriesFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Series>> {
        let mut sql = format!(
            "{} LEFT JOIN series_metadata md ON md.id = s.series_metadata_id WHERE 1=1",
            SERIES_SELECT
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(state) = filter.state {
            args.push(Box::new(state.as_str().to_string()));
            sql.push_str(&format!(" AND t.to_state = ?{}", args.len()));
        }
        if let Some(monitored) = filter.monitored {
            args.push(Box::new(monitored));
            sql.push_str(&format!(" AND s.monitored = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY md.title ASC");
        args.push(Box::new(limit.unwrap_or(-1)));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));
        args.push(Box::new(offset.unwrap_or(0)));
        sql.push_str(&format!(" OFFSET ?{}", args.len()));

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let series = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), map_series)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(series)
        })
    }

    pub fn update_series_state(
        &self,
        id: i64,
        to: SeriesState,
        meta: Option<&TransitionMeta>,
    ) -> Result<()> {
        let current = self.get_series(id)?;
        current.state.machine().can_transition(to)?;
        self.with_tx(|tx| {
            transition::advance(tx, &SERIES_LOG, id, to.as_str(), meta, |prior| {
                SeriesState::parse(prior)?.machine().can_transition(to)
            })?;
            tx.execute(
                "UPDATE series SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![to.as_str(), now_string(), id],
            )?;
            Ok(())
        })
    }

    pub fn update_series_quality_profile(&self, id: i64, quality_profile_id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE series SET quality_profile_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![quality_profile_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("series {}", id)));
            }
            Ok(())
        })
    }

    pub fn link_series_metadata(&self, id: i64, series_metadata_id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE series SET series_metadata_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![series_metadata_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("series {}", id)));
            }
            Ok(())
        })
    }

    /// Hard delete; cascades through seasons and episodes and their logs.
    pub fn delete_series(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM series WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("series {}", id)));
            }
            Ok(())
        })
    }

    pub fn series_transitions(&self, id: i64) -> Result<Vec<Transition>> {
        self.read(|conn| transition::list(conn, &SERIES_LOG, id))
    }

    // ----- series_metadata -----

    pub fn upsert_series_metadata(&self, meta: &NewSeriesMetadata) -> Result<i64> {
        self.write(|conn| {
            let id = conn.query_row(
                "INSERT INTO series_metadata
                     (tmdb_id, title, overview, poster_path, first_air_date, season_count,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(tmdb_id) DO UPDATE SET
                     title = excluded.title,
                     overview = excluded.overview,
                     poster_path = excluded.poster_path,
                     first_air_date = excluded.first_air_date,
                     season_count = excluded.season_count,
                     updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    meta.tmdb_id,
                    meta.title,
                    meta.overview,
                    meta.poster_path,
                    meta.first_air_date,
                    meta.season_count,
                    now_string()
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_series_metadata(&self, id: i64) -> Result<SeriesMetadata> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, tmdb_id, title, overview, poster_path, first_air_date, season_count,
                        created_at, updated_at
                 FROM series_metadata WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SeriesMetadata {
                        id: row.get(0)?,
                        tmdb_id: row.get(1)?,
                        title: row.get(2)?,
                        overview: row.get(3)?,
                        poster_path: row.get(4)?,
                        first_air_date: row.get(5)?,
                        season_count: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("series metadata {}", id)))
        })
    }
}
