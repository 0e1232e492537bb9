// Season storage: season, season_metadata, season_transition.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::transition::{self, SEASON_LOG};
use super::{now_string, Store, Transition, TransitionMeta};
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::SeasonState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub series_id: i64,
    pub season_number: i64,
    pub state: SeasonState,
    pub monitored: bool,
    pub season_metadata_id: Option<i64>,
    pub download_client_id: Option<i64>,
    pub download_id: Option<String>,
    pub is_entire_season_download: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeason {
    /// 0 lets the store assign a key; a non-zero id upserts that row.
    pub id: i64,
    pub series_id: i64,
    pub season_number: i64,
    pub monitored: bool,
    pub season_metadata_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonMetadata {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
    pub episode_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeasonMetadata {
    pub tmdb_id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
    pub episode_count: i64,
}

const SEASON_SELECT: &str = "SELECT s.id, s.series_id, s.season_number, t.to_state, s.monitored,
        s.season_metadata_id, t.download_client_id, t.download_id,
        t.is_entire_season_download, s.created_at, s.updated_at
 FROM season s
 JOIN season_transition t ON t.season_id = s.id AND t.most_recent = 1";

fn map_season(row: &rusqlite::Row) -> rusqlite::Result<Season> {
    let tag: String = row.get(3)?;
    let state = SeasonState::parse(&tag).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Season {
        id: row.get(0)?,
        series_id: row.get(1)?,
        season_number: row.get(2)?,
        state,
        monitored: row.get(4)?,
        season_metadata_id: row.get(5)?,
        download_client_id: row.get(6)?,
        download_id: row.get(7)?,
        is_entire_season_download: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn insert_season(conn: &Connection, season: &NewSeason, state: &str) -> Result<i64> {
    let now = now_string();
    if season.id > 0 {
        conn.execute(
            "INSERT INTO season (id, series_id, season_number, state, monitored,
                                 season_metadata_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 series_id = excluded.series_id,
                 season_number = excluded.season_number,
                 state = excluded.state,
                 monitored = excluded.monitored,
                 season_metadata_id = excluded.season_metadata_id,
                 updated_at = excluded.updated_at",
            params![
                season.id,
                season.series_id,
                season.season_number,
                state,
                season.monitored,
                season.season_metadata_id,
                now
            ],
        )?;
        Ok(season.id)
    } else {
        conn.execute(
            "INSERT INTO season (series_id, season_number, state, monitored,
                                 season_metadata_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                season.series_id,
                season.season_number,
                state,
                season.monitored,
                season.season_metadata_id,
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl Store {
    pub fn create_season(&self, season: &NewSeason, initial: SeasonState) -> Result<i64> {
        SeasonState::New.machine().can_transition(initial)?;
        self.with_tx(|tx| {
            let id = insert_season(tx, season, initial.as_str())?;
            transition::insert_seed(tx, &SEASON_LOG, id, initial.as_str())?;
            Ok(id)
        })
    }

    pub fn get_season(&self, id: i64) -> Result<Season> {
        self.read(|conn| {
            conn.query_row(&format!("{} WHERE s.id = ?1", SEASON_SELECT), params![id], map_season)
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("season {}", id)))
        })
    }

    pub fn get_season_by_number(&self, series_id: i64, season_number: i64) -> Result<Season> {
        self.read(|conn| {
            conn.query_row(
                &format!(
                    "{} WHERE s.series_id = ?1 AND s.season_number = ?2",
                    SEASON_SELECT
                ),
                params![series_id, season_number],
                map_season,
            )
            .optional()?
            .ok_or_else(|| {
                MediarrError::NotFound(format!("season {} of series {}", season_number, series_id))
            })
        })
    }

    /// Seasons of a series in season-number order.
    pub fn list_seasons(&self, series_id: i64) -> Result<Vec<Season>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE s.series_id = ?1 ORDER BY s.season_number ASC",
                SEASON_SELECT
            ))?;
            let seasons = stmt
                .query_map(params![series_id], map_season)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(seasons)
        })
    }

    pub fn update_season_state(
        &self,
        id: i64,
        to: SeasonState,
        meta: Option<&TransitionMeta>,
    ) -> Result<()> {
        let current = self.get_season(id)?;
        current.state.machine().can_transition(to)?;
        self.with_tx(|tx| {
            transition::advance(tx, &SEASON_LOG, id, to.as_str(), meta, |prior| {
                SeasonState::parse(prior)?.machine().can_transition(to)
            })?;
            tx.execute(
                "UPDATE season SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![to.as_str(), now_string(), id],
            )?;
            Ok(())
        })
    }

    pub fn link_season_metadata(&self, id: i64, season_metadata_id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE season SET season_metadata_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![season_metadata_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("season {}", id)));
            }
            Ok(())
        })
    }

    /// Hard delete; cascades through episodes and the transition logs.
    pub fn delete_season(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM season WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("season {}", id)));
            }
            Ok(())
        })
    }

    pub fn season_transitions(&self, id: i64) -> Result<Vec<Transition>> {
        self.read(|conn| transition::list(conn, &SEASON_LOG, id))
    }

    // ----- season_metadata -----

    pub fn upsert_season_metadata(&self, meta: &NewSeasonMetadata) -> Result<i64> {
        self.write(|conn| {
            let id = conn.query_row(
                "INSERT INTO season_metadata
                     (tmdb_id, title, overview, poster_path, air_date, episode_count,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(tmdb_id) DO UPDATE SET
                     title = excluded.title,
                     overview = excluded.overview,
                     poster_path = excluded.poster_path,
                     air_date = excluded.air_date,
                     episode_count = excluded.episode_count,
                     updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    meta.tmdb_id,
                    meta.title,
                    meta.overview,
                    meta.poster_path,
                    meta.air_date,
                    meta.episode_count,
                    now_string()
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_season_metadata(&self, id: i64) -> Result<SeasonMetadata> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, tmdb_id, title, overview, poster_path, air_date, episode_count,
                        created_at, updated_at
                 FROM season_metadata WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SeasonMetadata {
                        id: row.get(0)?,
                        tmdb_id: row.get(1)?,
                        title: row.get(2)?,
                        overview: row.get(3)?,
                        poster_path: row.get(4)?,
                        air_date: row.get(5)?,
                        episode_count: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("season metadata {}", id)))
        })
    }
}
