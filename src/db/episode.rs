// Episode storage: episode, episode_file, episode_metadata, episode_transition.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::transition::{self, EPISODE_LOG};
use super::{now_string, Store, Transition, TransitionMeta};
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::EpisodeState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub season_id: i64,
    pub episode_number: i64,
    pub state: EpisodeState,
    pub monitored: bool,
    pub episode_metadata_id: Option<i64>,
    pub episode_file_id: Option<i64>,
    pub download_client_id: Option<i64>,
    pub download_id: Option<String>,
    /// Quality of the release grabbed for the current download, if any.
    pub download_quality: Option<String>,
    pub is_entire_season_download: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewEpisode {
    /// 0 lets the store assign a key; a non-zero id upserts that row.
    pub id: i64,
    pub season_id: i64,
    pub episode_number: i64,
    pub monitored: bool,
    pub episode_metadata_id: Option<i64>,
    pub episode_file_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeFilter {
    pub state: Option<EpisodeState>,
    pub monitored: Option<bool>,
    pub season_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeFile {
    pub id: i64,
    pub relative_path: String,
    pub absolute_path: Option<String>,
    pub size: i64,
    pub quality: Option<String>,
    pub date_added: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewEpisodeFile {
    pub relative_path: String,
    pub absolute_path: Option<String>,
    pub size: i64,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewEpisodeMetadata {
    pub tmdb_id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
}

const EPISODE_SELECT: &str = "SELECT e.id, e.season_id, e.episode_number, t.to_state, e.monitored,
        e.episode_metadata_id, e.episode_file_id, t.download_client_id, t.download_id,
        t.quality, t.is_entire_season_download, e.created_at, e.updated_at
 FROM episode e
 JOIN episode_transition t ON t.episode_id = e.id AND t.most_recent = 1";

fn map_episode(row: &rusqlite::Row) -> rusqlite::Result<Episode> {
    let tag: String = row.get(3)?;
    let state = EpisodeState::parse(&tag).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Episode {
        id: row.get(0)?,
        season_id: row.get(1)?,
        episode_number: row.get(2)?,
        state,
        monitored: row.get(4)?,
        episode_metadata_id: row.get(5)?,
        episode_file_id: row.get(6)?,
        download_client_id: row.get(7)?,
        download_id: row.get(8)?,
        download_quality: row.get(9)?,
        is_entire_season_download: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn insert_episode(conn: &Connection, episode: &NewEpisode, state: &str) -> Result<i64> {
    let now = now_string();
    if episode.id > 0 {
        conn.execute(
            "INSERT INTO episode (id, season_id, episode_number, state, monitored,
                                  episode_metadata_id, episode_file_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(id) DO UPDATE SET
                 season_id = excluded.season_id,
                 episode_number = excluded.episode_number,
                 state = excluded.state,
                 monitored = excluded.monitored,
                 episode_metadata_id = excluded.episode_metadata_id,
                 episode_file_id = excluded.episode_file_id,
                 updated_at = excluded.updated_at",
            params![
                episode.id,
                episode.season_id,
                episode.episode_number,
                state,
                episode.monitored,
                episode.episode_metadata_id,
                episode.episode_file_id,
                now
            ],
        )?;
        Ok(episode.id)
    } else {
        conn.execute(
            "INSERT INTO episode (season_id, episode_number, state, monitored,
                                  episode_metadata_id, episode_file_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                episode.season_id,
                episode.episode_number,
                state,
                episode.monitored,
                episode.episode_metadata_id,
                episode.episode_file_id,
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl Store {
    pub fn create_episode(&self, episode: &NewEpisode, initial: EpisodeState) -> Result<i64> {
        EpisodeState::New.machine().can_transition(initial)?;
        self.with_tx(|tx| {
            let id = insert_episode(tx, episode, initial.as_str())?;
            transition::insert_seed(tx, &EPISODE_LOG, id, initial.as_str())?;
            Ok(id)
        })
    }

    pub fn get_episode(&self, id: i64) -> Result<Episode> {
        self.read(|conn| {
            conn.query_row(&format!("{} WHERE e.id = ?1", EPISODE_SELECT), params![id], map_episode)
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("episode {}", id)))
        })
    }

    pub fn get_episode_by_number(&self, season_id: i64, episode_number: i64) -> Result<Episode> {
        self.read(|conn| {
            conn.query_row(
                &format!(
                    "{} WHERE e.season_id = ?1 AND e.episode_number = ?2",
                    EPISODE_SELECT
                ),
                params![season_id, episode_number],
                map_episode,
            )
            .optional()?
            .ok_or_else(|| {
                MediarrError::NotFound(format!("episode {} of season {}", episode_number, season_id))
            })
        })
    }

    /// Episodes matching every given filter, in season/episode order.
    pub fn list_episodes(&self, filter: &EpisodeFilter) -> Result<Vec<Episode>> {
        let mut sql = format!("{} WHERE 1=1", EPISODE_SELECT);
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(state) = filter.state {
            args.push(Box::new(state.as_str().to_string()));
            sql.push_str(&format!(" AND t.to_state = ?{}", args.len()));
        }
        if let Some(monitored) = filter.monitored {
            args.push(Box::new(monitored));
            sql.push_str(&format!(" AND e.monitored = ?{}", args.len()));
        }
        if let Some(season_id) = filter.season_id {
            args.push(Box::new(season_id));
            sql.push_str(&format!(" AND e.season_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY e.season_id ASC, e.episode_number ASC");

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let episodes = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), map_episode)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(episodes)
        })
    }

    pub fn update_episode_state(
        &self,
        id: i64,
        to: EpisodeState,
        meta: Option<&TransitionMeta>,
    ) -> Result<()> {
        let current = self.get_episode(id)?;
        current.state.machine().can_transition(to)?;
        self.with_tx(|tx| {
            transition::advance(tx, &EPISODE_LOG, id, to.as_str(), meta, |prior| {
                EpisodeState::parse(prior)?.machine().can_transition(to)
            })?;
            tx.execute(
                "UPDATE episode SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![to.as_str(), now_string(), id],
            )?;
            Ok(())
        })
    }

    pub fn update_episode_file_id(&self, id: i64, episode_file_id: Option<i64>) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE episode SET episode_file_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![episode_file_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("episode {}", id)));
            }
            Ok(())
        })
    }

    pub fn link_episode_metadata(&self, id: i64, episode_metadata_id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE episode SET episode_metadata_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![episode_metadata_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("episode {}", id)));
            }
            Ok(())
        })
    }

    pub fn delete_episode(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM episode WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("episode {}", id)));
            }
            Ok(())
        })
    }

    pub fn episode_transitions(&self, id: i64) -> Result<Vec<Transition>> {
        self.read(|conn| transition::list(conn, &EPISODE_LOG, id))
    }

    // ----- episode_file -----

    pub fn create_episode_file(&self, file: &NewEpisodeFile) -> Result<i64> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO episode_file (relative_path, absolute_path, size, quality, date_added)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    file.relative_path,
                    file.absolute_path,
                    file.size,
                    file.quality,
                    now_string()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_episode_file(&self, id: i64) -> Result<EpisodeFile> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, relative_path, absolute_path, size, quality, date_added
                 FROM episode_file WHERE id = ?1",
                params![id],
                |row| {
                    Ok(EpisodeFile {
                        id: row.get(0)?,
                        relative_path: row.get(1)?,
                        absolute_path: row.get(2)?,
                        size: row.get(3)?,
                        quality: row.get(4)?,
                        date_added: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("episode file {}", id)))
        })
    }

    pub fn delete_episode_file(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM episode_file WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("episode file {}", id)));
            }
            Ok(())
        })
    }

    // ----- episode_metadata -----

    pub fn upsert_episode_metadata(&self, meta: &NewEpisodeMetadata) -> Result<i64> {
        self.write(|conn| {
            let id = conn.query_row(
                "INSERT INTO episode_metadata
                     (tmdb_id, title, overview, air_date, runtime, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(tmdb_id) DO UPDATE SET
                     title = excluded.title,
                     overview = excluded.overview,
                     air_date = excluded.air_date,
                     runtime = excluded.runtime,
                     updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    meta.tmdb_id,
                    meta.title,
                    meta.overview,
                    meta.air_date,
                    meta.runtime,
                    now_string()
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_episode_metadata(&self, id: i64) -> Result<EpisodeMetadata> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, tmdb_id, title, overview, air_date, runtime, created_at, updated_at
                 FROM episode_metadata WHERE id = ?1",
                params![id],
                |row| {
                    Ok(EpisodeMetadata {
                        id: row.get(0)?,
                        tmdb_id: row.get(1)?,
                        title: row.get(2)?,
                        overview: row.get(3)?,
                        air_date: row.get(4)?,
                        runtime: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("episode metadata {}", id)))
        })
    }
}
