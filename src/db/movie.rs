// Movie storage: movie, movie_file, movie_metadata, movie_transition.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::transition::{self, MOVIE_LOG};
use super::{now_string, Store, Transition, TransitionMeta};
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::MovieState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub path: String,
    pub state: MovieState,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub movie_metadata_id: Option<i64>,
    pub movie_file_id: Option<i64>,
    pub added: Option<String>,
    /// Download assignment carried on the current transition row, if any.
    pub download_client_id: Option<i64>,
    pub download_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMovie {
    /// 0 lets the store assign a key; a non-zero id upserts that row.
    pub id: i64,
    pub path: String,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub movie_metadata_id: Option<i64>,
    pub movie_file_id: Option<i64>,
    pub added: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    pub state: Option<MovieState>,
    pub monitored: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieFile {
    pub id: i64,
    pub relative_path: String,
    pub absolute_path: Option<String>,
    pub size: i64,
    pub quality: Option<String>,
    pub date_added: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMovieFile {
    pub relative_path: String,
    pub absolute_path: Option<String>,
    pub size: i64,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMovieMetadata {
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
}

const MOVIE_SELECT: &str = "SELECT m.id, m.path, t.to_state, m.monitored, m.quality_profile_id,
        m.movie_metadata_id, m.movie_file_id, m.added,
        t.download_client_id, t.download_id, m.created_at, m.updated_at
 FROM movie m
 JOIN movie_transition t ON t.movie_id = m.id AND t.most_recent = 1";

fn map_movie(row: &rusqlite::Row) -> rusqlite::Result<Movie> {
    let tag: String = row.get(2)?;
    let state = MovieState::parse(&tag).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Movie {
        id: row.get(0)?,
        path: row.get(1)?,
        state,
        monitored: row.get(3)?,
        quality_profile_id: row.get(4)?,
        movie_metadata_id: row.get(5)?,
        movie_file_id: row.get(6)?,
        added: row.get(7)?,
        download_client_id: row.get(8)?,
        download_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn insert_movie(conn: &Connection, movie: &NewMovie, state: &str) -> Result<i64> {
    let now = now_string();
    if movie.id > 0 {
        conn.execute(
            "INSERT INTO movie (id, path, state, monitored, quality_profile_id,
                                movie_metadata_id, movie_file_id, added, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(id) DO UPDATE SET
                 path = excluded.path,
                 state = excluded.state,
                 monitored = excluded.monitored,
                 quality_profile_id = excluded.quality_profile_id,
                 movie_metadata_id = excluded.movie_metadata_id,
                 movie_file_id = excluded.movie_file_id,
                 added = excluded.added,
                 updated_at = excluded.updated_at",
            params![
                movie.id,
                movie.path,
                state,
                movie.monitored,
                movie.quality_profile_id,
                movie.movie_metadata_id,
                movie.movie_file_id,
                movie.added,
                now
            ],
        )?;
        Ok(movie.id)
    } else {
        conn.execute(
            "INSERT INTO movie (path, state, monitored, quality_profile_id,
                                movie_metadata_id, movie_file_id, added, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                movie.path,
                state,
                movie.monitored,
                movie.quality_profile_id,
                movie.movie_metadata_id,
                movie.movie_file_id,
                movie.added,
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl Store {
    /// Create a movie in `initial` state. The state must be reachable from
    /// the new pseudo-state; the entity row and its seed transition row
    /// commit together.
    pub fn create_movie(&self, movie: &NewMovie, initial: MovieState) -> Result<i64> {
        MovieState::New.machine().can_transition(initial)?;
        self.with_tx(|tx| {
            let id = insert_movie(tx, movie, initial.as_str())?;
            transition::insert_seed(tx, &MOVIE_LOG, id, initial.as_str())?;
            Ok(id)
        })
    }

    pub fn get_movie(&self, id: i64) -> Result<Movie> {
        self.read(|conn| {
            conn.query_row(&format!("{} WHERE m.id = ?1", MOVIE_SELECT), params![id], map_movie)
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("movie {}", id)))
        })
    }

    pub fn get_movie_by_path(&self, path: &str) -> Result<Movie> {
        self.read(|conn| {
            conn.query_row(&format!("{} WHERE m.path = ?1", MOVIE_SELECT), params![path], map_movie)
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("movie at {}", path)))
        })
    }

    /// Movies matching every given filter, ordered by metadata title.
    pub fn list_movies(
        &self,
        filter: &MovieFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Movie>> {
        let mut sql = format!(
            "{} LEFT JOIN movie_metadata md ON md.id = m.movie_metadata_id WHERE 1=1",
            MOVIE_SELECT
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(state) = filter.state {
            args.push(Box::new(state.as_str().to_string()));
            sql.push_str(&format!(" AND t.to_state = ?{}", args.len()));
        }
        if let Some(monitored) = filter.monitored {
            args.push(Box::new(monitored));
            sql.push_str(&format!(" AND m.monitored = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY md.title ASC");
        args.push(Box::new(limit.unwrap_or(-1)));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));
        args.push(Box::new(offset.unwrap_or(0)));
        sql.push_str(&format!(" OFFSET ?{}", args.len()));

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let movies = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), map_movie)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(movies)
        })
    }

    /// Advance a movie through its lifecycle. The machine validates before
    /// the lock is taken and again atomically under it, so a racing writer
    /// loses with InvalidTransition instead of corrupting the log.
    pub fn update_movie_state(
        &self,
        id: i64,
        to: MovieState,
        meta: Option<&TransitionMeta>,
    ) -> Result<()> {
        let current = self.get_movie(id)?;
        current.state.machine().can_transition(to)?;
        self.with_tx(|tx| {
            transition::advance(tx, &MOVIE_LOG, id, to.as_str(), meta, |prior| {
                MovieState::parse(prior)?.machine().can_transition(to)
            })?;
            tx.execute(
                "UPDATE movie SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![to.as_str(), now_string(), id],
            )?;
            Ok(())
        })
    }

    pub fn update_movie_file_id(&self, id: i64, movie_file_id: Option<i64>) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE movie SET movie_file_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![movie_file_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("movie {}", id)));
            }
            Ok(())
        })
    }

    pub fn update_movie_quality_profile(&self, id: i64, quality_profile_id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE movie SET quality_profile_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![quality_profile_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("movie {}", id)));
            }
            Ok(())
        })
    }

    pub fn link_movie_metadata(&self, id: i64, movie_metadata_id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute(
                "UPDATE movie SET movie_metadata_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![movie_metadata_id, now_string(), id],
            )?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("movie {}", id)));
            }
            Ok(())
        })
    }

    /// Hard delete; the schema cascades to the transition log.
    pub fn delete_movie(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM movie WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("movie {}", id)));
            }
            Ok(())
        })
    }

    /// Full ordered transition history, oldest first.
    pub fn movie_transitions(&self, id: i64) -> Result<Vec<Transition>> {
        self.read(|conn| transition::list(conn, &MOVIE_LOG, id))
    }

    // ----- movie_file -----

    pub fn create_movie_file(&self, file: &NewMovieFile) -> Result<i64> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO movie_file (relative_path, absolute_path, size, quality, date_added)
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

    pub fn get_movie_file(&self, id: i64) -> Result<MovieFile> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, relative_path, absolute_path, size, quality, date_added
                 FROM movie_file WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MovieFile {
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
            .ok_or_else(|| MediarrError::NotFound(format!("movie file {}", id)))
        })
    }

    /// File rows are detachable from their movie and deleted separately.
    pub fn delete_movie_file(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM movie_file WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("movie file {}", id)));
            }
            Ok(())
        })
    }

    // ----- movie_metadata -----

    /// Upsert keyed by the external provider id; a re-upsert updates the
    /// mutable fields in place without losing the internal id.
    pub fn upsert_movie_metadata(&self, meta: &NewMovieMetadata) -> Result<i64> {
        self.write(|conn| {
            let id = conn.query_row(
                "INSERT INTO movie_metadata
                     (tmdb_id, title, overview, poster_path, release_date, runtime,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(tmdb_id) DO UPDATE SET
                     title = excluded.title,
                     overview = excluded.overview,
                     poster_path = excluded.poster_path,
                     release_date = excluded.release_date,
                     runtime = excluded.runtime,
                     updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    meta.tmdb_id,
                    meta.title,
                    meta.overview,
                    meta.poster_path,
                    meta.release_date,
                    meta.runtime,
                    now_string()
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_movie_metadata(&self, id: i64) -> Result<MovieMetadata> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, tmdb_id, title, overview, poster_path, release_date, runtime,
                        created_at, updated_at
                 FROM movie_metadata WHERE id = ?1",
                params![id],
                map_movie_metadata,
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("movie metadata {}", id)))
        })
    }

    pub fn get_movie_metadata_by_tmdb_id(&self, tmdb_id: i64) -> Result<MovieMetadata> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, tmdb_id, title, overview, poster_path, release_date, runtime,
                        created_at, updated_at
                 FROM movie_metadata WHERE tmdb_id = ?1",
                params![tmdb_id],
                map_movie_metadata,
            )
            .optional()?
            .ok_or_else(|| MediarrError::NotFound(format!("movie metadata tmdb {}", tmdb_id)))
        })
    }
}

fn map_movie_metadata(row: &rusqlite::Row) -> rusqlite::Result<MovieMetadata> {
    Ok(MovieMetadata {
        id: row.get(0)?,
        tmdb_id: row.get(1)?,
        title: row.get(2)?,
        overview: row.get(3)?,
        poster_path: row.get(4)?,
        release_date: row.get(5)?,
        runtime: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
