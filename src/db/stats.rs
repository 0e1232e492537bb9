// Read-side aggregation: state-bucketed counts and the downloading /
// running / error views.

use std::collections::HashMap;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::client::DownloadClientRow;
use super::Store;
use crate::cancel::Cancel;
use crate::constants::TIMESTAMP_FORMAT;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateCount {
    pub state: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaStats {
    pub total: i64,
    pub by_state: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub movies: MediaStats,
    pub tv: MediaStats,
}

/// A movie currently in flight, with its assigned client when one is
/// recorded. The client row may be gone; the view tolerates that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadingMovie {
    pub movie_id: i64,
    pub path: String,
    pub title: Option<String>,
    pub download_id: Option<String>,
    /// Quality of the grabbed release, recorded at grab time.
    pub quality: Option<String>,
    pub download_client: Option<DownloadClientRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadingSeries {
    pub series_id: i64,
    pub path: String,
    pub title: Option<String>,
    pub download_id: Option<String>,
    pub quality: Option<String>,
    pub download_client: Option<DownloadClientRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: i64,
    pub job_type: String,
    pub state: String,
    pub error: Option<String>,
    pub since: String,
}

fn map_client_columns(row: &rusqlite::Row, base: usize) -> rusqlite::Result<Option<DownloadClientRow>> {
    let id: Option<i64> = row.get(base)?;
    Ok(match id {
        Some(id) => Some(DownloadClientRow {
            id,
            name: row.get(base + 1)?,
            implementation: row.get(base + 2)?,
            scheme: row.get(base + 3)?,
            host: row.get(base + 4)?,
            port: row.get(base + 5)?,
            api_key: row.get(base + 6)?,
            created_at: row.get(base + 7)?,
        }),
        None => None,
    })
}

impl Store {
    /// Movie counts grouped by current state.
    pub fn movie_stats_by_state(&self, cancel: &Cancel) -> Result<Vec<StateCount>> {
        cancel.check()?;
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.to_state, COUNT(*) FROM movie m
                 JOIN movie_transition t ON t.movie_id = m.id AND t.most_recent = 1
                 GROUP BY t.to_state ORDER BY t.to_state ASC",
            )?;
            let counts = stmt
                .query_map([], |row| {
                    Ok(StateCount { state: row.get(0)?, count: row.get(1)? })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(counts)
        })
    }

    /// Series counts grouped by current state.
    pub fn tv_stats_by_state(&self, cancel: &Cancel) -> Result<Vec<StateCount>> {
        cancel.check()?;
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.to_state, COUNT(*) FROM series s
                 JOIN series_transition t ON t.series_id = s.id AND t.most_recent = 1
                 GROUP BY t.to_state ORDER BY t.to_state ASC",
            )?;
            let counts = stmt
                .query_map([], |row| {
                    Ok(StateCount { state: row.get(0)?, count: row.get(1)? })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(counts)
        })
    }

    /// Movie and TV stats fanned out in parallel and joined.
    pub fn library_stats(&self, cancel: &Cancel) -> Result<LibraryStats> {
        cancel.check()?;
        let (movies, tv) = std::thread::scope(|scope| {
            let movie_handle = scope.spawn(|| self.movie_stats_by_state(cancel));
            let tv_handle = scope.spawn(|| self.tv_stats_by_state(cancel));
            (
                movie_handle.join().expect("movie stats query panicked"),
                tv_handle.join().expect("tv stats query panicked"),
            )
        });
        Ok(LibraryStats {
            movies: fold_stats(movies?),
            tv: fold_stats(tv?),
        })
    }

    pub fn list_downloading_movies(&self, cancel: &Cancel) -> Result<Vec<DownloadingMovie>> {
        cancel.check()?;
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.path, md.title, t.download_id, t.quality,
                        dc.id, dc.name, dc.implementation, dc.scheme, dc.host, dc.port,
                        dc.api_key, dc.created_at
                 FROM movie m
                 JOIN movie_transition t ON t.movie_id = m.id AND t.most_recent = 1
                 LEFT JOIN movie_metadata md ON md.id = m.movie_metadata_id
                 LEFT JOIN download_client dc ON dc.id = t.download_client_id
                 WHERE t.to_state = 'downloading'
                 ORDER BY m.id ASC",
            )?;
            let movies = stmt
                .query_map([], |row| {
                    Ok(DownloadingMovie {
                        movie_id: row.get(0)?,
                        path: row.get(1)?,
                        title: row.get(2)?,
                        download_id: row.get(3)?,
                        quality: row.get(4)?,
                        download_client: map_client_columns(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(movies)
        })
    }

    pub fn list_downloading_series(&self, cancel: &Cancel) -> Result<Vec<DownloadingSeries>> {
        cancel.check()?;
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.path, md.title, t.download_id, t.quality,
                        dc.id, dc.name, dc.implementation, dc.scheme, dc.host, dc.port,
                        dc.api_key, dc.created_at
                 FROM series s
                 JOIN series_transition t ON t.series_id = s.id AND t.most_recent = 1
                 LEFT JOIN series_metadata md ON md.id = s.series_metadata_id
                 LEFT JOIN download_client dc ON dc.id = t.download_client_id
                 WHERE t.to_state = 'downloading'
                 ORDER BY s.id ASC",
            )?;
            let series = stmt
                .query_map([], |row| {
                    Ok(DownloadingSeries {
                        series_id: row.get(0)?,
                        path: row.get(1)?,
                        title: row.get(2)?,
                        download_id: row.get(3)?,
                        quality: row.get(4)?,
                        download_client: map_client_columns(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(series)
        })
    }

    pub fn list_running_jobs(&self, cancel: &Cancel) -> Result<Vec<JobView>> {
        cancel.check()?;
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT j.id, j.type, t.to_state, t.error, t.created_at
                 FROM job j
                 JOIN job_transition t ON t.job_id = j.id AND t.most_recent = 1
                 WHERE t.to_state = 'running'
                 ORDER BY j.created_at ASC, j.id ASC",
            )?;
            let jobs = stmt
                .query_map([], map_job_view)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(jobs)
        })
    }

    /// Jobs that errored within the last `hours` hours.
    pub fn list_error_jobs(&self, cancel: &Cancel, hours: i64) -> Result<Vec<JobView>> {
        cancel.check()?;
        let cutoff = (chrono::Local::now() - chrono::Duration::hours(hours))
            .format(TIMESTAMP_FORMAT)
            .to_string();
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT j.id, j.type, t.to_state, t.error, t.created_at
                 FROM job j
                 JOIN job_transition t ON t.job_id = j.id AND t.most_recent = 1
                 WHERE t.to_state = 'error' AND t.created_at >= ?1
                 ORDER BY t.created_at DESC, j.id DESC",
            )?;
            let jobs = stmt
                .query_map(params![cutoff], map_job_view)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(jobs)
        })
    }
}

fn map_job_view(row: &rusqlite::Row) -> rusqlite::Result<JobView> {
    Ok(JobView {
        job_id: row.get(0)?,
        job_type: row.get(1)?,
        state: row.get(2)?,
        error: row.get(3)?,
        since: row.get(4)?,
    })
}

fn fold_stats(counts: Vec<StateCount>) -> MediaStats {
    let mut stats = MediaStats::default();
    for StateCount { state, count } in counts {
        stats.total += count;
        stats.by_state.insert(state, count);
    }
    stats
}
