// Transition timelines: dated buckets across the movie, season, and job
// logs, plus full per-entity histories with a denormalized header.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::transition::{self, EPISODE_LOG, JOB_LOG, MOVIE_LOG, SEASON_LOG, SERIES_LOG};
use super::{Store, Transition};
use crate::cancel::Cancel;
use crate::constants::DATE_FORMAT;
use crate::error::{MediarrError, Result};

/// Per-local-day counts of the states the dashboard cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayBucket {
    pub day: String,
    pub downloaded: i64,
    pub downloading: i64,
    pub completed: i64,
    pub done: i64,
    pub error: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub kind: String,
    pub transition_id: i64,
    pub entity_id: i64,
    pub from_state: Option<String>,
    pub to_state: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub days: Vec<DayBucket>,
    pub recent: Vec<TimelineEntry>,
    pub total: i64,
}

/// Full history of one entity plus a header pulled from its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityHistory {
    pub kind: String,
    pub entity_id: i64,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub transitions: Vec<Transition>,
}

const TIMELINE_UNION: &str = "SELECT 'movie' AS kind, id, movie_id AS entity_id, from_state, to_state, created_at
     FROM movie_transition
 UNION ALL
 SELECT 'season', id, season_id, from_state, to_state, created_at
     FROM season_transition
 UNION ALL
 SELECT 'job', id, job_id, from_state, to_state, created_at
     FROM job_transition";

impl Store {
    /// Dated transition timeline. Both ends of the date range are
    /// inclusive; a transition lands in the bucket of its created_at
    /// rendered as a local date.
    pub fn transitions_by_date(
        &self,
        cancel: &Cancel,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        offset: i64,
        limit: i64,
    ) -> Result<Timeline> {
        cancel.check()?;
        let start = start.format(DATE_FORMAT).to_string();
        let end = end.format(DATE_FORMAT).to_string();

        let days = self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT date(created_at) AS day, to_state, COUNT(*)
                 FROM ({TIMELINE_UNION})
                 WHERE date(created_at) BETWEEN ?1 AND ?2
                   AND to_state IN ('downloaded', 'downloading', 'completed', 'done', 'error')
                 GROUP BY day, to_state
                 ORDER BY day ASC",
            ))?;
            let rows = stmt
                .query_map(params![start, end], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut days: Vec<DayBucket> = Vec::new();
            for (day, state, count) in rows {
                if days.last().map(|b: &DayBucket| b.day != day).unwrap_or(true) {
                    days.push(DayBucket { day: day.clone(), ..Default::default() });
                }
                let bucket = days.last_mut().unwrap();
                match state.as_str() {
                    "downloaded" => bucket.downloaded = count,
                    "downloading" => bucket.downloading = count,
                    "completed" => bucket.completed = count,
                    "done" => bucket.done = count,
                    "error" => bucket.error = count,
                    _ => {}
                }
            }
            Ok(days)
        })?;

        cancel.check()?;
        let recent = self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT kind, id, entity_id, from_state, to_state, created_at
                 FROM ({TIMELINE_UNION})
                 WHERE date(created_at) BETWEEN ?1 AND ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4",
            ))?;
            let entries = stmt
                .query_map(params![start, end, limit, offset], |row| {
                    Ok(TimelineEntry {
                        kind: row.get(0)?,
                        transition_id: row.get(1)?,
                        entity_id: row.get(2)?,
                        from_state: row.get(3)?,
                        to_state: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(entries)
        })?;

        cancel.check()?;
        let total = self.read(|conn| {
            let total: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM ({TIMELINE_UNION})
                     WHERE date(created_at) BETWEEN ?1 AND ?2",
                ),
                params![start, end],
                |row| row.get(0),
            )?;
            Ok(total)
        })?;

        Ok(Timeline { days, recent, total })
    }

    /// Ordered transition history for one entity of any supported kind.
    pub fn entity_transitions(&self, cancel: &Cancel, kind: &str, id: i64) -> Result<EntityHistory> {
        cancel.check()?;
        let (spec, header_sql) = match kind {
            "movie" => (
                &MOVIE_LOG,
                "SELECT md.title, md.poster_path FROM movie m
                 LEFT JOIN movie_metadata md ON md.id = m.movie_metadata_id
                 WHERE m.id = ?1",
            ),
            "series" => (
                &SERIES_LOG,
                "SELECT md.title, md.poster_path FROM series s
                 LEFT JOIN series_metadata md ON md.id = s.series_metadata_id
                 WHERE s.id = ?1",
            ),
            "season" => (
                &SEASON_LOG,
                "SELECT md.title, md.poster_path FROM season s
                 LEFT JOIN season_metadata md ON md.id = s.season_metadata_id
                 WHERE s.id = ?1",
            ),
            "episode" => (
                &EPISODE_LOG,
                "SELECT md.title, NULL FROM episode e
                 LEFT JOIN episode_metadata md ON md.id = e.episode_metadata_id
                 WHERE e.id = ?1",
            ),
            "job" => (&JOB_LOG, "SELECT type, NULL FROM job WHERE id = ?1"),
            other => {
                return Err(MediarrError::UnsupportedEntity(other.to_string()));
            }
        };

        self.read(|conn| {
            let header: Option<(Option<String>, Option<String>)> = conn
                .query_row(header_sql, params![id], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?;
            let (title, poster_path) =
                header.ok_or_else(|| MediarrError::NotFound(format!("{} {}", kind, id)))?;

            let transitions = transition::list(conn, spec, id)?;
            Ok(EntityHistory {
                kind: kind.to_string(),
                entity_id: id,
                title,
                poster_path,
                transitions,
            })
        })
    }
}
