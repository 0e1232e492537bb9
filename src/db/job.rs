// Job storage: job, job_transition.
//
// Jobs have one extra invariant over the media kinds: at most one pending
// job per type. Creation checks it before the transaction opens (the fast
// rejection path) and again inside the transaction, where the write mutex
// is held, so two racing submissions cannot both insert.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::transition::{self, JOB_LOG};
use super::{now_string, Store, Transition, TransitionMeta};
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::JobState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub job_type: String,
    pub state: JobState,
    /// Error string from the current transition row, set on running -> error.
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub state: Option<JobState>,
    pub job_type: Option<String>,
}

const JOB_SELECT: &str = "SELECT j.id, j.type, t.to_state, t.error, j.created_at, j.updated_at
 FROM job j
 JOIN job_transition t ON t.job_id = j.id AND t.most_recent = 1";

fn map_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let tag: String = row.get(2)?;
    let state = JobState::parse(&tag).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get(0)?,
        job_type: row.get(1)?,
        state,
        error: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn pending_job_exists(conn: &Connection, job_type: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM job j
         JOIN job_transition t ON t.job_id = j.id AND t.most_recent = 1
         WHERE j.type = ?1 AND t.to_state = 'pending'",
        params![job_type],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Store {
    /// Create a job in `initial` state. Creating a second pending job of the
    /// same type is rejected with JobAlreadyPending. The uniqueness check
    /// runs once before the transaction (cheap rejection without taking the
    /// write scope) and again inside it, because the pre-check's read lock
    /// is released before the transaction opens.
    pub fn create_job(&self, job_type: &str, initial: JobState) -> Result<i64> {
        JobState::New.machine().can_transition(initial)?;
        if initial == JobState::Pending && self.has_pending_job(job_type)? {
            return Err(MediarrError::JobAlreadyPending(job_type.to_string()));
        }
        self.with_tx(|tx| {
            if initial == JobState::Pending && pending_job_exists(tx, job_type)? {
                return Err(MediarrError::JobAlreadyPending(job_type.to_string()));
            }
            let now = now_string();
            tx.execute(
                "INSERT INTO job (type, state, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![job_type, initial.as_str(), now],
            )?;
            let id = tx.last_insert_rowid();
            transition::insert_seed(tx, &JOB_LOG, id, initial.as_str())?;
            Ok(id)
        })
    }

    pub fn has_pending_job(&self, job_type: &str) -> Result<bool> {
        self.read(|conn| pending_job_exists(conn, job_type))
    }

    pub fn get_job(&self, id: i64) -> Result<Job> {
        self.read(|conn| {
            conn.query_row(&format!("{} WHERE j.id = ?1", JOB_SELECT), params![id], map_job)
                .optional()?
                .ok_or_else(|| MediarrError::NotFound(format!("job {}", id)))
        })
    }

    /// Jobs matching the filter, oldest first.
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let (sql, state_tag) = match (&filter.state, &filter.job_type) {
            (Some(state), Some(_)) => (
                format!(
                    "{} WHERE t.to_state = ?1 AND j.type = ?2 ORDER BY j.created_at ASC, j.id ASC",
                    JOB_SELECT
                ),
                Some(state.as_str()),
            ),
            (Some(state), None) => (
                format!(
                    "{} WHERE t.to_state = ?1 ORDER BY j.created_at ASC, j.id ASC",
                    JOB_SELECT
                ),
                Some(state.as_str()),
            ),
            (None, Some(_)) => (
                format!("{} WHERE j.type = ?1 ORDER BY j.created_at ASC, j.id ASC", JOB_SELECT),
                None,
            ),
            (None, None) => (
                format!("{} ORDER BY j.created_at ASC, j.id ASC", JOB_SELECT),
                None,
            ),
        };

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let jobs = match (state_tag, &filter.job_type) {
                (Some(state), Some(job_type)) => {
                    stmt.query_map(params![state, job_type], map_job)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                (Some(state), None) => stmt
                    .query_map(params![state], map_job)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                (None, Some(job_type)) => stmt
                    .query_map(params![job_type], map_job)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                (None, None) => stmt
                    .query_map([], map_job)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };
            Ok(jobs)
        })
    }

    /// Advance a job; `error` lands on the transition row (meaningful for
    /// running -> error).
    pub fn update_job_state(&self, id: i64, to: JobState, error: Option<&str>) -> Result<()> {
        let current = self.get_job(id)?;
        current.state.machine().can_transition(to)?;
        let meta = TransitionMeta {
            error: error.map(|e| e.to_string()),
            ..Default::default()
        };
        self.with_tx(|tx| {
            transition::advance(tx, &JOB_LOG, id, to.as_str(), Some(&meta), |prior| {
                JobState::parse(prior)?.machine().can_transition(to)
            })?;
            tx.execute(
                "UPDATE job SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![to.as_str(), now_string(), id],
            )?;
            Ok(())
        })
    }

    pub fn delete_job(&self, id: i64) -> Result<()> {
        self.write(|conn| {
            let rows = conn.execute("DELETE FROM job WHERE id = ?1", params![id])?;
            if rows == 0 {
                return Err(MediarrError::NotFound(format!("job {}", id)));
            }
            Ok(())
        })
    }

    pub fn job_transitions(&self, id: i64) -> Result<Vec<Transition>> {
        self.read(|conn| transition::list(conn, &JOB_LOG, id))
    }
}
