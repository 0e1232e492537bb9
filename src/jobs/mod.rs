// Job system module
//
// The coordinator is a thin layer over the store's job operations; it does
// not know what jobs do. The manager decides the type tags and the work
// bodies.

pub mod manager;
pub mod movie_index;
pub mod movie_reconcile;
pub mod quality;
pub mod series_index;
pub mod series_reconcile;


use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use crate::cancel::Cancel;
use crate::constants::CANCELLED_ERROR;
use crate::db::job::{Job, JobFilter};
use crate::db::Store;
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::JobState;

/// Global registry of cancel handles keyed by job id. A cancel request sets
/// the handle's flag; job bodies check it between phases.
static CANCEL_FLAGS: LazyLock<Mutex<HashMap<i64, Cancel>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Register a job's cancel handle so it can be cancelled externally.
pub fn register_cancel(job_id: i64, cancel: Cancel) {
    let mut flags = CANCEL_FLAGS.lock().unwrap();
    flags.insert(job_id, cancel);
}

/// Request cancellation of a running job. Returns false when the job is not
/// registered (already finished or never started).
pub fn request_cancel(job_id: i64) -> bool {
    let flags = CANCEL_FLAGS.lock().unwrap();
    match flags.get(&job_id) {
        Some(cancel) => {
            cancel.cancel();
            true
        }
        None => false,
    }
}

/// Remove a cancel handle after a job finishes.
pub fn remove_cancel(job_id: i64) {
    let mut flags = CANCEL_FLAGS.lock().unwrap();
    flags.remove(&job_id);
}

#[derive(Clone)]
pub struct JobCoordinator {
    store: Arc<Store>,
}

impl JobCoordinator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Queue a job of the given type. At most one pending job per type may
    /// exist; a duplicate submission returns JobAlreadyPending.
    pub fn submit(&self, job_type: &str) -> Result<i64> {
        self.store.create_job(job_type, JobState::Pending)
    }

    /// Accept a pending job for execution.
    pub fn begin(&self, id: i64) -> Result<()> {
        self.store.update_job_state(id, JobState::Running, None)
    }

    /// Finalize a run. Success lands in done; failure lands in error with
    /// the message on the transition row.
    pub fn finish(&self, id: i64, outcome: std::result::Result<(), String>) -> Result<()> {
        match outcome {
            Ok(()) => self.store.update_job_state(id, JobState::Done, None),
            Err(message) => self.store.update_job_state(id, JobState::Error, Some(&message)),
        }
    }

    pub fn get(&self, id: i64) -> Result<Job> {
        self.store.get_job(id)
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.store.list_jobs(filter)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_job(id)
    }
}

/// Render a run failure as the string recorded on the job. Cancellation
/// (including deadline expiry) always records the same cause.
pub fn outcome_message(err: &MediarrError) -> String {
    match err {
        MediarrError::Cancelled => CANCELLED_ERROR.to_string(),
        other => other.to_string(),
    }
}
