// Reconciliation manager -- periodic loops over the library.
//
// A scheduler thread submits one job per loop per period; worker threads
// accept pending jobs and run the loop bodies under a per-run deadline.
// Workers catch panics so a bad run can never take the thread down, and
// every accepted job is finalized (done or error) in the run that began it.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{outcome_message, JobCoordinator};
use crate::cancel::Cancel;
use crate::config::Config;
use crate::constants::{
    DEFAULT_WORKERS, JOB_MOVIE_INDEX, JOB_MOVIE_RECONCILE, JOB_RUN_TIMEOUT_SECONDS,
    JOB_SERIES_INDEX, JOB_SERIES_RECONCILE, WORKER_POLL_SECONDS,
};
use crate::db::job::JobFilter;
use crate::db::Store;
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::JobState;
use crate::remote::{DownloadClient, IndexerSearch, MetadataProvider};

/// The collaborator set the loop bodies talk to.
#[derive(Clone)]
pub struct Remotes {
    pub metadata: Arc<dyn MetadataProvider>,
    pub indexers: Arc<dyn IndexerSearch>,
    pub downloads: Arc<dyn DownloadClient>,
}

#[derive(Debug, Clone)]
struct LoopSpec {
    job_type: &'static str,
    period: Duration,
}

pub struct Manager {
    store: Arc<Store>,
    remotes: Remotes,
    loops: Vec<LoopSpec>,
    workers: usize,
    run_timeout: Duration,
}

pub struct ManagerHandle {
    shutdown: Cancel,
    threads: Vec<JoinHandle<()>>,
}

impl Manager {
    pub fn new(store: Arc<Store>, remotes: Remotes, config: &Config) -> Self {
        let jobs = &config.manager.jobs;
        let loops = vec![
            LoopSpec { job_type: JOB_MOVIE_INDEX, period: Duration::from_secs(jobs.movie_index) },
            LoopSpec {
                job_type: JOB_MOVIE_RECONCILE,
                period: Duration::from_secs(jobs.movie_reconcile),
            },
            LoopSpec { job_type: JOB_SERIES_INDEX, period: Duration::from_secs(jobs.series_index) },
            LoopSpec {
                job_type: JOB_SERIES_RECONCILE,
                period: Duration::from_secs(jobs.series_reconcile),
            },
        ];
        Self {
            store,
            remotes,
            loops,
            workers: DEFAULT_WORKERS,
            run_timeout: Duration::from_secs(JOB_RUN_TIMEOUT_SECONDS),
        }
    }

    /// Spawn the scheduler and worker threads.
    pub fn start(self) -> ManagerHandle {
        let shutdown = Cancel::new();
        let mut threads = Vec::new();

        {
            let store = Arc::clone(&self.store);
            let loops = self.loops.clone();
            let shutdown = shutdown.clone();
            threads.push(
                std::thread::Builder::new()
                    .name("manager-scheduler".into())
                    .spawn(move || scheduler_loop(store, loops, shutdown))
                    .expect("failed to spawn scheduler thread"),
            );
        }

        for n in 0..self.workers {
            let store = Arc::clone(&self.store);
            let remotes = self.remotes.clone();
            let shutdown = shutdown.clone();
            let run_timeout = self.run_timeout;
            threads.push(
                std::thread::Builder::new()
                    .name(format!("manager-worker-{}", n))
                    .spawn(move || worker_loop(store, remotes, shutdown, run_timeout))
                    .expect("failed to spawn worker thread"),
            );
        }

        ManagerHandle { shutdown, threads }
    }
}

impl ManagerHandle {
    /// Signal shutdown and wait for the threads. In-flight loop bodies see
    /// the cancellation and finalize their jobs as Error("cancelled").
    pub fn stop(self) {
        self.shutdown.cancel();
        for thread in self.threads {
            let _ = thread.join();
        }
    }

    /// Block until the manager stops on its own (it does not, short of
    /// process exit), for daemon mains.
    pub fn join(self) {
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}

fn scheduler_loop(store: Arc<Store>, loops: Vec<LoopSpec>, shutdown: Cancel) {
    let coordinator = JobCoordinator::new(store);
    let mut last_submit: HashMap<&'static str, Instant> = HashMap::new();

    while !shutdown.is_cancelled() {
        for spec in &loops {
            let due = last_submit
                .get(spec.job_type)
                .map(|at| at.elapsed() >= spec.period)
                .unwrap_or(true);
            if !due {
                continue;
            }
            match coordinator.submit(spec.job_type) {
                Ok(id) => {
                    log::debug!("submitted {} job {}", spec.job_type, id);
                    last_submit.insert(spec.job_type, Instant::now());
                }
                Err(MediarrError::JobAlreadyPending(_)) => {
                    // Previous run has not been accepted yet; skip this tick.
                    log::debug!("{} still pending, skipping tick", spec.job_type);
                    last_submit.insert(spec.job_type, Instant::now());
                }
                Err(e) => log::error!("submitting {} failed: {}", spec.job_type, e),
            }
        }
        std::thread::sleep(Duration::from_secs(WORKER_POLL_SECONDS));
    }
}

fn worker_loop(store: Arc<Store>, remotes: Remotes, shutdown: Cancel, run_timeout: Duration) {
    let coordinator = JobCoordinator::new(Arc::clone(&store));

    while !shutdown.is_cancelled() {
        match run_next_job(&store, &remotes, &coordinator, &shutdown, run_timeout) {
            Ok(true) => continue, // drained one, immediately try the next
            Ok(false) => {}
            Err(e) => log::error!("job worker: {}", e),
        }
        std::thread::sleep(Duration::from_secs(WORKER_POLL_SECONDS));
    }
}

/// Accept and run one pending job. Returns false when the queue is empty.
pub fn run_next_job(
    store: &Store,
    remotes: &Remotes,
    coordinator: &JobCoordinator,
    shutdown: &Cancel,
    run_timeout: Duration,
) -> Result<bool> {
    let pending = coordinator.list(&JobFilter {
        state: Some(JobState::Pending),
        ..Default::default()
    })?;

    for job in pending {
        match coordinator.begin(job.id) {
            Ok(()) => {}
            // Another worker won the race for this job.
            Err(MediarrError::InvalidTransition(_)) | Err(MediarrError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }

        let cancel = shutdown.child_with_timeout(run_timeout);
        super::register_cancel(job.id, cancel.clone());

        let body = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatch(store, remotes, &job.job_type, &cancel)
        }));
        super::remove_cancel(job.id);

        let outcome = match body {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(outcome_message(&e)),
            Err(_) => Err("panicked".to_string()),
        };
        match &outcome {
            Ok(()) => log::info!("job {} ({}) done", job.id, job.job_type),
            Err(message) => log::warn!("job {} ({}) failed: {}", job.id, job.job_type, message),
        }
        coordinator.finish(job.id, outcome)?;
        return Ok(true);
    }

    Ok(false)
}

/// Route a job to its loop body.
pub fn dispatch(store: &Store, remotes: &Remotes, job_type: &str, cancel: &Cancel) -> Result<()> {
    match job_type {
        JOB_MOVIE_INDEX => {
            super::movie_index::run(store, remotes.metadata.as_ref(), cancel).map(|_| ())
        }
        JOB_MOVIE_RECONCILE => super::movie_reconcile::run(
            store,
            remotes.indexers.as_ref(),
            remotes.downloads.as_ref(),
            cancel,
        )
        .map(|_| ()),
        JOB_SERIES_INDEX => {
            super::series_index::run(store, remotes.metadata.as_ref(), cancel)?;
            super::series_index::promote_aired_episodes(store, cancel).map(|_| ())
        }
        JOB_SERIES_RECONCILE => super::series_reconcile::run(
            store,
            remotes.indexers.as_ref(),
            remotes.downloads.as_ref(),
            cancel,
        )
        .map(|_| ()),
        other => Err(MediarrError::Other(format!("unknown job type: {}", other))),
    }
}
