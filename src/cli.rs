// mediarrctl: one-shot operations against a library database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use anyhow::Result;

use mediarr_lib::cancel::Cancel;
use mediarr_lib::constants::{DB_FILENAME, JOB_RUN_TIMEOUT_SECONDS};
use mediarr_lib::db::job::JobFilter;
use mediarr_lib::db::Store;
use mediarr_lib::jobs::manager::{dispatch, Remotes};
use mediarr_lib::jobs::JobCoordinator;
use mediarr_lib::machine::lifecycle::JobState;
use mediarr_lib::remote::Disconnected;

#[derive(Parser)]
#[command(name = "mediarrctl")]
#[command(about = "Mediarr library inspection and one-shot jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the library database
    #[arg(long, default_value = DB_FILENAME)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Library totals bucketed by state
    Stats,
    /// List jobs, optionally by state tag
    Jobs {
        #[arg(short, long)]
        state: Option<String>,
    },
    /// Transition timeline between two dates (YYYY-MM-DD)
    Timeline {
        start: String,
        end: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Full transition history for one entity
    History {
        /// movie | series | season | episode | job
        kind: String,
        id: i64,
    },
    /// Run one manager loop body to completion and record it as a job
    Run {
        /// Job type tag, e.g. MovieIndex or MovieReconcile
        job_type: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = Arc::new(Store::open(&cli.db)?);
    let cancel = Cancel::new();

    match cli.command {
        Commands::Stats => {
            let stats = store.library_stats(&cancel)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Jobs { state } => {
            let filter = JobFilter {
                state: state.as_deref().map(JobState::parse).transpose()?,
                ..Default::default()
            };
            for job in store.list_jobs(&filter)? {
                println!(
                    "{:>6}  {:<18} {:<10} {}  {}",
                    job.id,
                    job.job_type,
                    job.state,
                    job.created_at,
                    job.error.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Timeline { start, end, limit, offset } => {
            let start = chrono::NaiveDate::parse_from_str(&start, "%Y-%m-%d")?;
            let end = chrono::NaiveDate::parse_from_str(&end, "%Y-%m-%d")?;
            let timeline = store.transitions_by_date(&cancel, start, end, offset, limit)?;
            println!("{}", serde_json::to_string_pretty(&timeline)?);
        }
        Commands::History { kind, id } => {
            let history = store.entity_transitions(&cancel, &kind, id)?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Commands::Run { job_type } => {
            let remotes = Remotes {
                metadata: Arc::new(Disconnected),
                indexers: Arc::new(Disconnected),
                downloads: Arc::new(Disconnected),
            };
            let coordinator = JobCoordinator::new(Arc::clone(&store));
            let id = coordinator.submit(&job_type)?;
            coordinator.begin(id)?;
            let run_cancel = cancel.child_with_timeout(Duration::from_secs(JOB_RUN_TIMEOUT_SECONDS));
            let outcome = dispatch(&store, &remotes, &job_type, &run_cancel)
                .map_err(|e| mediarr_lib::jobs::outcome_message(&e));
            coordinator.finish(id, outcome.clone())?;
            match outcome {
                Ok(()) => println!("job {} done", id),
                Err(message) => println!("job {} failed: {}", id, message),
            }
        }
    }

    Ok(())
}
