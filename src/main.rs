// mediarr daemon: open the library database, start the manager loops, and
// run until killed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use mediarr_lib::config::Config;
use mediarr_lib::constants::DB_FILENAME;
use mediarr_lib::db::Store;
use mediarr_lib::jobs::manager::{Manager, Remotes};
use mediarr_lib::remote::Disconnected;

#[derive(Parser)]
#[command(name = "mediarr", about = "Self-hosted media library manager")]
struct Args {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the library database
    #[arg(long, default_value = DB_FILENAME)]
    db: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let store = Arc::new(Store::open(&args.db)?);
    log::info!("opened library database at {}", args.db.display());

    // HTTP collaborators are wired in by deployment; without them the loops
    // run but skip remote work.
    if config.tmdb.host.is_empty() {
        log::warn!("no metadata provider configured; index loops will idle");
    }
    let remotes = Remotes {
        metadata: Arc::new(Disconnected),
        indexers: Arc::new(Disconnected),
        downloads: Arc::new(Disconnected),
    };

    let handle = Manager::new(store, remotes, &config).start();
    log::info!("manager started");
    handle.join();
    Ok(())
}
