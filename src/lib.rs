// Mediarr - library entry point
//
// State-tracked media reconciliation core: every movie, series, season,
// episode, and job moves through an explicit lifecycle machine, each
// transition is validated and journaled, and periodic manager loops drive
// the library toward what the user asked to monitor.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod machine;
pub mod remote;

pub use cancel::Cancel;
pub use config::Config;
pub use db::Store;
pub use error::{MediarrError, Result};
