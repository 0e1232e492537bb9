// Mediarr Constants

pub const DB_FILENAME: &str = "mediarr.db";

// Job type tags used by the manager loops
pub const JOB_MOVIE_INDEX: &str = "MovieIndex";
pub const JOB_MOVIE_RECONCILE: &str = "MovieReconcile";
pub const JOB_SERIES_INDEX: &str = "SeriesIndex";
pub const JOB_SERIES_RECONCILE: &str = "SeriesReconcile";

// Scheduling
pub const DEFAULT_MOVIE_INDEX_SECONDS: u64 = 3600;
pub const DEFAULT_MOVIE_RECONCILE_SECONDS: u64 = 900;
pub const DEFAULT_SERIES_INDEX_SECONDS: u64 = 3600;
pub const DEFAULT_SERIES_RECONCILE_SECONDS: u64 = 900;
pub const WORKER_POLL_SECONDS: u64 = 5;
pub const JOB_RUN_TIMEOUT_SECONDS: u64 = 600;
pub const DEFAULT_WORKERS: usize = 2;

// Error string recorded on a job when its run is cancelled or times out
pub const CANCELLED_ERROR: &str = "cancelled";

// Timestamps are ISO-8601 local strings with second resolution
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Media type tags on quality definitions and indexer sources
pub const MEDIA_TYPE_MOVIE: &str = "movie";
pub const MEDIA_TYPE_TV: &str = "tv";
