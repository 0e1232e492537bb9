// External collaborator contracts.
//
// The manager loops only ever see these traits. Concrete HTTP clients live
// behind them; until one is wired in, Disconnected keeps the binaries
// honest by failing every call with a clear message.

use serde::{Deserialize, Serialize};

use crate::error::{MediarrError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMovie {
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSeries {
    pub tmdb_id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub first_air_date: Option<String>,
    pub season_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSeason {
    pub tmdb_id: i64,
    pub season_number: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
    pub episode_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub tmdb_id: i64,
    pub episode_number: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime: Option<i64>,
}

/// One release a search turned up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub indexer_id: i64,
    pub title: String,
    /// Bytes as reported by the indexer.
    pub size: i64,
    /// Quality tag, matched against quality definition names.
    pub quality: String,
    pub download_uri: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Queued,
    Downloading,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub state: DownloadState,
    /// 0.0 to 1.0
    pub progress: f64,
    pub output_path: Option<String>,
}

pub trait MetadataProvider: Send + Sync {
    fn lookup_movie(&self, external_id: i64) -> Result<RemoteMovie>;
    fn lookup_series(&self, external_id: i64) -> Result<RemoteSeries>;
    fn lookup_season(&self, series_external_id: i64, season_number: i64) -> Result<RemoteSeason>;
    fn lookup_episode(&self, season_external_id: i64, episode_number: i64) -> Result<RemoteEpisode>;
}

pub trait IndexerSearch: Send + Sync {
    fn search(&self, query: &str, media_type: &str) -> Result<Vec<Release>>;
}

pub trait DownloadClient: Send + Sync {
    fn submit(&self, download_uri: &str) -> Result<String>;
    fn status(&self, download_id: &str) -> Result<DownloadStatus>;
    fn remove(&self, download_id: &str) -> Result<()>;
}

/// Placeholder wiring for a deployment with no collaborators configured.
pub struct Disconnected;

impl MetadataProvider for Disconnected {
    fn lookup_movie(&self, _external_id: i64) -> Result<RemoteMovie> {
        Err(MediarrError::Remote("metadata provider not configured".to_string()))
    }

    fn lookup_series(&self, _external_id: i64) -> Result<RemoteSeries> {
        Err(MediarrError::Remote("metadata provider not configured".to_string()))
    }

    fn lookup_season(&self, _series_external_id: i64, _season_number: i64) -> Result<RemoteSeason> {
        Err(MediarrError::Remote("metadata provider not configured".to_string()))
    }

    fn lookup_episode(&self, _season_external_id: i64, _episode_number: i64) -> Result<RemoteEpisode> {
        Err(MediarrError::Remote("metadata provider not configured".to_string()))
    }
}

impl IndexerSearch for Disconnected {
    fn search(&self, _query: &str, _media_type: &str) -> Result<Vec<Release>> {
        Ok(Vec::new())
    }
}

impl DownloadClient for Disconnected {
    fn submit(&self, _download_uri: &str) -> Result<String> {
        Err(MediarrError::Remote("download client not configured".to_string()))
    }

    fn status(&self, _download_id: &str) -> Result<DownloadStatus> {
        Err(MediarrError::Remote("download client not configured".to_string()))
    }

    fn remove(&self, _download_id: &str) -> Result<()> {
        Ok(())
    }
}
