// Configuration surface consumed by the core.
//
// Loaded from a TOML file. Unknown keys are ignored so a config written for
// a newer build still loads. Every section is optional and defaults apply.

use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_MOVIE_INDEX_SECONDS, DEFAULT_MOVIE_RECONCILE_SECONDS, DEFAULT_SERIES_INDEX_SECONDS,
    DEFAULT_SERIES_RECONCILE_SECONDS,
};
use crate::error::{MediarrError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tmdb: RemoteConfig,
    #[serde(default)]
    pub prowlarr: RemoteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub host: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: String::new(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub movie: String,
    #[serde(default)]
    pub tv: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Loop periods in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_movie_index", rename = "movieIndex")]
    pub movie_index: u64,
    #[serde(default = "default_movie_reconcile", rename = "movieReconcile")]
    pub movie_reconcile: u64,
    #[serde(default = "default_series_index", rename = "seriesIndex")]
    pub series_index: u64,
    #[serde(default = "default_series_reconcile", rename = "seriesReconcile")]
    pub series_reconcile: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            movie_index: default_movie_index(),
            movie_reconcile: default_movie_reconcile(),
            series_index: default_series_index(),
            series_reconcile: default_series_reconcile(),
        }
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_movie_index() -> u64 {
    DEFAULT_MOVIE_INDEX_SECONDS
}

fn default_movie_reconcile() -> u64 {
    DEFAULT_MOVIE_RECONCILE_SECONDS
}

fn default_series_index() -> u64 {
    DEFAULT_SERIES_INDEX_SECONDS
}

fn default_series_reconcile() -> u64 {
    DEFAULT_SERIES_RECONCILE_SECONDS
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| MediarrError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.tmdb.scheme, "https");
        assert_eq!(cfg.manager.jobs.movie_index, DEFAULT_MOVIE_INDEX_SECONDS);
    }

    #[test]
    fn recognized_keys_parse() {
        let raw = r#"
            [tmdb]
            scheme = "http"
            host = "tmdb.local"
            apiKey = "k1"

            [server]
            port = 9090

            [library]
            movie = "/data/movies"
            tv = "/data/tv"

            [manager.jobs]
            movieIndex = 60
            movieReconcile = 30
        "#;
        let cfg = Config::parse(raw).unwrap();
        assert_eq!(cfg.tmdb.host, "tmdb.local");
        assert_eq!(cfg.tmdb.api_key, "k1");
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.library.movie, "/data/movies");
        assert_eq!(cfg.manager.jobs.movie_index, 60);
        assert_eq!(cfg.manager.jobs.movie_reconcile, 30);
        // Unset loops keep defaults
        assert_eq!(cfg.manager.jobs.series_index, DEFAULT_SERIES_INDEX_SECONDS);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw = r#"
            somefuturekey = true

            [server]
            port = 7000
            tls = "someday"
        "#;
        let cfg = Config::parse(raw).unwrap();
        assert_eq!(cfg.server.port, 7000);
    }
}
