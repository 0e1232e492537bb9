// Series index loop: refresh provider metadata for monitored series, grow
// the season/episode tree the provider knows about, and walk early
// lifecycle states by air date.

use super::movie_index::released;
use crate::cancel::Cancel;
use crate::db::episode::{EpisodeFilter, NewEpisode, NewEpisodeMetadata};
use crate::db::season::{NewSeason, NewSeasonMetadata};
use crate::db::series::{NewSeriesMetadata, Series, SeriesFilter};
use crate::db::Store;
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::{EpisodeState, SeasonState, SeriesState};
use crate::remote::MetadataProvider;

pub fn run(store: &Store, metadata: &dyn MetadataProvider, cancel: &Cancel) -> Result<usize> {
    let series_list = store.list_series(
        &SeriesFilter { monitored: Some(true), ..Default::default() },
        None,
        None,
    )?;

    let mut refreshed = 0usize;
    let mut failed = 0usize;
    let mut last_error = String::new();

    for series in &series_list {
        cancel.check()?;
        match index_series(store, metadata, series, cancel) {
            Ok(true) => refreshed += 1,
            Ok(false) => {}
            Err(e) if e.is_not_found() => {
                log::debug!("series {} has no provider match, skipping", series.id);
            }
            Err(e) => {
                log::warn!("indexing series {} failed: {}", series.id, e);
                last_error = e.to_string();
                failed += 1;
            }
        }
    }

    if failed > 0 && refreshed == 0 && !series_list.is_empty() {
        return Err(MediarrError::Other(format!(
            "all {} series lookups failed, last error: {}",
            failed, last_error
        )));
    }

    log::info!("series index: {} refreshed, {} failed", refreshed, failed);
    Ok(refreshed)
}

fn index_series(
    store: &Store,
    metadata: &dyn MetadataProvider,
    series: &Series,
    cancel: &Cancel,
) -> Result<bool> {
    let metadata_id = match series.series_metadata_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let current = store.get_series_metadata(metadata_id)?;
    let remote = metadata.lookup_series(current.tmdb_id)?;

    let linked_id = store.upsert_series_metadata(&NewSeriesMetadata {
        tmdb_id: remote.tmdb_id,
        title: remote.title,
        overview: remote.overview,
        poster_path: remote.poster_path,
        first_air_date: remote.first_air_date.clone(),
        season_count: remote.season_count,
    })?;
    if series.series_metadata_id != Some(linked_id) {
        store.link_series_metadata(series.id, linked_id)?;
    }

    // Grow the season tree to what the provider reports.
    for season_number in 1..=remote.season_count {
        cancel.check()?;
        if store.get_season_by_number(series.id, season_number).is_ok() {
            continue;
        }
        if let Err(e) = index_season(store, metadata, series, current.tmdb_id, season_number) {
            if e.is_not_found() {
                continue;
            }
            return Err(e);
        }
    }

    // Grow episodes under every season that has metadata.
    for season in store.list_seasons(series.id)? {
        cancel.check()?;
        let season_meta_id = match season.season_metadata_id {
            Some(id) => id,
            None => continue,
        };
        let season_meta = store.get_season_metadata(season_meta_id)?;
        for episode_number in 1..=season_meta.episode_count {
            if store.get_episode_by_number(season.id, episode_number).is_ok() {
                continue;
            }
            if let Err(e) =
                index_episode(store, metadata, season.id, season_meta.tmdb_id, episode_number)
            {
                if e.is_not_found() {
                    continue;
                }
                return Err(e);
            }
        }
    }

    if series.state == SeriesState::Unreleased && released(remote.first_air_date.as_deref()) {
        store.update_series_state(series.id, SeriesState::Missing, None)?;
    }

    Ok(true)
}

fn index_season(
    store: &Store,
    metadata: &dyn MetadataProvider,
    series: &Series,
    series_tmdb_id: i64,
    season_number: i64,
) -> Result<()> {
    let remote = metadata.lookup_season(series_tmdb_id, season_number)?;
    let metadata_id = store.upsert_season_metadata(&NewSeasonMetadata {
        tmdb_id: remote.tmdb_id,
        title: remote.title,
        overview: remote.overview,
        poster_path: remote.poster_path,
        air_date: remote.air_date.clone(),
        episode_count: remote.episode_count,
    })?;
    let initial = if released(remote.air_date.as_deref()) {
        SeasonState::Missing
    } else {
        SeasonState::Unreleased
    };
    store.create_season(
        &NewSeason {
            series_id: series.id,
            season_number,
            monitored: series.monitored,
            season_metadata_id: Some(metadata_id),
            ..Default::default()
        },
        initial,
    )?;
    Ok(())
}

fn index_episode(
    store: &Store,
    metadata: &dyn MetadataProvider,
    season_id: i64,
    season_tmdb_id: i64,
    episode_number: i64,
) -> Result<()> {
    let remote = metadata.lookup_episode(season_tmdb_id, episode_number)?;
    let metadata_id = store.upsert_episode_metadata(&NewEpisodeMetadata {
        tmdb_id: remote.tmdb_id,
        title: remote.title,
        overview: remote.overview,
        air_date: remote.air_date.clone(),
        runtime: remote.runtime,
    })?;
    let initial = if released(remote.air_date.as_deref()) {
        EpisodeState::Missing
    } else {
        EpisodeState::Unreleased
    };
    store.create_episode(
        &NewEpisode {
            season_id,
            episode_number,
            monitored: true,
            episode_metadata_id: Some(metadata_id),
            ..Default::default()
        },
        initial,
    )?;
    Ok(())
}

/// Unreleased episodes whose air date has arrived become missing. Runs as
/// part of the index pass so reconcile sees them.
pub fn promote_aired_episodes(store: &Store, cancel: &Cancel) -> Result<usize> {
    let unreleased = store.list_episodes(&EpisodeFilter {
        state: Some(EpisodeState::Unreleased),
        ..Default::default()
    })?;
    let mut promoted = 0usize;
    for episode in unreleased {
        cancel.check()?;
        let metadata_id = match episode.episode_metadata_id {
            Some(id) => id,
            None => continue,
        };
        let air_date = store.get_episode_metadata(metadata_id)?.air_date;
        if released(air_date.as_deref()) {
            store.update_episode_state(episode.id, EpisodeState::Missing, None)?;
            promoted += 1;
        }
    }
    Ok(promoted)
}
