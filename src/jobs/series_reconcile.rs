// Series reconcile loop: poll in-flight episode downloads, grab releases
// for missing episodes, and propagate completion upward through seasons
// and series.

use super::quality::{select_release, should_search};
use crate::cancel::Cancel;
use crate::db::episode::{Episode, EpisodeFilter, NewEpisodeFile};
use crate::db::{Store, TransitionMeta};
use crate::error::Result;
use crate::machine::lifecycle::{EpisodeState, SeasonState, SeriesState};
use crate::remote::{DownloadClient, DownloadState, IndexerSearch};

pub fn run(
    store: &Store,
    indexers: &dyn IndexerSearch,
    downloads: &dyn DownloadClient,
    cancel: &Cancel,
) -> Result<usize> {
    let mut actions = 0usize;

    // Poll in-flight episodes first.
    let downloading = store.list_episodes(&EpisodeFilter {
        state: Some(EpisodeState::Downloading),
        ..Default::default()
    })?;
    for episode in &downloading {
        cancel.check()?;
        match poll_download(store, downloads, episode) {
            Ok(true) => actions += 1,
            Ok(false) => {}
            Err(e) => log::warn!("polling episode {} failed: {}", episode.id, e),
        }
    }

    let clients = store.list_download_clients()?;
    let client_id = clients.first().map(|c| c.id);

    if let Some(client_id) = client_id {
        let missing = store.list_episodes(&EpisodeFilter {
            state: Some(EpisodeState::Missing),
            monitored: Some(true),
            ..Default::default()
        })?;
        for episode in &missing {
            cancel.check()?;
            match grab_episode(store, indexers, downloads, client_id, episode) {
                Ok(true) => actions += 1,
                Ok(false) => {}
                Err(e) => log::warn!("grabbing episode {} failed: {}", episode.id, e),
            }
        }
    } else {
        log::info!("no download client configured, skipping episode grabs");
    }

    actions += propagate_completion(store, cancel)?;
    Ok(actions)
}

/// Search the indexers for one missing episode and submit the best
/// acceptable release. The owning season and series follow the episode
/// into downloading where their machines allow it.
fn grab_episode(
    store: &Store,
    indexers: &dyn IndexerSearch,
    downloads: &dyn DownloadClient,
    client_id: i64,
    episode: &Episode,
) -> Result<bool> {
    let season = store.get_season(episode.season_id)?;
    let series = store.get_series(season.series_id)?;
    if !series.monitored || !season.monitored {
        return Ok(false);
    }

    let profile_id = match series.quality_profile_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let profile = store.get_quality_profile(profile_id)?;

    let current_quality = match episode.episode_file_id {
        Some(file_id) => store.get_episode_file(file_id)?.quality,
        None => None,
    };
    if !should_search(&profile, current_quality.as_deref()) {
        return Ok(false);
    }

    let series_title = match series.series_metadata_id {
        Some(metadata_id) => store.get_series_metadata(metadata_id)?.title,
        None => series.path.clone(),
    };
    let query = format!(
        "{} S{:02}E{:02}",
        series_title, season.season_number, episode.episode_number
    );
    let releases = indexers.search(&query, crate::constants::MEDIA_TYPE_TV)?;
    let pick = match select_release(&profile, &releases) {
        Some(release) => release,
        None => return Ok(false),
    };

    let download_id = downloads.submit(&pick.download_uri)?;
    let meta = TransitionMeta::download(client_id, &download_id).with_quality(&pick.quality);
    store.update_episode_state(episode.id, EpisodeState::Downloading, Some(&meta))?;

    // Pull the parents along when their machines allow it.
    if season.state == SeasonState::Missing {
        store.update_season_state(season.id, SeasonState::Downloading, Some(&meta))?;
    }
    if series.state == SeriesState::Missing {
        store.update_series_state(series.id, SeriesState::Downloading, Some(&meta))?;
    }

    log::info!("episode {} grabbed as {} ({})", episode.id, download_id, pick.title);
    Ok(true)
}

/// Poll one in-flight episode; on completion record the file and walk the
/// episode through downloaded to completed.
fn poll_download(
    store: &Store,
    downloads: &dyn DownloadClient,
    episode: &Episode,
) -> Result<bool> {
    let download_id = match &episode.download_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let status = downloads.status(download_id)?;
    match status.state {
        DownloadState::Completed => {
            let output = status.output_path.unwrap_or_else(|| download_id.clone());
            // The grabbed release's quality travels on the downloading
            // transition row and lands on the file, so the cutoff rule
            // keeps holding after completion.
            let file_id = store.create_episode_file(&NewEpisodeFile {
                relative_path: output.clone(),
                absolute_path: Some(output),
                size: 0,
                quality: episode.download_quality.clone(),
            })?;
            store.update_episode_file_id(episode.id, Some(file_id))?;
            store.update_episode_state(episode.id, EpisodeState::Downloaded, None)?;
            store.update_episode_state(episode.id, EpisodeState::Completed, None)?;
            Ok(true)
        }
        DownloadState::Failed => {
            log::warn!("download {} for episode {} failed", download_id, episode.id);
            Ok(false)
        }
        _ => Ok(false),
    }
}

/// Once every episode of a season is completed the season completes, and
/// once every season of a series is completed the series completes. States
/// that cannot reach completed directly step through downloading first.
pub fn propagate_completion(store: &Store, cancel: &Cancel) -> Result<usize> {
    let mut advanced = 0usize;

    let series_list = store.list_series(&Default::default(), None, None)?;
    for series in &series_list {
        cancel.check()?;
        let seasons = store.list_seasons(series.id)?;
        if seasons.is_empty() {
            continue;
        }

        for season in &seasons {
            if season.state == SeasonState::Completed {
                continue;
            }
            let episodes = store.list_episodes(&EpisodeFilter {
                season_id: Some(season.id),
                ..Default::default()
            })?;
            if episodes.is_empty() {
                continue;
            }
            if episodes.iter().all(|e| e.state == EpisodeState::Completed)
                && complete_season(store, season.id, season.state)?
            {
                advanced += 1;
            }
        }

        let seasons = store.list_seasons(series.id)?;
        if series.state != SeriesState::Completed
            && seasons.iter().all(|s| s.state == SeasonState::Completed)
            && complete_series(store, series.id, series.state)?
        {
            advanced += 1;
        }
    }

    Ok(advanced)
}

fn complete_season(store: &Store, id: i64, mut state: SeasonState) -> Result<bool> {
    loop {
        let next = match state {
            SeasonState::Missing => SeasonState::Downloading,
            SeasonState::Unreleased => SeasonState::Missing,
            SeasonState::Downloading
            | SeasonState::Continuing
            | SeasonState::Discovered => SeasonState::Completed,
            SeasonState::Completed => return Ok(true),
            SeasonState::New => return Ok(false),
        };
        store.update_season_state(id, next, None)?;
        state = next;
    }
}

fn complete_series(store: &Store, id: i64, mut state: SeriesState) -> Result<bool> {
    loop {
        let next = match state {
            SeriesState::Missing => SeriesState::Downloading,
            SeriesState::Unreleased => SeriesState::Missing,
            SeriesState::Downloading
            | SeriesState::Continuing
            | SeriesState::Discovered => SeriesState::Completed,
            SeriesState::Completed => return Ok(true),
            SeriesState::New => return Ok(false),
        };
        store.update_series_state(id, next, None)?;
        state = next;
    }
}
