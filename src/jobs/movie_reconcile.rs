// Movie reconcile loop: poll in-flight downloads to completion, then grab
// releases for missing movies through the configured download client.

use super::quality::{select_release, should_search};
use crate::cancel::Cancel;
use crate::db::movie::{Movie, MovieFilter, NewMovieFile};
use crate::db::stats::DownloadingMovie;
use crate::db::{Store, TransitionMeta};
use crate::error::Result;
use crate::machine::lifecycle::MovieState;
use crate::remote::{DownloadClient, DownloadState, IndexerSearch};

pub fn run(
    store: &Store,
    indexers: &dyn IndexerSearch,
    downloads: &dyn DownloadClient,
    cancel: &Cancel,
) -> Result<usize> {
    let mut actions = 0usize;

    // Finish what is already in flight before grabbing more.
    for view in store.list_downloading_movies(cancel)? {
        cancel.check()?;
        match poll_download(store, downloads, &view) {
            Ok(true) => actions += 1,
            Ok(false) => {}
            Err(e) => log::warn!("polling movie {} failed: {}", view.movie_id, e),
        }
    }

    let clients = store.list_download_clients()?;
    let client_id = match clients.first() {
        Some(client) => client.id,
        None => {
            log::info!("no download client configured, skipping movie grabs");
            return Ok(actions);
        }
    };

    let missing = store.list_movies(
        &MovieFilter { state: Some(MovieState::Missing), monitored: Some(true) },
        None,
        None,
    )?;
    for movie in &missing {
        cancel.check()?;
        match grab_movie(store, indexers, downloads, client_id, movie) {
            Ok(true) => actions += 1,
            Ok(false) => {}
            Err(e) => log::warn!("grabbing movie {} failed: {}", movie.id, e),
        }
    }

    Ok(actions)
}

/// Search the indexers for a missing movie and hand the best acceptable
/// release to the download client.
fn grab_movie(
    store: &Store,
    indexers: &dyn IndexerSearch,
    downloads: &dyn DownloadClient,
    client_id: i64,
    movie: &Movie,
) -> Result<bool> {
    let profile_id = match movie.quality_profile_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let profile = store.get_quality_profile(profile_id)?;

    let current_quality = match movie.movie_file_id {
        Some(file_id) => store.get_movie_file(file_id)?.quality,
        None => None,
    };
    if !should_search(&profile, current_quality.as_deref()) {
        return Ok(false);
    }

    let query = match movie.movie_metadata_id {
        Some(metadata_id) => store.get_movie_metadata(metadata_id)?.title,
        None => movie.path.clone(),
    };
    let releases = indexers.search(&query, crate::constants::MEDIA_TYPE_MOVIE)?;
    let pick = match select_release(&profile, &releases) {
        Some(release) => release,
        None => return Ok(false),
    };

    let download_id = downloads.submit(&pick.download_uri)?;
    store.update_movie_state(
        movie.id,
        MovieState::Downloading,
        Some(&TransitionMeta::download(client_id, &download_id).with_quality(&pick.quality)),
    )?;
    log::info!("movie {} grabbed as {} ({})", movie.id, download_id, pick.title);
    Ok(true)
}

/// Poll one in-flight movie; on completion record the file and mark the
/// movie downloaded.
fn poll_download(
    store: &Store,
    downloads: &dyn DownloadClient,
    view: &DownloadingMovie,
) -> Result<bool> {
    let download_id = match &view.download_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let status = downloads.status(download_id)?;
    match status.state {
        DownloadState::Completed => {
            let output = status.output_path.unwrap_or_else(|| download_id.clone());
            // The grab recorded the release's quality on the downloading
            // transition row; the file row inherits it so the cutoff rule
            // keeps holding after completion.
            let file_id = store.create_movie_file(&NewMovieFile {
                relative_path: output.clone(),
                absolute_path: Some(output),
                size: 0,
                quality: view.quality.clone(),
            })?;
            store.update_movie_file_id(view.movie_id, Some(file_id))?;
            store.update_movie_state(view.movie_id, MovieState::Downloaded, None)?;
            Ok(true)
        }
        DownloadState::Failed => {
            log::warn!("download {} for movie {} failed", download_id, view.movie_id);
            Ok(false)
        }
        _ => Ok(false),
    }
}
