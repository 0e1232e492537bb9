// Movie index loop: refresh provider metadata for monitored movies and
// walk their early lifecycle by release date.

use crate::cancel::Cancel;
use crate::db::movie::{Movie, MovieFilter, NewMovieMetadata};
use crate::db::Store;
use crate::error::{MediarrError, Result};
use crate::machine::lifecycle::MovieState;
use crate::remote::MetadataProvider;

/// Refresh every monitored movie. Returns how many were refreshed.
pub fn run(store: &Store, metadata: &dyn MetadataProvider, cancel: &Cancel) -> Result<usize> {
    let movies = store.list_movies(
        &MovieFilter { monitored: Some(true), ..Default::default() },
        None,
        None,
    )?;

    let mut refreshed = 0usize;
    let mut failed = 0usize;
    let mut last_error = String::new();

    for movie in &movies {
        cancel.check()?;
        match index_movie(store, metadata, movie) {
            Ok(true) => refreshed += 1,
            Ok(false) => {}
            Err(e) if e.is_not_found() => {
                log::debug!("movie {} has no provider match, skipping", movie.id);
            }
            Err(e) => {
                log::warn!("indexing movie {} failed: {}", movie.id, e);
                last_error = e.to_string();
                failed += 1;
            }
        }
    }

    if failed > 0 && refreshed == 0 && !movies.is_empty() {
        return Err(MediarrError::Other(format!(
            "all {} movie lookups failed, last error: {}",
            failed, last_error
        )));
    }

    log::info!("movie index: {} refreshed, {} failed", refreshed, failed);
    Ok(refreshed)
}

/// Refresh one movie's metadata and advance its state. Movies without a
/// linked provider record are left for library import to resolve.
fn index_movie(store: &Store, metadata: &dyn MetadataProvider, movie: &Movie) -> Result<bool> {
    let metadata_id = match movie.movie_metadata_id {
        Some(id) => id,
        None => return Ok(false),
    };
    let current = store.get_movie_metadata(metadata_id)?;
    let remote = metadata.lookup_movie(current.tmdb_id)?;

    let linked_id = store.upsert_movie_metadata(&NewMovieMetadata {
        tmdb_id: remote.tmdb_id,
        title: remote.title,
        overview: remote.overview,
        poster_path: remote.poster_path,
        release_date: remote.release_date.clone(),
        runtime: remote.runtime,
    })?;
    if movie.movie_metadata_id != Some(linked_id) {
        store.link_movie_metadata(movie.id, linked_id)?;
    }

    advance_by_release(store, movie, remote.release_date.as_deref())?;
    Ok(true)
}

/// unreleased/missing movies with a file on disk surface as discovered;
/// unreleased movies whose release date has passed become missing.
fn advance_by_release(store: &Store, movie: &Movie, release_date: Option<&str>) -> Result<()> {
    if movie.movie_file_id.is_some()
        && matches!(movie.state, MovieState::Unreleased | MovieState::Missing)
    {
        return store.update_movie_state(movie.id, MovieState::Discovered, None);
    }
    if movie.state == MovieState::Unreleased && released(release_date) {
        return store.update_movie_state(movie.id, MovieState::Missing, None);
    }
    Ok(())
}

pub(crate) fn released(date: Option<&str>) -> bool {
    let date = match date.and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()) {
        Some(d) => d,
        None => return false,
    };
    date <= chrono::Local::now().date_naive()
}
