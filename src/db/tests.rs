// Store tests over an in-memory database with all migrations applied.

use super::client::NewDownloadClient;
use super::episode::NewEpisode;
use super::movie::{NewMovie, NewMovieMetadata};
use super::quality::NewQualityProfile;
use super::season::NewSeason;
use super::series::NewSeries;
use super::{migrations, Store, TransitionMeta};
use crate::cancel::Cancel;
use crate::error::MediarrError;
use crate::machine::lifecycle::{EpisodeState, JobState, MovieState, SeasonState, SeriesState};

fn test_store() -> Store {
    Store::open_in_memory().unwrap()
}

fn new_movie(path: &str) -> NewMovie {
    NewMovie {
        path: path.to_string(),
        monitored: true,
        quality_profile_id: Some(1),
        ..Default::default()
    }
}

fn add_download_clients(store: &Store, count: usize) {
    for n in 1..=count {
        store
            .create_download_client(&NewDownloadClient {
                name: format!("client-{}", n),
                implementation: "transmission".to_string(),
                scheme: "http".to_string(),
                host: "localhost".to_string(),
                port: 9091,
                api_key: None,
            })
            .unwrap();
    }
}

// ---------------------------------------------------------------
// Creation, retrieval, and the seed transition row
// ---------------------------------------------------------------

#[test]
fn create_then_get_round_trips() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/alpha"), MovieState::Missing).unwrap();
    assert!(id >= 1);

    let movie = store.get_movie(id).unwrap();
    assert_eq!(movie.path, "/m/alpha");
    assert_eq!(movie.state, MovieState::Missing);
    assert!(movie.monitored);
    assert_eq!(movie.quality_profile_id, Some(1));
    assert_eq!(movie.download_id, None);

    let log = store.movie_transitions(id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sort_key, 1);
    assert_eq!(log[0].from_state, None);
    assert_eq!(log[0].to_state, "missing");
    assert!(log[0].most_recent);
}

#[test]
fn create_rejects_unreachable_initial_state() {
    let store = test_store();
    let err = store.create_movie(&new_movie("/m/x"), MovieState::Downloaded).unwrap_err();
    assert!(matches!(err, MediarrError::InvalidTransition(_)));
    // nothing persisted
    assert!(store.get_movie_by_path("/m/x").is_err());
}

#[test]
fn create_with_explicit_id_upserts() {
    let store = test_store();
    let mut movie = new_movie("/m/keyed");
    movie.id = 42;
    let id = store.create_movie(&movie, MovieState::Missing).unwrap();
    assert_eq!(id, 42);

    // Re-create over the same key replaces mutable columns and keeps the
    // transition log monotone.
    movie.path = "/m/keyed-moved".to_string();
    store.create_movie(&movie, MovieState::Discovered).unwrap();
    let fetched = store.get_movie(42).unwrap();
    assert_eq!(fetched.path, "/m/keyed-moved");
    assert_eq!(fetched.state, MovieState::Discovered);

    let log = store.movie_transitions(42).unwrap();
    let recent: Vec<_> = log.iter().filter(|t| t.most_recent).collect();
    assert_eq!(recent.len(), 1);
    assert_eq!(log.last().unwrap().sort_key, log.len() as i64);
}

#[test]
fn get_missing_movie_is_not_found() {
    let store = test_store();
    assert!(matches!(store.get_movie(999), Err(MediarrError::NotFound(_))));
    assert!(matches!(
        store.update_movie_state(999, MovieState::Discovered, None),
        Err(MediarrError::NotFound(_))
    ));
}

// ---------------------------------------------------------------
// S1 / S2: transitions and the append-only log
// ---------------------------------------------------------------

#[test]
fn s1_movie_happy_path() {
    let store = test_store();
    add_download_clients(&store, 2);
    let id = store.create_movie(&new_movie("/m/T"), MovieState::Missing).unwrap();

    let meta = TransitionMeta {
        download_client_id: Some(2),
        download_id: Some("dl-1".to_string()),
        ..Default::default()
    };
    store.update_movie_state(id, MovieState::Downloading, Some(&meta)).unwrap();
    store.update_movie_state(id, MovieState::Downloaded, None).unwrap();

    let movie = store.get_movie(id).unwrap();
    assert_eq!(movie.state, MovieState::Downloaded);

    let log = store.movie_transitions(id).unwrap();
    assert_eq!(log.len(), 3);

    assert_eq!(log[0].sort_key, 1);
    assert_eq!(log[0].to_state, "missing");
    assert!(!log[0].most_recent);

    assert_eq!(log[1].sort_key, 2);
    assert_eq!(log[1].from_state.as_deref(), Some("missing"));
    assert_eq!(log[1].to_state, "downloading");
    assert_eq!(log[1].download_id.as_deref(), Some("dl-1"));
    assert_eq!(log[1].download_client_id, Some(2));
    assert!(!log[1].most_recent);

    assert_eq!(log[2].sort_key, 3);
    assert_eq!(log[2].from_state.as_deref(), Some("downloading"));
    assert_eq!(log[2].to_state, "downloaded");
    assert!(log[2].most_recent);
}

#[test]
fn s2_illegal_transition_changes_nothing() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/T"), MovieState::Missing).unwrap();

    let err = store.update_movie_state(id, MovieState::Downloaded, None).unwrap_err();
    assert!(matches!(err, MediarrError::InvalidTransition(_)));

    let movie = store.get_movie(id).unwrap();
    assert_eq!(movie.state, MovieState::Missing);
    let log = store.movie_transitions(id).unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].most_recent);
}

#[test]
fn entity_state_matches_most_recent_transition() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/r"), MovieState::Unreleased).unwrap();
    store.update_movie_state(id, MovieState::Missing, None).unwrap();
    store.update_movie_state(id, MovieState::Downloading, None).unwrap();

    let (entity_state, log_state): (String, String) = store
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT m.state, t.to_state FROM movie m
                 JOIN movie_transition t ON t.movie_id = m.id AND t.most_recent = 1
                 WHERE m.id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!(entity_state, log_state);
    assert_eq!(entity_state, "downloading");
}

#[test]
fn sort_keys_are_contiguous_with_unique_most_recent() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/mono"), MovieState::Unreleased).unwrap();
    store.update_movie_state(id, MovieState::Missing, None).unwrap();
    store.update_movie_state(id, MovieState::Discovered, None).unwrap();

    let log = store.movie_transitions(id).unwrap();
    for (n, row) in log.iter().enumerate() {
        assert_eq!(row.sort_key, n as i64 + 1);
    }
    let recent: Vec<_> = log.iter().filter(|t| t.most_recent).collect();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].sort_key, log.len() as i64);
}

#[test]
fn every_logged_edge_is_legal() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/legal"), MovieState::Unreleased).unwrap();
    store.update_movie_state(id, MovieState::Missing, None).unwrap();
    store.update_movie_state(id, MovieState::Downloading, None).unwrap();
    store.update_movie_state(id, MovieState::Downloaded, None).unwrap();

    for row in store.movie_transitions(id).unwrap() {
        if let Some(from) = row.from_state.as_deref() {
            let from = MovieState::parse(from).unwrap();
            let to = MovieState::parse(&row.to_state).unwrap();
            assert!(from.machine().can_transition(to).is_ok(), "{} -> {}", from, to);
        }
    }
}

// ---------------------------------------------------------------
// Deletion and cascades
// ---------------------------------------------------------------

#[test]
fn delete_movie_cascades_to_log() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/del"), MovieState::Missing).unwrap();
    store.update_movie_state(id, MovieState::Downloading, None).unwrap();

    store.delete_movie(id).unwrap();
    assert!(matches!(store.get_movie(id), Err(MediarrError::NotFound(_))));

    let remaining: i64 = store
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM movie_transition WHERE movie_id = ?1",
                [id],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn delete_series_cascades_through_children() {
    let store = test_store();
    let series_id = store
        .create_series(
            &NewSeries { path: "/tv/show".to_string(), monitored: true, ..Default::default() },
            SeriesState::Missing,
        )
        .unwrap();
    let season_id = store
        .create_season(
            &NewSeason { series_id, season_number: 1, monitored: true, ..Default::default() },
            SeasonState::Missing,
        )
        .unwrap();
    let episode_id = store
        .create_episode(
            &NewEpisode { season_id, episode_number: 1, monitored: true, ..Default::default() },
            EpisodeState::Missing,
        )
        .unwrap();

    store.delete_series(series_id).unwrap();
    assert!(store.get_season(season_id).is_err());
    assert!(store.get_episode(episode_id).is_err());

    let orphans: i64 = store
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT (SELECT COUNT(*) FROM season_transition WHERE season_id = ?1)
                      + (SELECT COUNT(*) FROM episode_transition WHERE episode_id = ?2)",
                [season_id, episode_id],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(orphans, 0);
}

// ---------------------------------------------------------------
// Scalar setters bypass the machine and the log
// ---------------------------------------------------------------

#[test]
fn setters_do_not_touch_the_log() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/set"), MovieState::Missing).unwrap();

    let file_id = store
        .create_movie_file(&super::movie::NewMovieFile {
            relative_path: "alpha.mkv".to_string(),
            size: 1_000_000,
            quality: Some("WEBDL-1080p".to_string()),
            ..Default::default()
        })
        .unwrap();
    store.update_movie_file_id(id, Some(file_id)).unwrap();
    store.update_movie_quality_profile(id, 1).unwrap();

    let metadata_id = store
        .upsert_movie_metadata(&NewMovieMetadata {
            tmdb_id: 603,
            title: "The Matrix".to_string(),
            ..Default::default()
        })
        .unwrap();
    store.link_movie_metadata(id, metadata_id).unwrap();

    let movie = store.get_movie(id).unwrap();
    assert_eq!(movie.movie_file_id, Some(file_id));
    assert_eq!(movie.movie_metadata_id, Some(metadata_id));
    assert_eq!(store.movie_transitions(id).unwrap().len(), 1);
}

#[test]
fn movie_file_detaches_and_deletes() {
    let store = test_store();
    let id = store.create_movie(&new_movie("/m/file"), MovieState::Missing).unwrap();
    let file_id = store
        .create_movie_file(&super::movie::NewMovieFile {
            relative_path: "a.mkv".to_string(),
            ..Default::default()
        })
        .unwrap();
    store.update_movie_file_id(id, Some(file_id)).unwrap();
    store.update_movie_file_id(id, None).unwrap();
    store.delete_movie_file(file_id).unwrap();
    assert!(store.get_movie_file(file_id).is_err());
    assert_eq!(store.get_movie(id).unwrap().movie_file_id, None);
}

// ---------------------------------------------------------------
// Metadata upsert keyed by provider id
// ---------------------------------------------------------------

#[test]
fn metadata_upsert_is_keyed_by_external_id() {
    let store = test_store();
    let first = store
        .upsert_movie_metadata(&NewMovieMetadata {
            tmdb_id: 550,
            title: "Fight Club".to_string(),
            runtime: Some(139),
            ..Default::default()
        })
        .unwrap();
    let second = store
        .upsert_movie_metadata(&NewMovieMetadata {
            tmdb_id: 550,
            title: "Fight Club (Remastered)".to_string(),
            runtime: Some(139),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(first, second);
    let metadata = store.get_movie_metadata(first).unwrap();
    assert_eq!(metadata.title, "Fight Club (Remastered)");
    assert_eq!(store.get_movie_metadata_by_tmdb_id(550).unwrap().id, first);
}

// ---------------------------------------------------------------
// Jobs: S3 / S4 and ordering
// ---------------------------------------------------------------

#[test]
fn s3_duplicate_pending_job_is_rejected() {
    let store = test_store();
    let first = store.create_job("MovieIndex", JobState::Pending).unwrap();
    assert!(first >= 1);

    let err = store.create_job("MovieIndex", JobState::Pending).unwrap_err();
    assert!(matches!(err, MediarrError::JobAlreadyPending(_)));

    assert_eq!(store.get_job(first).unwrap().state, JobState::Pending);
    // A different type is unaffected.
    store.create_job("SeriesIndex", JobState::Pending).unwrap();
}

#[test]
fn racing_submissions_produce_exactly_one_pending_job() {
    let store = test_store();
    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| store.create_job("MovieIndex", JobState::Pending)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let created = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(created, 1);
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert!(matches!(e, MediarrError::JobAlreadyPending(_)));
        }
    }

    let pending = store
        .list_jobs(&super::job::JobFilter {
            state: Some(JobState::Pending),
            job_type: Some("MovieIndex".to_string()),
        })
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[test]
fn pending_uniqueness_clears_once_accepted() {
    let store = test_store();
    let first = store.create_job("MovieIndex", JobState::Pending).unwrap();
    store.update_job_state(first, JobState::Running, None).unwrap();
    // The old run is no longer pending, so a new submission is allowed.
    store.create_job("MovieIndex", JobState::Pending).unwrap();
}

#[test]
fn s4_job_full_lifecycle_records_error() {
    let store = test_store();
    let id = store.create_job("MovieReconcile", JobState::Pending).unwrap();
    store.update_job_state(id, JobState::Running, None).unwrap();
    store.update_job_state(id, JobState::Error, Some("boom")).unwrap();

    let job = store.get_job(id).unwrap();
    assert_eq!(job.state, JobState::Error);
    assert_eq!(job.error.as_deref(), Some("boom"));

    let log = store.job_transitions(id).unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[2].error.as_deref(), Some("boom"));
    assert_eq!(log[0].error, None);
}

#[test]
fn jobs_list_oldest_first() {
    let store = test_store();
    let a = store.create_job("MovieIndex", JobState::Pending).unwrap();
    let b = store.create_job("SeriesIndex", JobState::Pending).unwrap();
    let c = store.create_job("MovieReconcile", JobState::Pending).unwrap();

    let ids: Vec<i64> = store
        .list_jobs(&super::job::JobFilter::default())
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(ids, vec![a, b, c]);

    let pending = store
        .list_jobs(&super::job::JobFilter {
            state: Some(JobState::Pending),
            job_type: Some("SeriesIndex".to_string()),
        })
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, b);
}

// ---------------------------------------------------------------
// Quality profiles and referential checks
// ---------------------------------------------------------------

#[test]
fn seeded_defaults_are_usable() {
    let store = test_store();
    let definitions = store.list_quality_definitions(None).unwrap();
    assert_eq!(definitions.len(), 8);
    let tv = store.list_quality_definitions(Some("tv")).unwrap();
    assert!(tv.iter().all(|d| d.media_type == "tv"));
    assert!(!tv.is_empty());

    let profile = store.get_quality_profile(1).unwrap();
    assert_eq!(profile.name, "Any");
    assert_eq!(profile.items.len(), 8);
    assert_eq!(profile.cutoff_quality_id, None);
    assert!(!profile.upgrade_allowed);
}

#[test]
fn profile_references_must_exist() {
    let store = test_store();
    let err = store
        .create_quality_profile(&NewQualityProfile {
            name: "bad cutoff".to_string(),
            cutoff_quality_id: Some(999),
            quality_definition_ids: vec![1],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, MediarrError::NotFound(_)));

    let err = store
        .create_quality_profile(&NewQualityProfile {
            name: "bad item".to_string(),
            quality_definition_ids: vec![1, 999],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, MediarrError::NotFound(_)));
    // the failed creates rolled back entirely
    assert_eq!(store.list_quality_profiles().unwrap().len(), 1);

    store
        .create_quality_profile(&NewQualityProfile {
            name: "HD".to_string(),
            cutoff_quality_id: Some(5),
            upgrade_allowed: true,
            quality_definition_ids: vec![2, 5, 7],
        })
        .unwrap();
    let profile = store.get_quality_profile(2).unwrap();
    assert_eq!(profile.items.iter().map(|d| d.id).collect::<Vec<_>>(), vec![2, 5, 7]);
}

// ---------------------------------------------------------------
// Indexers and download clients
// ---------------------------------------------------------------

#[test]
fn indexers_list_by_priority_desc() {
    let store = test_store();
    store
        .create_indexer(&super::client::NewIndexer {
            name: "low".to_string(),
            uri: "http://low".to_string(),
            priority: 1,
            ..Default::default()
        })
        .unwrap();
    store
        .create_indexer(&super::client::NewIndexer {
            name: "high".to_string(),
            uri: "http://high".to_string(),
            priority: 50,
            ..Default::default()
        })
        .unwrap();
    let names: Vec<String> =
        store.list_indexers().unwrap().into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["high", "low"]);
}

#[test]
fn indexer_sources_cascade_with_indexer() {
    let store = test_store();
    let indexer_id = store
        .create_indexer(&super::client::NewIndexer {
            name: "nyaa".to_string(),
            uri: "http://idx".to_string(),
            ..Default::default()
        })
        .unwrap();
    store.create_indexer_source(indexer_id, "movies", "movie").unwrap();
    store.create_indexer_source(indexer_id, "tv", "tv").unwrap();
    assert_eq!(store.list_indexer_sources(indexer_id).unwrap().len(), 2);
    store.delete_indexer(indexer_id).unwrap();
    assert!(store.list_indexer_sources(indexer_id).unwrap().is_empty());
}

// ---------------------------------------------------------------
// S5: stats aggregation
// ---------------------------------------------------------------

#[test]
fn s5_stats_bucket_by_current_state() {
    let store = test_store();
    let cancel = Cancel::new();
    let a = store.create_movie(&new_movie("/m/a"), MovieState::Missing).unwrap();
    let b = store.create_movie(&new_movie("/m/b"), MovieState::Missing).unwrap();
    let c = store.create_movie(&new_movie("/m/c"), MovieState::Missing).unwrap();

    store.update_movie_state(a, MovieState::Discovered, None).unwrap();
    store.update_movie_state(b, MovieState::Discovered, None).unwrap();
    store.update_movie_state(c, MovieState::Downloading, None).unwrap();

    let stats = store.library_stats(&cancel).unwrap();
    assert_eq!(stats.movies.total, 3);
    assert_eq!(stats.movies.by_state.get("discovered"), Some(&2));
    assert_eq!(stats.movies.by_state.get("downloading"), Some(&1));
    assert_eq!(stats.movies.by_state.get("missing"), None);
    assert_eq!(stats.tv.total, 0);
}

#[test]
fn downloading_view_joins_client() {
    let store = test_store();
    let cancel = Cancel::new();
    add_download_clients(&store, 1);
    let id = store.create_movie(&new_movie("/m/dl"), MovieState::Missing).unwrap();
    store
        .update_movie_state(
            id,
            MovieState::Downloading,
            Some(&TransitionMeta::download(1, "dl-9")),
        )
        .unwrap();

    let views = store.list_downloading_movies(&cancel).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].download_id.as_deref(), Some("dl-9"));
    let client = views[0].download_client.as_ref().unwrap();
    assert_eq!(client.name, "client-1");

    // A grab with no recorded client is still listed.
    let bare = store.create_movie(&new_movie("/m/dl2"), MovieState::Missing).unwrap();
    store.update_movie_state(bare, MovieState::Downloading, None).unwrap();
    let views = store.list_downloading_movies(&cancel).unwrap();
    assert_eq!(views.len(), 2);
    assert!(views[1].download_client.is_none());
}

#[test]
fn job_views_filter_running_and_recent_errors() {
    let store = test_store();
    let cancel = Cancel::new();
    let running = store.create_job("MovieIndex", JobState::Pending).unwrap();
    store.update_job_state(running, JobState::Running, None).unwrap();

    let errored = store.create_job("SeriesIndex", JobState::Pending).unwrap();
    store.update_job_state(errored, JobState::Running, None).unwrap();
    store.update_job_state(errored, JobState::Error, Some("indexer timeout")).unwrap();

    let running_views = store.list_running_jobs(&cancel).unwrap();
    assert_eq!(running_views.len(), 1);
    assert_eq!(running_views[0].job_id, running);

    let error_views = store.list_error_jobs(&cancel, 24).unwrap();
    assert_eq!(error_views.len(), 1);
    assert_eq!(error_views[0].error.as_deref(), Some("indexer timeout"));
}

// ---------------------------------------------------------------
// Timeline and per-entity history
// ---------------------------------------------------------------

#[test]
fn timeline_buckets_by_local_day() {
    let store = test_store();
    let cancel = Cancel::new();
    let id = store.create_movie(&new_movie("/m/tl"), MovieState::Missing).unwrap();
    store.update_movie_state(id, MovieState::Downloading, None).unwrap();
    store.update_movie_state(id, MovieState::Downloaded, None).unwrap();

    let job = store.create_job("MovieIndex", JobState::Pending).unwrap();
    store.update_job_state(job, JobState::Running, None).unwrap();
    store.update_job_state(job, JobState::Done, None).unwrap();

    let today = chrono::Local::now().date_naive();
    let timeline = store.transitions_by_date(&cancel, today, today, 0, 10).unwrap();

    assert_eq!(timeline.days.len(), 1);
    let bucket = &timeline.days[0];
    assert_eq!(bucket.day, today.format("%Y-%m-%d").to_string());
    assert_eq!(bucket.downloading, 1);
    assert_eq!(bucket.downloaded, 1);
    assert_eq!(bucket.done, 1);
    assert_eq!(bucket.error, 0);

    // movie seed + 2 moves, job seed + 2 moves
    assert_eq!(timeline.total, 6);
    assert_eq!(timeline.recent.len(), 6);

    // pagination applies to the recent list only
    let page = store.transitions_by_date(&cancel, today, today, 0, 2).unwrap();
    assert_eq!(page.recent.len(), 2);
    assert_eq!(page.total, 6);

    // an empty window has no buckets
    let tomorrow = today.succ_opt().unwrap();
    let empty = store.transitions_by_date(&cancel, tomorrow, tomorrow, 0, 10).unwrap();
    assert!(empty.days.is_empty());
    assert_eq!(empty.total, 0);
}

#[test]
fn entity_history_includes_header() {
    let store = test_store();
    let cancel = Cancel::new();
    let metadata_id = store
        .upsert_movie_metadata(&NewMovieMetadata {
            tmdb_id: 27205,
            title: "Inception".to_string(),
            poster_path: Some("/inception.jpg".to_string()),
            ..Default::default()
        })
        .unwrap();
    let mut movie = new_movie("/m/inception");
    movie.movie_metadata_id = Some(metadata_id);
    let id = store.create_movie(&movie, MovieState::Missing).unwrap();
    store.update_movie_state(id, MovieState::Downloading, None).unwrap();

    let history = store.entity_transitions(&cancel, "movie", id).unwrap();
    assert_eq!(history.title.as_deref(), Some("Inception"));
    assert_eq!(history.poster_path.as_deref(), Some("/inception.jpg"));
    assert_eq!(history.transitions.len(), 2);
    assert_eq!(history.transitions[0].sort_key, 1);

    let job = store.create_job("MovieIndex", JobState::Pending).unwrap();
    let job_history = store.entity_transitions(&cancel, "job", job).unwrap();
    assert_eq!(job_history.title.as_deref(), Some("MovieIndex"));
    assert!(job_history.poster_path.is_none());
}

#[test]
fn entity_history_rejects_unknown_kind() {
    let store = test_store();
    let cancel = Cancel::new();
    let err = store.entity_transitions(&cancel, "playlist", 1).unwrap_err();
    assert!(matches!(err, MediarrError::UnsupportedEntity(_)));
    let err = store.entity_transitions(&cancel, "movie", 12345).unwrap_err();
    assert!(matches!(err, MediarrError::NotFound(_)));
}

#[test]
fn cancelled_reads_abort() {
    let store = test_store();
    let cancel = Cancel::new();
    cancel.cancel();
    assert!(matches!(store.library_stats(&cancel), Err(MediarrError::Cancelled)));
    assert!(matches!(
        store.entity_transitions(&cancel, "movie", 1),
        Err(MediarrError::Cancelled)
    ));
}

// ---------------------------------------------------------------
// Series / season / episode round trips
// ---------------------------------------------------------------

#[test]
fn series_tree_round_trips() {
    let store = test_store();
    let series_id = store
        .create_series(
            &NewSeries {
                path: "/tv/expanse".to_string(),
                monitored: true,
                quality_profile_id: Some(1),
                ..Default::default()
            },
            SeriesState::Missing,
        )
        .unwrap();
    let season_id = store
        .create_season(
            &NewSeason { series_id, season_number: 1, monitored: true, ..Default::default() },
            SeasonState::Missing,
        )
        .unwrap();
    let episode_id = store
        .create_episode(
            &NewEpisode { season_id, episode_number: 3, monitored: true, ..Default::default() },
            EpisodeState::Missing,
        )
        .unwrap();

    assert_eq!(store.get_series(series_id).unwrap().state, SeriesState::Missing);
    assert_eq!(
        store.get_season_by_number(series_id, 1).unwrap().id,
        season_id
    );
    assert_eq!(
        store.get_episode_by_number(season_id, 3).unwrap().id,
        episode_id
    );
    assert_eq!(store.list_seasons(series_id).unwrap().len(), 1);

    // season transition carries the whole-season flag
    store
        .update_season_state(
            season_id,
            SeasonState::Downloading,
            Some(&TransitionMeta {
                download_id: Some("dl-season".to_string()),
                is_entire_season_download: Some(true),
                ..Default::default()
            }),
        )
        .unwrap();
    let log = store.season_transitions(season_id).unwrap();
    assert_eq!(log[1].is_entire_season_download, Some(true));
}

// ---------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------

const INIT_SQL: &str = include_str!("migrations/000001_init.up.sql");

#[test]
fn fresh_database_reaches_head_version() {
    let store = test_store();
    let (version, count): (i64, i64) = store
        .read(|conn| {
            Ok(conn.query_row(
                "SELECT MAX(version), COUNT(*) FROM schema_migrations",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!(version, migrations::HEAD_VERSION);
    assert_eq!(count, migrations::HEAD_VERSION);
}

#[test]
fn migrations_are_idempotent_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mediarr.db");
    {
        let store = Store::open(&path).unwrap();
        store.create_movie(&new_movie("/m/persist"), MovieState::Missing).unwrap();
    }
    let store = Store::open(&path).unwrap();
    assert_eq!(store.get_movie_by_path("/m/persist").unwrap().state, MovieState::Missing);
}

#[test]
fn legacy_database_is_baselined_and_migrated() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    // Build a pre-migration-system database: the v1 schema with no
    // schema_migrations table.
    conn.execute_batch(INIT_SQL).unwrap();

    // Default profile (id 1, cutoff NULL, upgrades off) plus one the user
    // modified and one half-touched.
    conn.execute_batch(
        "INSERT INTO quality_profile (name, cutoff_quality_id, upgrade_allowed)
             VALUES ('User HD', 5, 1);
         INSERT INTO quality_profile_item (quality_profile_id, quality_id)
             SELECT 2, id FROM quality WHERE id IN (2, 5);
         INSERT INTO quality_profile (name, cutoff_quality_id, upgrade_allowed)
             VALUES ('Half Touched', 3, 0);",
    )
    .unwrap();

    migrations::run_migrations(&conn).unwrap();

    let version: i64 = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, migrations::HEAD_VERSION);

    // The old quality table is gone, replaced by quality_definition.
    let old_tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'quality'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(old_tables, 0);

    // User-modified profile survives migration 2 intact.
    let (cutoff, upgrade): (Option<i64>, bool) = conn
        .query_row(
            "SELECT cutoff_quality_id, upgrade_allowed FROM quality_profile WHERE name = 'User HD'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(cutoff, Some(5));
    assert!(upgrade);

    // Default-valued profile keeps its defaults.
    let (cutoff, upgrade): (Option<i64>, bool) = conn
        .query_row(
            "SELECT cutoff_quality_id, upgrade_allowed FROM quality_profile WHERE name = 'Any'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(cutoff, None);
    assert!(!upgrade);

    // A profile that does not meet the user-modified predicate is reset.
    let (cutoff, upgrade): (Option<i64>, bool) = conn
        .query_row(
            "SELECT cutoff_quality_id, upgrade_allowed FROM quality_profile
             WHERE name = 'Half Touched'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(cutoff, None);
    assert!(!upgrade);

    // Items were carried over to quality_definition references.
    let items: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM quality_profile_item i
             JOIN quality_definition d ON d.id = i.quality_definition_id
             WHERE i.quality_profile_id = 2",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(items, 2);
}

#[test]
fn newer_schema_is_refused() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, name TEXT NOT NULL,
                                         applied_at TEXT NOT NULL);
         INSERT INTO schema_migrations VALUES (99, 'future', '2030-01-01 00:00:00');",
    )
    .unwrap();
    let err = migrations::run_migrations(&conn).unwrap_err();
    assert!(matches!(err, MediarrError::Migration(_)));
}
