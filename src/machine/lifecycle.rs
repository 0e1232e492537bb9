// Entity lifecycles.
//
// Each stateful entity kind has a closed state enum and an edge table. The
// `New` variant is the implicit pseudo-state of a freshly constructed,
// unpersisted entity; it round-trips as the empty string.

use serde::{Deserialize, Serialize};

use super::{Edge, StateMachine, StateTag};
use crate::error::{MediarrError, Result};

macro_rules! lifecycle {
    ($name:ident, $edges:ident, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl StateTag for $name {
            fn as_str(&self) -> &'static str {
                $name::as_str(*self)
            }
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }

            pub fn parse(tag: &str) -> Result<Self> {
                match tag {
                    $($tag => Ok($name::$variant)),+,
                    other => Err(MediarrError::Other(format!(
                        "unknown {} state tag: {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }

            pub fn machine(self) -> StateMachine<Self> {
                StateMachine::new(self, $edges)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ----- Movie -----

pub const MOVIE_EDGES: &[Edge<MovieState>] = &[
    Edge {
        from: MovieState::New,
        to: &[MovieState::Unreleased, MovieState::Missing, MovieState::Discovered],
    },
    Edge {
        from: MovieState::Unreleased,
        to: &[MovieState::Discovered, MovieState::Missing],
    },
    Edge {
        from: MovieState::Missing,
        to: &[MovieState::Discovered, MovieState::Downloading],
    },
    Edge {
        from: MovieState::Downloading,
        to: &[MovieState::Downloaded],
    },
];

lifecycle!(MovieState, MOVIE_EDGES, {
    New => "",
    Unreleased => "unreleased",
    Missing => "missing",
    Discovered => "discovered",
    Downloading => "downloading",
    Downloaded => "downloaded",
});

// ----- Series -----

pub const SERIES_EDGES: &[Edge<SeriesState>] = &[
    Edge {
        from: SeriesState::New,
        to: &[SeriesState::Unreleased, SeriesState::Missing, SeriesState::Discovered],
    },
    Edge {
        from: SeriesState::Discovered,
        to: &[SeriesState::Missing, SeriesState::Continuing, SeriesState::Completed],
    },
    Edge {
        from: SeriesState::Missing,
        to: &[SeriesState::Discovered, SeriesState::Downloading],
    },
    Edge {
        from: SeriesState::Unreleased,
        to: &[SeriesState::Discovered, SeriesState::Missing],
    },
    Edge {
        from: SeriesState::Downloading,
        to: &[SeriesState::Continuing, SeriesState::Completed],
    },
    Edge {
        from: SeriesState::Continuing,
        to: &[SeriesState::Completed, SeriesState::Missing],
    },
    Edge {
        from: SeriesState::Completed,
        to: &[SeriesState::Continuing],
    },
];

lifecycle!(SeriesState, SERIES_EDGES, {
    New => "",
    Unreleased => "unreleased",
    Missing => "missing",
    Discovered => "discovered",
    Downloading => "downloading",
    Continuing => "continuing",
    Completed => "completed",
});

// ----- Season -----
// Mirrors Series except continuing has no back edge to missing.

pub const SEASON_EDGES: &[Edge<SeasonState>] = &[
    Edge {
        from: SeasonState::New,
        to: &[SeasonState::Unreleased, SeasonState::Missing, SeasonState::Discovered],
    },
    Edge {
        from: SeasonState::Discovered,
        to: &[SeasonState::Missing, SeasonState::Continuing, SeasonState::Completed],
    },
    Edge {
        from: SeasonState::Missing,
        to: &[SeasonState::Discovered, SeasonState::Downloading],
    },
    Edge {
        from: SeasonState::Unreleased,
        to: &[SeasonState::Discovered, SeasonState::Missing],
    },
    Edge {
        from: SeasonState::Downloading,
        to: &[SeasonState::Continuing, SeasonState::Completed],
    },
    Edge {
        from: SeasonState::Continuing,
        to: &[SeasonState::Completed],
    },
    Edge {
        from: SeasonState::Completed,
        to: &[SeasonState::Continuing],
    },
];

lifecycle!(SeasonState, SEASON_EDGES, {
    New => "",
    Unreleased => "unreleased",
    Missing => "missing",
    Discovered => "discovered",
    Downloading => "downloading",
    Continuing => "continuing",
    Completed => "completed",
});

// ----- Episode -----

pub const EPISODE_EDGES: &[Edge<EpisodeState>] = &[
    Edge {
        from: EpisodeState::New,
        to: &[EpisodeState::Unreleased, EpisodeState::Missing, EpisodeState::Discovered],
    },
    Edge {
        from: EpisodeState::Discovered,
        to: &[EpisodeState::Completed],
    },
    Edge {
        from: EpisodeState::Missing,
        to: &[EpisodeState::Discovered, EpisodeState::Downloading, EpisodeState::Unreleased],
    },
    Edge {
        from: EpisodeState::Unreleased,
        to: &[EpisodeState::Discovered, EpisodeState::Missing],
    },
    Edge {
        from: EpisodeState::Downloading,
        to: &[EpisodeState::Downloaded],
    },
    Edge {
        from: EpisodeState::Downloaded,
        to: &[EpisodeState::Completed],
    },
];

lifecycle!(EpisodeState, EPISODE_EDGES, {
    New => "",
    Unreleased => "unreleased",
    Missing => "missing",
    Discovered => "discovered",
    Downloading => "downloading",
    Downloaded => "downloaded",
    Completed => "completed",
});

// ----- Job -----
// error and done are terminal.

pub const JOB_EDGES: &[Edge<JobState>] = &[
    Edge {
        from: JobState::New,
        to: &[JobState::Pending],
    },
    Edge {
        from: JobState::Pending,
        to: &[JobState::Running],
    },
    Edge {
        from: JobState::Running,
        to: &[JobState::Error, JobState::Done],
    },
];

lifecycle!(JobState, JOB_EDGES, {
    New => "",
    Pending => "pending",
    Running => "running",
    Error => "error",
    Done => "done",
});
