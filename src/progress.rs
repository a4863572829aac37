//! Playlist progress: which lesson is due today and what the active config
//! becomes after a successful run.
//!
//! Everything here is pure. The agent decides *whether* a run succeeded and
//! persists the [`Transition`] only then, so a failed run leaves the config
//! untouched and the next run picks the same lesson again.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Progress status of the active playlist.
///
/// Stored as `start`, `ongoing-<n>` or `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Start,
    Ongoing(usize),
    Completed,
}

impl Status {
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Ongoing(n) => write!(f, "ongoing-{n}"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "completed" => Ok(Self::Completed),
            other => other
                .strip_prefix("ongoing-")
                .and_then(|n| n.parse().ok())
                .map(Self::Ongoing)
                .ok_or_else(|| format!("unknown status '{other}'")),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The singleton progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveConfig {
    pub playlist_id: String,
    #[serde(default)]
    pub current_video_index: usize,
    #[serde(default = "default_status")]
    pub status: Status,
}

fn default_status() -> Status {
    Status::Start
}

impl ActiveConfig {
    pub fn new(playlist_id: impl Into<String>) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            current_video_index: 0,
            status: Status::Start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Completed,
    Abandoned,
}

/// Archived record of a finished playlist. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseHistory {
    pub playlist_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: HistoryStatus,
    pub total_videos_watched: usize,
    pub date_completed: DateTime<Utc>,
}

/// One entry of the playlist feed, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyLesson {
    pub title: String,
    pub link: String,
    pub source: String,
    pub progress: String,
}

/// Subject class of the digest email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Normal,
    LastDay,
    Completed,
}

/// What today looks like for the active playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPlan {
    pub status: Status,
    pub lesson: Option<DailyLesson>,
    pub is_last_day: bool,
}

impl DailyPlan {
    /// No lesson and nothing to announce: the run should stop without side effects.
    pub fn is_idle(&self) -> bool {
        self.lesson.is_none() && !self.status.is_completed()
    }

    pub fn subject(&self) -> SubjectKind {
        if self.status.is_completed() {
            SubjectKind::Completed
        } else if self.is_last_day {
            SubjectKind::LastDay
        } else {
            SubjectKind::Normal
        }
    }
}

/// Pick today's lesson for `config` out of a freshly fetched playlist.
///
/// An index past the end under a non-completed status yields no lesson; it
/// is not read as completion, which is only ever set by [`advance`].
pub fn evaluate(config: &ActiveConfig, playlist: &[PlaylistEntry], source: &str) -> DailyPlan {
    if config.status.is_completed() {
        return DailyPlan {
            status: config.status,
            lesson: None,
            is_last_day: false,
        };
    }

    let index = config.current_video_index;
    let total = playlist.len();

    let lesson = playlist.get(index).map(|entry| DailyLesson {
        title: entry.title.clone(),
        link: entry.link.clone(),
        source: source.to_string(),
        progress: format!("Lesson {}/{}", index + 1, total),
    });

    DailyPlan {
        status: config.status,
        lesson,
        // index >= total - 1, without underflow on an empty playlist
        is_last_day: index + 1 >= total,
    }
}

/// Result of a successful run: the config to write and, on completion, the
/// history row to insert first.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub config: ActiveConfig,
    pub history: Option<CourseHistory>,
}

impl Transition {
    pub fn is_noop(&self, previous: &ActiveConfig) -> bool {
        self.history.is_none() && self.config == *previous
    }
}

pub fn advance(config: &ActiveConfig, plan: &DailyPlan, now: DateTime<Utc>) -> Transition {
    if config.status.is_completed() {
        return Transition {
            config: config.clone(),
            history: None,
        };
    }

    let next_index = config.current_video_index + 1;

    if plan.is_last_day {
        let history = CourseHistory {
            playlist_id: config.playlist_id.clone(),
            title: None,
            status: HistoryStatus::Completed,
            total_videos_watched: next_index,
            date_completed: now,
        };
        return Transition {
            config: ActiveConfig {
                playlist_id: config.playlist_id.clone(),
                current_video_index: next_index,
                status: Status::Completed,
            },
            history: Some(history),
        };
    }

    Transition {
        config: ActiveConfig {
            playlist_id: config.playlist_id.clone(),
            current_video_index: next_index,
            status: Status::Ongoing(next_index),
        },
        history: None,
    }
}
