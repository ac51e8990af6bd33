use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The viewer's relationship to a work, as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    #[default]
    NoState,
    Watching,
    Watched,
}

/// A catalog entry, rebuilt on every listing call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Work {
    pub id: i64,
    pub title: String,
    /// Year and season, e.g. `2019 秋`.
    pub released_on: String,
    pub episodes_count: i64,
    pub official_site_url: String,
    pub wikipedia_url: String,
    /// Empty until the preview image has been resolved.
    pub image_url: String,
    pub status: WorkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<FixedOffset>>,
}

/// Summary of an episode a record was just created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub work_title: String,
    pub title: String,
    pub number_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub records_count: i64,
    pub wanna_watch_count: i64,
    pub watching_count: i64,
    pub watched_count: i64,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub profile: Profile,
    pub watching_works: Vec<Work>,
    pub watched_works: Vec<Work>,
}

/// One page of works plus the cursor of its last entry.
///
/// `next_cursor` is empty only when the page itself was empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkPage {
    pub works: Vec<Work>,
    pub next_cursor: String,
}
