//! Integration with the Annict GraphQL API and its public work pages.

pub mod client;
pub mod og_image;
pub mod queries;
pub mod transport;

pub use client::AnnictClient;
pub use og_image::OgImageFetcher;
pub use queries::Operation;
pub use transport::{GraphqlRequest, HttpTransport, Transport, TransportError};

use serde::{Deserialize, Serialize};

use crate::models::WorkStatus;

pub const DEFAULT_ENDPOINT: &str = "https://api.annict.com/graphql";
pub const DEFAULT_SITE_URL: &str = "https://annict.com";

/// Upstream status states. Only the first three are produced by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    #[default]
    NoState,
    Watching,
    Watched,
    WannaWatch,
    OnHold,
    StopWatching,
}

impl From<StatusState> for WorkStatus {
    fn from(state: StatusState) -> Self {
        match state {
            StatusState::Watching => Self::Watching,
            StatusState::Watched => Self::Watched,
            _ => Self::NoState,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonName {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl SeasonName {
    #[must_use]
    pub const fn kanji(self) -> &'static str {
        match self {
            Self::Spring => "春",
            Self::Summer => "夏",
            Self::Autumn => "秋",
            Self::Winter => "冬",
        }
    }
}

/// Renders the release period label, e.g. `2019 秋`.
#[must_use]
pub fn released_on(year: Option<i64>, season: Option<SeasonName>) -> String {
    match (year, season) {
        (Some(year), Some(season)) => format!("{year} {}", season.kanji()),
        (Some(year), None) => year.to_string(),
        (None, Some(season)) => season.kanji().to_string(),
        (None, None) => String::new(),
    }
}
