//! Operation documents and the typed shapes of their variables and data.

use serde::{Deserialize, Serialize};

use super::{SeasonName, StatusState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetProfile,
    ListWorks,
    ListRecords,
    ListNextEpisodes,
    CreateRecord,
    UpdateStatus,
    GetWork,
}

impl Operation {
    /// Stable operation name, also used to route recorded responses in tests.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetProfile => "GetProfile",
            Self::ListWorks => "ListWorks",
            Self::ListRecords => "ListRecords",
            Self::ListNextEpisodes => "ListNextEpisodes",
            Self::CreateRecord => "CreateRecordMutation",
            Self::UpdateStatus => "UpdateStatusMutation",
            Self::GetWork => "GetWork",
        }
    }

    #[must_use]
    pub const fn document(self) -> &'static str {
        match self {
            Self::GetProfile => GET_PROFILE,
            Self::ListWorks => LIST_WORKS,
            Self::ListRecords => LIST_RECORDS,
            Self::ListNextEpisodes => LIST_NEXT_EPISODES,
            Self::CreateRecord => CREATE_RECORD,
            Self::UpdateStatus => UPDATE_STATUS,
            Self::GetWork => GET_WORK,
        }
    }
}

const GET_PROFILE: &str = r"
    query GetProfile {
        viewer {
            avatarUrl
            recordsCount
            wannaWatchCount
            watchingCount
            watchedCount
        }
    }
";

const LIST_WORKS: &str = r"
    query ListWorks($state: StatusState, $after: String, $first: Int!) {
        viewer {
            works(state: $state, after: $after, first: $first, orderBy: { field: SEASON, direction: DESC }) {
                edges {
                    cursor
                    node {
                        annictId
                        title
                        seasonYear
                        seasonName
                        episodesCount
                        officialSiteUrl
                        wikipediaUrl
                        viewerStatusState
                    }
                }
            }
        }
    }
";

// Unpaginated: the whole history comes back in one response.
const LIST_RECORDS: &str = r"
    query ListRecords {
        viewer {
            records {
                edges {
                    node {
                        createdAt
                        work {
                            title
                        }
                        episode {
                            sortNumber
                            nextEpisode {
                                id
                            }
                        }
                    }
                }
            }
        }
    }
";

const LIST_NEXT_EPISODES: &str = r"
    query ListNextEpisodes {
        viewer {
            records {
                edges {
                    node {
                        episode {
                            work {
                                id
                                title
                                viewerStatusState
                            }
                            nextEpisode {
                                id
                                numberText
                                title
                                sortNumber
                            }
                        }
                    }
                }
            }
        }
    }
";

const CREATE_RECORD: &str = r"
    mutation CreateRecordMutation($episodeId: ID!) {
        createRecord(input: { episodeId: $episodeId }) {
            clientMutationId
        }
    }
";

const UPDATE_STATUS: &str = r"
    mutation UpdateStatusMutation($state: StatusState!, $workId: ID!) {
        updateStatus(input: { state: $state, workId: $workId }) {
            clientMutationId
        }
    }
";

const GET_WORK: &str = r"
    query GetWork($annictIds: [Int!]) {
        searchWorks(annictIds: $annictIds) {
            edges {
                node {
                    id
                    title
                    episodes(orderBy: { field: SORT_NUMBER, direction: ASC }) {
                        nodes {
                            id
                            sortNumber
                        }
                    }
                }
            }
        }
    }
";

#[derive(Debug, Deserialize)]
pub struct Edges<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct Node<T> {
    pub node: T,
}

// GetProfile

#[derive(Debug, Deserialize)]
pub struct ProfileData {
    pub viewer: ProfileViewer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileViewer {
    pub avatar_url: Option<String>,
    pub records_count: i64,
    pub wanna_watch_count: i64,
    pub watching_count: i64,
    pub watched_count: i64,
}

// ListWorks

#[derive(Debug, Serialize)]
pub struct ListWorksVariables<'a> {
    pub state: Option<StatusState>,
    pub after: Option<&'a str>,
    pub first: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListWorksData {
    pub viewer: WorksViewer,
}

#[derive(Debug, Deserialize)]
pub struct WorksViewer {
    pub works: Edges<WorkEdge>,
}

#[derive(Debug, Deserialize)]
pub struct WorkEdge {
    pub cursor: String,
    pub node: WorkNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkNode {
    pub annict_id: i64,
    pub title: String,
    pub season_year: Option<i64>,
    pub season_name: Option<SeasonName>,
    #[serde(default)]
    pub episodes_count: i64,
    pub official_site_url: Option<String>,
    pub wikipedia_url: Option<String>,
    pub viewer_status_state: Option<StatusState>,
}

// ListRecords

#[derive(Debug, Deserialize)]
pub struct ListRecordsData {
    pub viewer: RecordsViewer<HistoryRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RecordsViewer<T> {
    pub records: Edges<Node<T>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub created_at: String,
    pub work: RecordWork,
    pub episode: HistoryEpisode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordWork {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEpisode {
    pub sort_number: i64,
    pub next_episode: Option<EpisodeRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeRef {
    pub id: String,
}

// ListNextEpisodes

#[derive(Debug, Deserialize)]
pub struct ListNextEpisodesData {
    pub viewer: RecordsViewer<NextEpisodeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextEpisodeRecord {
    pub episode: WatchedEpisode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedEpisode {
    pub work: TrackedWork,
    pub next_episode: Option<UpcomingEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedWork {
    pub id: String,
    pub title: String,
    pub viewer_status_state: Option<StatusState>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEpisode {
    pub id: String,
    pub number_text: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub sort_number: i64,
}

// Mutations

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordVariables<'a> {
    pub episode_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusVariables<'a> {
    pub state: StatusState,
    pub work_id: &'a str,
}

/// Mutations only report success; the payload itself is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct MutationData {}

// GetWork

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWorkVariables {
    pub annict_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetWorkData {
    pub search_works: Edges<Node<SearchedWork>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchedWork {
    pub id: String,
    pub title: String,
    pub episodes: SearchedEpisodes,
}

#[derive(Debug, Deserialize)]
pub struct SearchedEpisodes {
    #[serde(default)]
    pub nodes: Vec<SearchedEpisode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchedEpisode {
    pub id: String,
    #[serde(default)]
    pub sort_number: i64,
}

impl GetWorkData {
    /// Opaque ids of the first matching work and its earliest episode.
    #[must_use]
    pub fn first_target(&self) -> Option<(&str, &str)> {
        let work = &self.search_works.edges.first()?.node;
        let episode = work.episodes.nodes.iter().min_by_key(|e| e.sort_number)?;
        Some((work.id.as_str(), episode.id.as_str()))
    }
}
