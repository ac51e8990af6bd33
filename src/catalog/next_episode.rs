//! Decides which record to create next for every in-progress work.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::annict::StatusState;
use crate::annict::queries::{NextEpisodeRecord, UpcomingEpisode};
use crate::models::Episode;

/// The episode a record should be created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRecord {
    pub work_id: String,
    pub work_title: String,
    pub episode_id: String,
    pub sort_number: i64,
    pub number_text: String,
    pub title: String,
}

impl PlannedRecord {
    fn from_upcoming(work_id: &str, work_title: &str, next: &UpcomingEpisode) -> Self {
        Self {
            work_id: work_id.to_string(),
            work_title: work_title.to_string(),
            episode_id: next.id.clone(),
            sort_number: next.sort_number,
            number_text: next.number_text.clone().unwrap_or_default(),
            title: next.title.clone().unwrap_or_default(),
        }
    }

    /// Whether `self` is further along than `other`.
    ///
    /// Sort numbers decide; on a tie the number text is compared as plain
    /// strings, so "9" beats "10".
    fn is_later_than(&self, other: &Self) -> bool {
        match self.sort_number.cmp(&other.sort_number) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.number_text > other.number_text,
        }
    }

    #[must_use]
    pub fn summary(&self) -> Episode {
        Episode {
            work_title: self.work_title.clone(),
            title: self.title.clone(),
            number_text: self.number_text.clone(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct NextEpisodePlan {
    /// One entry per work, keyed by opaque work id.
    pub records: BTreeMap<String, PlannedRecord>,
    /// Works whose last episode shows up in the history.
    pub finished_work_ids: BTreeSet<String>,
}

/// Scans the record history of works not yet marked watched.
#[must_use]
pub fn plan_next_episodes(history: &[NextEpisodeRecord]) -> NextEpisodePlan {
    let mut plan = NextEpisodePlan::default();

    for record in history {
        let episode = &record.episode;
        let work = &episode.work;

        if work.viewer_status_state == Some(StatusState::Watched) {
            continue;
        }

        let Some(next) = &episode.next_episode else {
            plan.finished_work_ids.insert(work.id.clone());
            continue;
        };

        let candidate = PlannedRecord::from_upcoming(&work.id, &work.title, next);
        let replace = plan
            .records
            .get(&work.id)
            .is_none_or(|current| candidate.is_later_than(current));
        if replace {
            plan.records.insert(work.id.clone(), candidate);
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annict::queries::{TrackedWork, WatchedEpisode};

    fn history(
        work_id: &str,
        state: StatusState,
        next: Option<(&str, i64, &str)>,
    ) -> NextEpisodeRecord {
        NextEpisodeRecord {
            episode: WatchedEpisode {
                work: TrackedWork {
                    id: work_id.to_string(),
                    title: format!("title of {work_id}"),
                    viewer_status_state: Some(state),
                },
                next_episode: next.map(|(id, sort_number, number_text)| UpcomingEpisode {
                    id: id.to_string(),
                    number_text: Some(number_text.to_string()),
                    title: Some(format!("episode {id}")),
                    sort_number,
                }),
            },
        }
    }

    #[test]
    fn keeps_latest_next_episode_per_work() {
        let records = vec![
            history("w1", StatusState::Watching, Some(("e2", 20, "第2話"))),
            history("w1", StatusState::Watching, Some(("e4", 40, "第4話"))),
            history("w1", StatusState::Watching, Some(("e3", 30, "第3話"))),
            history("w2", StatusState::Watching, Some(("f2", 2, "#2"))),
        ];

        let plan = plan_next_episodes(&records);

        assert_eq!(plan.records.len(), 2);
        assert_eq!(plan.records["w1"].episode_id, "e4");
        assert_eq!(plan.records["w2"].episode_id, "f2");
        assert!(plan.finished_work_ids.is_empty());
    }

    #[test]
    fn skips_watched_works() {
        let records = vec![
            history("w1", StatusState::Watched, Some(("e2", 20, "2"))),
            history("w1", StatusState::Watched, None),
        ];

        assert_eq!(plan_next_episodes(&records), NextEpisodePlan::default());
    }

    #[test]
    fn missing_successor_marks_work_finished() {
        let records = vec![
            history("w1", StatusState::Watching, Some(("e12", 120, "12"))),
            history("w1", StatusState::Watching, None),
            history("w2", StatusState::Watching, None),
        ];

        let plan = plan_next_episodes(&records);

        assert_eq!(
            plan.finished_work_ids.iter().collect::<Vec<_>>(),
            vec!["w1", "w2"]
        );
        assert_eq!(plan.records.len(), 1);
    }

    #[test]
    fn tie_on_sort_number_falls_back_to_text() {
        let records = vec![
            history("w1", StatusState::Watching, Some(("e10", 0, "10"))),
            history("w1", StatusState::Watching, Some(("e9", 0, "9"))),
        ];

        let plan = plan_next_episodes(&records);
        assert_eq!(plan.records["w1"].episode_id, "e9");
    }

    #[test]
    fn summary_carries_display_fields() {
        let records = vec![history("w1", StatusState::Watching, Some(("e2", 2, "第2話")))];
        let plan = plan_next_episodes(&records);

        assert_eq!(
            plan.records["w1"].summary(),
            Episode {
                work_title: "title of w1".to_string(),
                title: "episode e2".to_string(),
                number_text: "第2話".to_string(),
            }
        );
    }
}
