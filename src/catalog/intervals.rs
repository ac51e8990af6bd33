//! Watch intervals derived from the viewer's record history.

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;

use crate::annict::queries::HistoryRecord;
use crate::error::{Error, Result};

const JST_OFFSET_SECONDS: i32 = 9 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchInterval {
    pub begin: DateTime<FixedOffset>,
    pub finish: Option<DateTime<FixedOffset>>,
}

/// Watch intervals keyed by work title.
///
/// Titles are not guaranteed unique upstream; two works sharing a title share
/// an interval.
pub type IntervalMap = HashMap<String, WatchInterval>;

fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECONDS).expect("UTC+9 is a valid offset")
}

fn parse_created_at(record: &HistoryRecord) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&record.created_at)
        .map(|t| t.with_timezone(&jst()))
        .map_err(|e| {
            Error::internal("invalid record timestamp")
                .with_context("created_at", &record.created_at)
                .with_source(e)
        })
}

/// Folds the record history into per-title intervals.
///
/// Records are visited in ascending episode sort order. The first record of a
/// title sets its begin time; any record whose episode has no successor sets
/// the finish time, the first record included.
pub fn build_intervals(mut records: Vec<HistoryRecord>) -> Result<IntervalMap> {
    records.sort_by_key(|r| r.episode.sort_number);

    let mut intervals = IntervalMap::new();
    for record in &records {
        let is_last_episode = record.episode.next_episode.is_none();

        match intervals.get_mut(&record.work.title) {
            None => {
                let begin = parse_created_at(record)?;
                intervals.insert(
                    record.work.title.clone(),
                    WatchInterval {
                        begin,
                        finish: is_last_episode.then_some(begin),
                    },
                );
            }
            Some(interval) if is_last_episode => {
                interval.finish = Some(parse_created_at(record)?);
            }
            Some(_) => {}
        }
    }

    Ok(intervals)
}
