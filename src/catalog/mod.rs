//! Catalog reconciliation over the upstream API.
//!
//! [`AnnictCatalogService`] turns raw upstream pages into [`Work`] values,
//! stitching in watch intervals from the record history and preview images
//! from the worker pool, and drives the record/status mutations used by the
//! chat command.

pub mod intervals;
pub mod next_episode;

use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::annict::queries::WorkNode;
use crate::annict::{AnnictClient, OgImageFetcher, StatusState, released_on};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::models::{Episode, Profile, Work, WorkPage};

pub use intervals::{IntervalMap, WatchInterval, build_intervals};
pub use next_episode::{NextEpisodePlan, PlannedRecord, plan_next_episodes};

/// Read and write operations over the viewer's catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns the viewer's counters and avatar.
    async fn get_profile(&self, ctx: &RequestContext) -> Result<Profile>;

    /// Lists one page of works, optionally filtered by state.
    ///
    /// `cursor` is empty for the first page. An empty page is not an error.
    async fn list_works(
        &self,
        ctx: &RequestContext,
        state: StatusState,
        cursor: &str,
        limit: i32,
    ) -> Result<WorkPage>;

    /// Records the next episode of every in-progress work and marks works
    /// whose last episode was already recorded as watched.
    ///
    /// Mutations run concurrently with no rollback: on failure some of them
    /// may already have been applied upstream.
    async fn create_next_episode_records(&self, ctx: &RequestContext) -> Result<Vec<Episode>>;

    /// Moves the work with the given public id to `state` and records its
    /// first episode.
    async fn update_work_status(
        &self,
        ctx: &RequestContext,
        work_id: i64,
        state: StatusState,
    ) -> Result<()>;

    /// Waits for in-flight background work before shutdown.
    async fn stop(&self, ctx: &RequestContext) -> Result<()>;
}

pub struct AnnictCatalogService {
    client: AnnictClient,
    og_images: OgImageFetcher,
}

impl AnnictCatalogService {
    #[must_use]
    pub const fn new(client: AnnictClient, og_images: OgImageFetcher) -> Self {
        Self { client, og_images }
    }

    async fn watch_intervals(&self, ctx: &RequestContext) -> Result<IntervalMap> {
        // TODO: page through the history instead of fetching it whole on every listing.
        let response = self.client.list_records(ctx).await?;
        let records = response
            .viewer
            .records
            .edges
            .into_iter()
            .map(|edge| edge.node)
            .collect();
        build_intervals(records)
    }

    /// Never fails: any problem resolves to an empty URL.
    async fn resolve_image(&self, ctx: &RequestContext, work_id: i64) -> String {
        let rx = match self.og_images.submit(ctx, work_id).await {
            Ok(rx) => rx,
            Err(e) => {
                debug!(work_id, error = %e, "Skipping image enrichment");
                return String::new();
            }
        };

        match ctx.run(rx).await {
            Ok(Ok(url)) => url,
            Ok(Err(_)) | Err(_) => String::new(),
        }
    }
}

fn work_from_node(node: WorkNode) -> Work {
    Work {
        id: node.annict_id,
        released_on: released_on(node.season_year, node.season_name),
        title: node.title,
        episodes_count: node.episodes_count,
        official_site_url: node.official_site_url.unwrap_or_default(),
        wikipedia_url: node.wikipedia_url.unwrap_or_default(),
        image_url: String::new(),
        status: node.viewer_status_state.unwrap_or_default().into(),
        begin_time: None,
        finish_time: None,
    }
}

/// Attaches intervals by title. Finish time stays unset unless derived.
fn apply_intervals(works: &mut [Work], intervals: &IntervalMap) {
    for work in works {
        if let Some(interval) = intervals.get(&work.title) {
            work.begin_time = Some(interval.begin);
            if let Some(finish) = interval.finish {
                work.finish_time = Some(finish);
            }
        }
    }
}

/// Runs every future to completion and reports the first failure in
/// submission order, if any.
async fn join_first_error<I>(futures: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Future<Output = Result<()>>,
{
    join_all(futures).await.into_iter().collect()
}

#[async_trait]
impl CatalogService for AnnictCatalogService {
    async fn get_profile(&self, ctx: &RequestContext) -> Result<Profile> {
        let viewer = self.client.get_profile(ctx).await?.viewer;

        Ok(Profile {
            records_count: viewer.records_count,
            wanna_watch_count: viewer.wanna_watch_count,
            watching_count: viewer.watching_count,
            watched_count: viewer.watched_count,
            avatar_url: viewer.avatar_url.unwrap_or_default(),
        })
    }

    async fn list_works(
        &self,
        ctx: &RequestContext,
        state: StatusState,
        cursor: &str,
        limit: i32,
    ) -> Result<WorkPage> {
        let state_filter = (state != StatusState::NoState).then_some(state);
        let after = (!cursor.is_empty()).then_some(cursor);

        let response = self
            .client
            .list_works(ctx, state_filter, after, i64::from(limit))
            .await?;

        let edges = response.viewer.works.edges;
        let Some(next_cursor) = edges.last().map(|edge| edge.cursor.clone()) else {
            return Ok(WorkPage::default());
        };

        let mut works: Vec<Work> = edges
            .into_iter()
            .map(|edge| work_from_node(edge.node))
            .collect();

        let (intervals, images) = tokio::join!(
            self.watch_intervals(ctx),
            join_all(works.iter().map(|w| self.resolve_image(ctx, w.id))),
        );
        let intervals = intervals.map_err(|e| e.wrap("failed to derive watch intervals"))?;

        for (work, image_url) in works.iter_mut().zip(images) {
            work.image_url = image_url;
        }
        apply_intervals(&mut works, &intervals);

        debug!(count = works.len(), ?state, "Listed works");
        Ok(WorkPage { works, next_cursor })
    }

    async fn create_next_episode_records(&self, ctx: &RequestContext) -> Result<Vec<Episode>> {
        let response = self.client.list_next_episodes(ctx).await?;
        let history: Vec<_> = response
            .viewer
            .records
            .edges
            .into_iter()
            .map(|edge| edge.node)
            .collect();

        let plan = plan_next_episodes(&history);
        info!(
            records = plan.records.len(),
            finished = plan.finished_work_ids.len(),
            "Submitting next episode records"
        );

        let creates: Vec<_> = plan
            .records
            .values()
            .map(|planned| async move {
                self.client
                    .create_record(ctx, &planned.episode_id)
                    .await
                    .map_err(|e| e.with_context("episode_id", &planned.episode_id))
            })
            .collect();
        let finishes: Vec<_> = plan
            .finished_work_ids
            .iter()
            .map(|work_id| async move {
                self.client
                    .update_status(ctx, StatusState::Watched, work_id)
                    .await
                    .map_err(|e| e.with_context("work_id", work_id))
            })
            .collect();

        let (created, finished) =
            tokio::join!(join_first_error(creates), join_first_error(finishes));
        created
            .and(finished)
            .map_err(|e| e.wrap("failed to create next episode records"))?;

        Ok(plan.records.values().map(PlannedRecord::summary).collect())
    }

    async fn update_work_status(
        &self,
        ctx: &RequestContext,
        work_id: i64,
        state: StatusState,
    ) -> Result<()> {
        let found = self.client.get_work(ctx, work_id).await?;
        let Some((opaque_work_id, first_episode_id)) = found.first_target() else {
            warn!(work_id, "No work with episodes matched");
            return Err(Error::invalid_argument(format!(
                "work {work_id} was not found or has no episodes"
            ))
            .with_context("work_id", work_id));
        };

        let (status, record) = tokio::join!(
            self.client.update_status(ctx, state, opaque_work_id),
            self.client.create_record(ctx, first_episode_id),
        );
        status
            .map_err(|e| e.with_context("work_id", opaque_work_id))
            .and(record.map_err(|e| e.with_context("episode_id", first_episode_id)))
            .map_err(|e| e.wrap("failed to update work status"))?;

        info!(work_id, ?state, "Updated work status");
        Ok(())
    }

    async fn stop(&self, ctx: &RequestContext) -> Result<()> {
        self.og_images.drain(ctx).await
    }
}
