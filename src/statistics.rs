//! Dashboard and listing operations exposed over HTTP.
//!
//! Requests are validated here, before anything reaches the upstream API.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::annict::StatusState;
use crate::catalog::CatalogService;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::models::{Dashboard, Work};

/// Page size used for the watching list, which is expected to fit one page.
pub const WATCHING_PAGE_SIZE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkState {
    #[default]
    WorkStateUnspecified,
    Watching,
    Watched,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDashboardRequest {
    #[serde(default)]
    pub work_page_size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDashboardResponse {
    pub dashboard: Dashboard,
    pub work_next_page_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListWorksRequest {
    #[serde(default)]
    pub state: WorkState,
    #[serde(default)]
    pub page_token: String,
    #[serde(default)]
    pub page_size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListWorksResponse {
    pub works: Vec<Work>,
    pub next_page_token: String,
}

pub fn validate_get_dashboard_request(req: &GetDashboardRequest) -> Result<()> {
    if req.work_page_size <= 0 {
        return Err(Error::invalid_argument(
            "work_page_size must be greater than 0",
        ));
    }
    Ok(())
}

pub fn validate_list_works_request(req: &ListWorksRequest) -> Result<StatusState> {
    let state = match req.state {
        WorkState::WorkStateUnspecified => {
            return Err(Error::invalid_argument("state must be specified"));
        }
        WorkState::Watching => StatusState::Watching,
        WorkState::Watched => StatusState::Watched,
    };
    if req.page_size <= 0 {
        return Err(Error::invalid_argument("page_size must be greater than 0"));
    }
    Ok(state)
}

#[derive(Clone)]
pub struct StatisticsService {
    catalog: Arc<dyn CatalogService>,
}

impl StatisticsService {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }

    /// Fetches the profile and both work lists concurrently.
    ///
    /// Any failing part fails the whole dashboard.
    pub async fn get_dashboard(
        &self,
        ctx: &RequestContext,
        req: &GetDashboardRequest,
    ) -> Result<GetDashboardResponse> {
        validate_get_dashboard_request(req)?;

        let (profile, watching, watched) = tokio::join!(
            self.catalog.get_profile(ctx),
            self.catalog
                .list_works(ctx, StatusState::Watching, "", WATCHING_PAGE_SIZE),
            self.catalog
                .list_works(ctx, StatusState::Watched, "", req.work_page_size),
        );

        let profile = profile?;
        let watching = watching?;
        let watched = watched?;

        Ok(GetDashboardResponse {
            dashboard: Dashboard {
                profile,
                watching_works: watching.works,
                watched_works: watched.works,
            },
            work_next_page_token: watched.next_cursor,
        })
    }

    pub async fn list_works(
        &self,
        ctx: &RequestContext,
        req: &ListWorksRequest,
    ) -> Result<ListWorksResponse> {
        let state = validate_list_works_request(req)?;

        let page = self
            .catalog
            .list_works(ctx, state, &req.page_token, req.page_size)
            .await?;

        Ok(ListWorksResponse {
            works: page.works,
            next_page_token: page.next_cursor,
        })
    }
}
