//! Statistics endpoints.
//!
//! Both endpoints take JSON bodies and return the service response as-is.
//! A client that disconnects cancels the upstream work it started.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::statistics::{
    GetDashboardRequest, GetDashboardResponse, ListWorksRequest, ListWorksResponse,
};

/// `POST /statistics/getdashboard`
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetDashboardRequest>,
) -> Result<Json<GetDashboardResponse>, ApiError> {
    let ctx = state.request_context();
    let _guard = ctx.cancel_on_drop();

    let response = state.statistics.get_dashboard(&ctx, &req).await?;
    Ok(Json(response))
}

/// `POST /statistics/listworks`
pub async fn list_works(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListWorksRequest>,
) -> Result<Json<ListWorksResponse>, ApiError> {
    let ctx = state.request_context();
    let _guard = ctx.cancel_on_drop();

    let response = state.statistics.list_works(&ctx, &req).await?;
    Ok(Json(response))
}
