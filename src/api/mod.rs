use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::CatalogService;
use crate::context::RequestContext;
use crate::statistics::StatisticsService;

mod error;
pub mod slack;
mod statistics;

pub use error::ApiError;
pub use slack::SlackSettings;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub statistics: StatisticsService,

    pub catalog: Arc<dyn CatalogService>,

    /// Present only when the slash command is enabled.
    pub slack: Option<Arc<SlackSettings>>,

    /// Used for webhook posts.
    pub http: reqwest::Client,

    pub request_timeout: Duration,

    /// Slash commands still running after their acknowledgement.
    pub tasks: TaskTracker,

    /// Cancelled when shutdown stops waiting for `tasks`.
    pub shutdown: CancellationToken,

    pub cors_enabled: bool,
}

impl AppState {
    /// Context for one request, bounded by the request timeout only.
    #[must_use]
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new().with_timeout(self.request_timeout)
    }

    /// Context for work that outlives its request.
    #[must_use]
    pub fn background_context(&self) -> RequestContext {
        RequestContext::from_token(self.shutdown.child_token()).with_timeout(self.request_timeout)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = state.cors_enabled.then(|| {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    });

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/statistics/getdashboard", post(statistics::get_dashboard))
        .route("/statistics/listworks", post(statistics::list_works));

    if state.slack.is_some() {
        router = router.route("/slack/command", post(slack::handle_command));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .option_layer(cors_layer),
    )
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn healthz() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse { status: "ok" }))
}
