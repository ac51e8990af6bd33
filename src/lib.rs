pub mod annict;
pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod statistics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use annict::{AnnictClient, HttpTransport, OgImageFetcher};
use api::{AppState, SlackSettings};
use catalog::{AnnictCatalogService, CatalogService};
use cli::{Cli, Commands};
pub use config::Config;
use context::RequestContext;
use statistics::{GetDashboardRequest, ListWorksRequest, StatisticsService, WorkState};

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    config.validate()?;

    init_tracing(&config);

    let http = build_shared_http_client(config.annict.request_timeout_seconds)?;
    let catalog = Arc::new(build_catalog(&config, http.clone()));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config, catalog, http).await,
        Commands::Dashboard { page_size } => cmd_dashboard(catalog, page_size).await,
        Commands::Works {
            state,
            page_size,
            cursor,
        } => cmd_works(catalog, state.into(), page_size, cursor).await,
        Commands::Start => cmd_start(catalog.as_ref()).await,
        Commands::Add { target } => cmd_add(catalog.as_ref(), &target).await,
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("shiori/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

fn build_catalog(config: &Config, http: reqwest::Client) -> AnnictCatalogService {
    let transport = HttpTransport::new(
        http.clone(),
        config.annict.endpoint.clone(),
        config.annict.token.clone(),
    );
    let og_images = OgImageFetcher::with_limits(
        http,
        config.annict.site_url.clone(),
        config.enrichment.max_workers,
        config.enrichment.fetch_timeout(),
    );

    AnnictCatalogService::new(AnnictClient::new(Arc::new(transport)), og_images)
}

async fn run_server(
    config: Config,
    catalog: Arc<AnnictCatalogService>,
    http: reqwest::Client,
) -> anyhow::Result<()> {
    if !config.server.enabled {
        warn!("Server is disabled in config, nothing to do");
        return Ok(());
    }

    info!("shiori v{} starting...", env!("CARGO_PKG_VERSION"));

    let catalog_service: Arc<dyn CatalogService> = catalog.clone();

    let slack = config.slack.enabled.then(|| {
        Arc::new(SlackSettings {
            signing_secret: config.slack.signing_secret.clone(),
            webhook_url: config.slack.webhook_url.clone(),
        })
    });

    let state = Arc::new(AppState {
        statistics: StatisticsService::new(Arc::clone(&catalog_service)),
        catalog: catalog_service,
        slack,
        http,
        request_timeout: Duration::from_secs(config.server.request_timeout_seconds),
        tasks: TaskTracker::new(),
        shutdown: CancellationToken::new(),
        cors_enabled: config.server.cors_enabled,
    });

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{addr}");

    serve(
        listener,
        state,
        Duration::from_secs(config.server.shutdown_timeout_seconds),
        shutdown_signal(),
    )
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Serves the API until `signal` resolves.
///
/// In-flight requests run to completion first. Slash commands still running
/// then get `shutdown_timeout` before they are cancelled, and the image
/// pool is drained last with the same timeout.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_timeout: Duration,
    signal: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, api::router(Arc::clone(&state)))
        .with_graceful_shutdown(signal)
        .await
        .context("Web server error")?;

    state.tasks.close();
    let grace = RequestContext::new().with_timeout(shutdown_timeout);
    if grace.run(state.tasks.wait()).await.is_err() {
        warn!(
            pending = state.tasks.len(),
            "Slash commands did not finish before shutdown"
        );
        state.shutdown.cancel();
    }

    let drain_ctx = RequestContext::new().with_timeout(shutdown_timeout);
    if let Err(e) = state.catalog.stop(&drain_ctx).await {
        warn!(error = %e, "Image workers did not finish before shutdown");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Error listening for shutdown: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Error installing SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Context for one-shot commands: Ctrl+C cancels the in-flight call.
fn command_context() -> RequestContext {
    let ctx = RequestContext::new();
    let token = ctx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    ctx
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn finish_command<S: CatalogService + ?Sized>(catalog: &S) {
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(1));
    if let Err(e) = catalog.stop(&ctx).await {
        warn!(error = %e, "Image workers did not finish");
    }
}

async fn cmd_dashboard(catalog: Arc<AnnictCatalogService>, page_size: i32) -> anyhow::Result<()> {
    let ctx = command_context();
    let service = StatisticsService::new(catalog.clone());

    let response = service
        .get_dashboard(
            &ctx,
            &GetDashboardRequest {
                work_page_size: page_size,
            },
        )
        .await;
    finish_command(catalog.as_ref()).await;

    print_json(&response?)
}

async fn cmd_works(
    catalog: Arc<AnnictCatalogService>,
    state: WorkState,
    page_size: i32,
    cursor: String,
) -> anyhow::Result<()> {
    let ctx = command_context();
    let service = StatisticsService::new(catalog.clone());

    let response = service
        .list_works(
            &ctx,
            &ListWorksRequest {
                state,
                page_token: cursor,
                page_size,
            },
        )
        .await;
    finish_command(catalog.as_ref()).await;

    print_json(&response?)
}

async fn cmd_start(catalog: &AnnictCatalogService) -> anyhow::Result<()> {
    let ctx = command_context();
    let episodes = catalog.create_next_episode_records(&ctx).await?;

    if episodes.is_empty() {
        println!("Nothing to record.");
        return Ok(());
    }

    for episode in &episodes {
        println!(
            "- {} {} {}",
            episode.work_title, episode.number_text, episode.title
        );
    }
    Ok(())
}

async fn cmd_add(catalog: &AnnictCatalogService, target: &str) -> anyhow::Result<()> {
    let work_id = cli::parse_work_id(target)
        .with_context(|| format!("Not a work URL or id: {target}"))?;

    let ctx = command_context();
    catalog
        .update_work_status(&ctx, work_id, annict::StatusState::Watching)
        .await?;

    println!("✓ Now watching work {work_id}");
    Ok(())
}
