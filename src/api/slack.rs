//! Slack slash command endpoint.
//!
//! Requests are authenticated with the signing secret, acknowledged right
//! away, and the command itself runs in the background. Its outcome is
//! posted to the configured incoming webhook.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};

use super::{ApiError, AppState};
use crate::annict::StatusState;
use crate::catalog::CatalogService;
use crate::cli::parse_work_id;
use crate::context::RequestContext;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-slack-signature";
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_VERSION: &str = "v0";
const MAX_REQUEST_AGE_SECONDS: i64 = 5 * 60;

pub const ADD_USAGE: &str = "usage: /shiori add https://annict.com/works/<workID>";
pub const USAGE: &str = "usage: /shiori start | /shiori add https://annict.com/works/<workID>";
pub const ADDED: &str = ":+1:";
pub const FAILED: &str = ":warning: the command failed, see the server logs";

#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub signing_secret: String,
    pub webhook_url: String,
}

#[derive(Debug, Serialize)]
pub struct SlackAck {
    pub response_type: &'static str,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Start,
    Add(String),
    AddUsage,
    Unknown(String),
}

impl SlashCommand {
    /// Parses the command text, split on single spaces.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut args = text.split(' ');
        match args.next().unwrap_or_default() {
            "start" => Self::Start,
            "add" => match args.next() {
                None | Some("" | "-h" | "--help") => Self::AddUsage,
                Some(target) => Self::Add(target.to_string()),
            },
            other => Self::Unknown(other.to_string()),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Add(_) | Self::AddUsage => "add",
            Self::Unknown(_) => "unknown",
        }
    }
}

fn keyed_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::internal("invalid signing secret"))?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}

/// Computes the `v0=<hex>` signature Slack sends for `body`.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let mac = keyed_mac(secret, timestamp, body)?;
    Ok(format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Checks the request signature and rejects timestamps older than five
/// minutes relative to `now` (unix seconds).
pub fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8], now: i64) -> Result<()> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::unauthenticated(format!("missing {name} header")))
    };

    let timestamp = header(TIMESTAMP_HEADER)?;
    let signature = header(SIGNATURE_HEADER)?;

    let sent_at: i64 = timestamp
        .parse()
        .map_err(|_| Error::unauthenticated("malformed request timestamp"))?;
    if now.abs_diff(sent_at) > MAX_REQUEST_AGE_SECONDS.unsigned_abs() {
        return Err(
            Error::unauthenticated("stale request timestamp").with_context("timestamp", sent_at),
        );
    }

    let digest = signature
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or_else(|| Error::unauthenticated("malformed signature"))?;

    keyed_mac(secret, timestamp, body)?
        .verify_slice(&digest)
        .map_err(|_| Error::unauthenticated("signature mismatch"))
}

fn command_text(body: &[u8]) -> String {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "text")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Runs a command and renders the message to post back.
pub async fn run_command(
    catalog: &dyn CatalogService,
    ctx: &RequestContext,
    command: &SlashCommand,
) -> Result<String> {
    match command {
        SlashCommand::Start => {
            let episodes = catalog.create_next_episode_records(ctx).await?;
            Ok(episodes
                .iter()
                .map(|e| format!("- {} {} {}\n", e.work_title, e.number_text, e.title))
                .collect())
        }
        SlashCommand::Add(target) => {
            let work_id = parse_work_id(target).ok_or_else(|| {
                Error::invalid_argument("invalid work id").with_context("work_id", target)
            })?;
            catalog
                .update_work_status(ctx, work_id, StatusState::Watching)
                .await?;
            Ok(ADDED.to_string())
        }
        SlashCommand::AddUsage => Ok(ADD_USAGE.to_string()),
        SlashCommand::Unknown(_) => Ok(USAGE.to_string()),
    }
}

async fn post_webhook(http: &reqwest::Client, url: &str, text: &str) -> Result<()> {
    http.post(url)
        .json(&WebhookMessage { text })
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| Error::internal("failed to post webhook message").with_source(e))?;
    Ok(())
}

/// `POST /slack/command`
pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SlackAck>, ApiError> {
    let settings = state
        .slack
        .clone()
        .ok_or_else(|| ApiError::internal("slack command is not configured"))?;

    if let Err(e) = verify_signature(
        &settings.signing_secret,
        &headers,
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        warn!(error = %e, "Rejected slash command");
        return Err(e.into());
    }

    let command = SlashCommand::parse(&command_text(&body));
    info!(command = command.name(), "Received slash command");

    // The acknowledgement must not wait for the command.
    let ctx = state.background_context();
    let catalog = Arc::clone(&state.catalog);
    let http = state.http.clone();
    state.tasks.spawn(
        async move {
            let text = match run_command(catalog.as_ref(), &ctx, &command).await {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Slash command failed");
                    FAILED.to_string()
                }
            };

            if let Err(e) = post_webhook(&http, &settings.webhook_url, &text).await {
                error!(error = %e, "Failed to report slash command result");
            }
        }
        .instrument(info_span!("slash_command")),
    );

    Ok(Json(SlackAck {
        response_type: "in_channel",
    }))
}
