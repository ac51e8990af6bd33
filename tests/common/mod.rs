//! Stub upstream used by the integration tests.
//!
//! One axum server plays both the GraphQL endpoint and the public site that
//! serves work pages. GraphQL requests are routed by operation name, the way
//! recorded responses are replayed, and every request is logged so tests can
//! assert on the calls that were made.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shiori::annict::{AnnictClient, HttpTransport, OgImageFetcher};
use shiori::catalog::AnnictCatalogService;

pub const TOKEN: &str = "test-token";

pub const AVATAR_URL: &str = "https://api-assets.annict.com/shrine/profile/31031/image/master-37023a5c194ab55d24f15b23d42eec45.jpg";

/// (annict id, title, year, season, episodes, state)
pub const WORKS: &[(i64, &str, i64, &str, i64, &str)] = &[
    (6489, "ちはやふる3", 2019, "AUTUMN", 24, "WATCHING"),
    (6836, "PSYCHO-PASS サイコパス 3", 2019, "AUTUMN", 8, "WATCHING"),
    (6551, "本好きの下剋上 司書になるためには手段を選んでいられません", 2019, "AUTUMN", 14, "WATCHING"),
    (6660, "バビロン", 2019, "AUTUMN", 12, "WATCHING"),
    (6710, "旗揚!けものみち", 2019, "AUTUMN", 12, "WATCHING"),
    (6213, "かぐや様は告らせたい～天才たちの恋愛頭脳戦～", 2019, "WINTER", 12, "WATCHED"),
    (6121, "約束のネバーランド", 2019, "WINTER", 12, "WATCHED"),
    (6182, "どろろ", 2019, "WINTER", 24, "WATCHED"),
    (5945, "ゾンビランドサガ", 2018, "AUTUMN", 12, "WATCHED"),
    (5852, "SSSS.GRIDMAN", 2018, "AUTUMN", 12, "WATCHED"),
    (5630, "ヒナまつり", 2018, "SPRING", 12, "WATCHED"),
    (5362, "宇宙よりも遠い場所", 2018, "WINTER", 13, "WATCHED"),
    (5220, "ポプテピピック", 2018, "WINTER", 12, "WATCHED"),
];

/// Expected stub image URL for a work.
#[must_use]
pub fn image_url(work_id: i64) -> String {
    format!("https://images.example/works/{work_id}.jpg")
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub variables: Value,
}

#[derive(Default)]
pub struct Behaviour {
    /// Operation name -> status code returned instead of data.
    pub fail_operations: HashMap<String, StatusCode>,
    /// Fails `(operation, variable value)` pairs with GraphQL errors.
    pub fail_variables: Vec<(String, String)>,
    /// Operation name -> artificial delay before answering.
    pub delays: HashMap<String, Duration>,
    /// Work pages answered with 404.
    pub missing_pages: HashSet<i64>,
    /// Delay applied to every work page.
    pub page_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct StubState {
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub page_hits: Arc<Mutex<Vec<i64>>>,
    pub pages_in_flight: Arc<AtomicUsize>,
    /// Highest number of work pages served at the same time.
    pub max_pages_in_flight: Arc<AtomicUsize>,
    /// Texts posted to the incoming webhook.
    pub webhook_messages: Arc<Mutex<Vec<String>>>,
    pub behaviour: Arc<Mutex<Behaviour>>,
}

impl StubState {
    pub fn calls(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    pub fn fail_operation(&self, operation: &str, status: StatusCode) {
        self.behaviour
            .lock()
            .unwrap()
            .fail_operations
            .insert(operation.to_string(), status);
    }

    pub fn fail_variable(&self, operation: &str, value: &str) {
        self.behaviour
            .lock()
            .unwrap()
            .fail_variables
            .push((operation.to_string(), value.to_string()));
    }

    pub fn delay(&self, operation: &str, delay: Duration) {
        self.behaviour
            .lock()
            .unwrap()
            .delays
            .insert(operation.to_string(), delay);
    }

    pub fn missing_page(&self, work_id: i64) {
        self.behaviour.lock().unwrap().missing_pages.insert(work_id);
    }

    pub fn slow_pages(&self, delay: Duration) {
        self.behaviour.lock().unwrap().page_delay = Some(delay);
    }
}

pub struct StubUpstream {
    pub base_url: String,
    pub state: StubState,
}

impl StubUpstream {
    pub async fn start() -> Self {
        let state = StubState::default();

        let app = Router::new()
            .route("/graphql", post(graphql))
            .route("/works/{id}", get(work_page))
            .route("/webhook", post(webhook))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/graphql", self.base_url)
    }

    #[must_use]
    pub fn webhook_url(&self) -> String {
        format!("{}/webhook", self.base_url)
    }

    /// Polls until the webhook received a message.
    pub async fn next_webhook_message(&self) -> String {
        for _ in 0..100 {
            if let Some(text) = self.state.webhook_messages.lock().unwrap().first().cloned() {
                return text;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no webhook message received");
    }

    pub fn client(&self) -> AnnictClient {
        self.client_with_token(TOKEN)
    }

    pub fn client_with_token(&self, token: &str) -> AnnictClient {
        let transport = HttpTransport::new(reqwest::Client::new(), self.endpoint(), token);
        AnnictClient::new(Arc::new(transport))
    }

    pub fn og_images(&self, timeout: Duration) -> OgImageFetcher {
        self.og_images_with(10, timeout)
    }

    pub fn og_images_with(&self, max_workers: usize, timeout: Duration) -> OgImageFetcher {
        OgImageFetcher::with_limits(
            reqwest::Client::new(),
            self.base_url.clone(),
            max_workers,
            timeout,
        )
    }

    pub fn catalog(&self) -> AnnictCatalogService {
        AnnictCatalogService::new(self.client(), self.og_images(Duration::from_secs(3)))
    }
}

async fn graphql(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let expected = format!("Bearer {TOKEN}");
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }

    let operation = body["operationName"].as_str().unwrap_or_default().to_string();
    let variables = body["variables"].clone();
    state.calls.lock().unwrap().push(RecordedCall {
        operation: operation.clone(),
        variables: variables.clone(),
    });

    let (status, delay, failing_value) = {
        let behaviour = state.behaviour.lock().unwrap();
        let failing_value = behaviour
            .fail_variables
            .iter()
            .find(|(op, value)| *op == operation && variables.to_string().contains(value.as_str()))
            .map(|(_, value)| value.clone());
        (
            behaviour.fail_operations.get(&operation).copied(),
            behaviour.delays.get(&operation).copied(),
            failing_value,
        )
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = status {
        return (status, "injected failure").into_response();
    }
    if let Some(value) = failing_value {
        return Json(json!({
            "data": null,
            "errors": [{ "message": format!("rejected {value}") }]
        }))
        .into_response();
    }

    let data = match operation.as_str() {
        "GetProfile" => profile_data(),
        "ListWorks" => list_works_data(&variables),
        "ListRecords" => list_records_data(),
        "ListNextEpisodes" => list_next_episodes_data(),
        "GetWork" => get_work_data(&variables),
        "CreateRecordMutation" | "UpdateStatusMutation" => json!({}),
        other => {
            return (StatusCode::BAD_REQUEST, format!("unknown operation {other}")).into_response();
        }
    };

    Json(json!({ "data": data })).into_response()
}

async fn webhook(State(state): State<StubState>, Json(body): Json<Value>) -> StatusCode {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    state.webhook_messages.lock().unwrap().push(text);
    StatusCode::OK
}

/// Counts a work page as served until dropped, including when the client
/// hangs up mid-delay.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(state: &StubState) -> Self {
        let running = state.pages_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state
            .max_pages_in_flight
            .fetch_max(running, Ordering::SeqCst);
        Self(Arc::clone(&state.pages_in_flight))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn work_page(State(state): State<StubState>, Path(id): Path<i64>) -> Response {
    state.page_hits.lock().unwrap().push(id);

    let (missing, delay) = {
        let behaviour = state.behaviour.lock().unwrap();
        (behaviour.missing_pages.contains(&id), behaviour.page_delay)
    };
    let _in_flight = InFlight::enter(&state);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if missing {
        return StatusCode::NOT_FOUND.into_response();
    }

    Html(format!(
        r#"<!DOCTYPE html><html><head>
<meta charset="utf-8">
<meta property="og:title" content="work {id}">
<meta property="og:image" content="{}">
</head><body></body></html>"#,
        image_url(id)
    ))
    .into_response()
}

fn profile_data() -> Value {
    json!({
        "viewer": {
            "avatarUrl": AVATAR_URL,
            "recordsCount": 44,
            "wannaWatchCount": 0,
            "watchingCount": 4,
            "watchedCount": 32
        }
    })
}

fn list_works_data(variables: &Value) -> Value {
    let state = variables["state"].as_str();
    let first = usize::try_from(variables["first"].as_i64().unwrap_or(0)).unwrap_or(0);

    let filtered: Vec<_> = WORKS
        .iter()
        .filter(|w| state.is_none_or(|s| w.5 == s))
        .collect();

    // An unknown cursor points past the end.
    let start = variables["after"].as_str().map_or(0, |cursor| {
        filtered
            .iter()
            .position(|w| cursor_of(w.0) == cursor)
            .map_or(filtered.len(), |i| i + 1)
    });

    let edges: Vec<Value> = filtered
        .iter()
        .skip(start)
        .take(first)
        .map(|(id, title, year, season, episodes, state)| {
            json!({
                "cursor": cursor_of(*id),
                "node": {
                    "annictId": id,
                    "title": title,
                    "seasonYear": year,
                    "seasonName": season,
                    "episodesCount": episodes,
                    "officialSiteUrl": format!("https://example.com/{id}"),
                    "wikipediaUrl": null,
                    "viewerStatusState": state
                }
            })
        })
        .collect();

    json!({ "viewer": { "works": { "edges": edges } } })
}

fn cursor_of(work_id: i64) -> String {
    format!("Y3Vyc29y{work_id}")
}

fn history_record(title: &str, sort_number: i64, has_next: bool, created_at: &str) -> Value {
    json!({
        "node": {
            "createdAt": created_at,
            "work": { "title": title },
            "episode": {
                "sortNumber": sort_number,
                "nextEpisode": if has_next { json!({ "id": format!("next-{sort_number}") }) } else { Value::Null }
            }
        }
    })
}

fn list_records_data() -> Value {
    json!({
        "viewer": {
            "records": {
                "edges": [
                    history_record("ちはやふる3", 20, true, "2019-10-29T15:30:00Z"),
                    history_record("ちはやふる3", 10, true, "2019-10-22T15:30:00Z"),
                    history_record("かぐや様は告らせたい～天才たちの恋愛頭脳戦～", 10, true, "2019-01-12T15:00:00Z"),
                    history_record("かぐや様は告らせたい～天才たちの恋愛頭脳戦～", 120, false, "2019-03-30T15:00:00Z"),
                ]
            }
        }
    })
}

fn next_episode_record(
    work_id: &str,
    title: &str,
    state: &str,
    next: Option<(&str, i64, &str, &str)>,
) -> Value {
    let next_episode = next.map_or(Value::Null, |(id, sort_number, number_text, title)| {
        json!({
            "id": id,
            "number": sort_number / 10,
            "numberText": number_text,
            "title": title,
            "sortNumber": sort_number
        })
    });
    json!({
        "node": {
            "episode": {
                "work": { "id": work_id, "title": title, "viewerStatusState": state },
                "nextEpisode": next_episode
            }
        }
    })
}

/// Three in-progress works, one finished work and one already watched.
fn list_next_episodes_data() -> Value {
    json!({
        "viewer": {
            "records": {
                "edges": [
                    next_episode_record("V29yay02NDg5", "ちはやふる3", "WATCHING", Some(("RXBpc29kZS0y", 20, "第2首", "しのぶれど"))),
                    next_episode_record("V29yay02NDg5", "ちはやふる3", "WATCHING", Some(("RXBpc29kZS0z", 30, "第3首", "ほととぎす"))),
                    next_episode_record("V29yay02ODM2", "PSYCHO-PASS サイコパス 3", "WATCHING", Some(("RXBpc29kZS01", 50, "#5", "Synchronicity"))),
                    next_episode_record("V29yay02NjYw", "バビロン", "WATCHING", Some(("RXBpc29kZS04", 80, "第8話", "終"))),
                    next_episode_record("V29yay02NzEw", "旗揚!けものみち", "WATCHING", None),
                    next_episode_record("V29yay02MjEz", "かぐや様は告らせたい～天才たちの恋愛頭脳戦～", "WATCHED", Some(("RXBpc29kZS05", 90, "第9話", "x"))),
                ]
            }
        }
    })
}

fn get_work_data(variables: &Value) -> Value {
    let requested: Vec<i64> = variables["annictIds"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();

    let edges: Vec<Value> = requested
        .iter()
        .filter_map(|id| WORKS.iter().find(|w| w.0 == *id))
        .map(|(id, title, ..)| {
            json!({
                "node": {
                    "id": format!("V29yay0{id}"),
                    "title": title,
                    "episodes": { "nodes": [
                        { "id": format!("RXBpc29kZS0{id}-2"), "sortNumber": 20 },
                        { "id": format!("RXBpc29kZS0{id}-1"), "sortNumber": 10 }
                    ]}
                }
            })
        })
        .collect();

    json!({ "searchWorks": { "edges": edges } })
}
