//! Executes named GraphQL operations against the upstream endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::ErrorKind;

/// A single named operation with its variables.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest {
    #[serde(rename = "operationName")]
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: Value,
}

/// Transport-level failures, before classification.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("graphql errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<ErrorKind> for TransportError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DeadlineExceeded => Self::DeadlineExceeded,
            _ => Self::Canceled,
        }
    }
}

/// Anything that can run an operation and hand back its `data` object.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        ctx: &RequestContext,
        request: GraphqlRequest,
    ) -> Result<Value, TransportError>;
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

/// reqwest-backed transport that attaches the bearer token to every call.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    pub fn new(client: Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    async fn send(&self, request: &GraphqlRequest) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(classify_reqwest)?;
        let parsed: GraphqlResponse = serde_json::from_slice(&bytes)?;

        if !parsed.errors.is_empty() {
            return Err(TransportError::GraphQl(
                parsed.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        parsed
            .data
            .ok_or_else(|| TransportError::GraphQl(vec!["response has no data".to_string()]))
    }
}

fn classify_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::DeadlineExceeded
    } else {
        TransportError::Http(err)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        ctx: &RequestContext,
        request: GraphqlRequest,
    ) -> Result<Value, TransportError> {
        debug!(operation = request.operation_name, "Executing upstream operation");
        ctx.run(self.send(&request)).await?
    }
}
