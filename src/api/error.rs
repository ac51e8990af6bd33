use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::error::{Error, ErrorKind};

/// Client closed request, as popularized by nginx.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug)]
pub struct ApiError(pub Error);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ApiError {}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self(Error::internal(msg))
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Canceled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self.0.kind() {
            ErrorKind::InvalidArgument | ErrorKind::Unauthenticated => self.0.message().to_string(),
            ErrorKind::Internal => {
                tracing::error!(error = %self.0, "Request failed");
                "An internal error occurred".to_string()
            }
            kind @ (ErrorKind::Canceled | ErrorKind::DeadlineExceeded) => {
                tracing::warn!(error = %self.0, "Request did not complete");
                kind.to_string()
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        let cases = [
            (Error::invalid_argument("bad"), 400),
            (Error::unauthenticated("no"), 401),
            (Error::deadline_exceeded(), 504),
            (Error::canceled(), 499),
            (Error::internal("boom"), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status().as_u16(), expected);
        }
    }
}
