//! Mapping of service errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use grabarr_core::search::SearchError;
use grabarr_core::ServiceError;

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::Search(SearchError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Search(SearchError::NoEnabledIndexers) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Search(SearchError::AllIndexersFailed(_)) | ServiceError::Client(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServiceError::Ledger(_) | ServiceError::Metadata(_) | ServiceError::Library(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "Request failed");
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status() {
        let cases = [
            (ServiceError::NotFound("acquisition a1".into()), StatusCode::NOT_FOUND),
            (ServiceError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidState("importing".into()), StatusCode::CONFLICT),
            (
                ServiceError::Search(SearchError::NoEnabledIndexers),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServiceError::Search(SearchError::AllIndexersFailed(Default::default())),
                StatusCode::BAD_GATEWAY,
            ),
            (ServiceError::Library("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
