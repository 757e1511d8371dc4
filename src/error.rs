// Error types, one per failure class of the pipeline.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

/// Rejected ingestion request. Nothing is dispatched to a writer.
/// Body problems answer 400; a pool that is shutting down answers 503.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Empty request body")]
    EmptyBody,
    #[error("Malformed JSON body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error("Writers are shutting down")]
    WritersUnavailable,
}

impl IngestError {
    fn title(&self) -> &'static str {
        match self {
            IngestError::EmptyBody => "Empty request body",
            IngestError::MalformedBody(_) => "Malformed JSON",
            IngestError::WritersUnavailable => "Service unavailable",
        }
    }

    fn description(&self) -> String {
        match self {
            IngestError::EmptyBody => "A valid JSON document is required.".to_string(),
            IngestError::MalformedBody(e) => format!("Could not decode the metrics payload: {}", e),
            IngestError::WritersUnavailable => "The collector is shutting down.".to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            IngestError::EmptyBody | IngestError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            IngestError::WritersUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "title": self.title(),
            "description": self.description(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// A container's series could not be collected; the container is left out of the cycle.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("stats stream failed: {0}")]
    Stream(#[from] bollard::errors::Error),
    #[error("stats source request failed: {0}")]
    Source(#[from] reqwest::Error),
    #[error("no samples collected")]
    Empty,
    #[error("sample at {next} is older than previous sample at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },
    #[error("sample has no usable timestamp: {0}")]
    Timestamp(String),
    #[error("sampling task aborted: {0}")]
    Task(String),
}

/// Sending the cycle's payload to the collector failed; the cycle's data is lost.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("POST to collector failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("collector answered {status}")]
    Status { status: reqwest::StatusCode },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Http(e) if e.is_timeout())
    }
}

/// A batch write into the time-series store failed as a unit.
#[derive(Debug, thiserror::Error)]
pub enum StoreWriteError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("cannot encode point: {0}")]
    Encode(String),
}
