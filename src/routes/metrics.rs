// POST /collector/metrics: validate, enqueue for the writers, answer right away.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::Json;
use bytes::Bytes;
use tracing::{debug, warn};

use super::AppState;
use crate::error::IngestError;
use crate::models::Payload;
use crate::writer::WriteJob;

/// Address of the peer that sent the request; `unknown` when the server was
/// not started with connect info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for OriginIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(OriginIp(ip))
    }
}

/// Accepting a payload means it is queued, not stored. Store failures never reach the sender.
pub(super) async fn ingest_handler(
    State(state): State<AppState>,
    OriginIp(origin_ip): OriginIp,
    body: Bytes,
) -> Result<Json<serde_json::Value>, IngestError> {
    if body.is_empty() {
        warn!(remote_ip = %origin_ip, "empty body on metrics ingestion");
        return Err(IngestError::EmptyBody);
    }
    let payload: Payload = serde_json::from_slice(&body).map_err(|e| {
        warn!(remote_ip = %origin_ip, error = %e, "malformed metrics payload");
        IngestError::from(e)
    })?;

    // One job per accepted request, even an empty one: the enricher sees every ingestion.
    let containers = payload.len();
    state
        .dispatcher
        .dispatch(WriteJob { payload, origin_ip })
        .await
        .map_err(|_| IngestError::WritersUnavailable)?;
    debug!(containers, "payload queued for writing");
    Ok(Json(serde_json::json!({})))
}
