//! Acquisition API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use grabarr_core::indexer::SearchResult;
use grabarr_core::ledger::LedgerFilter;
use grabarr_core::service::AcquireReport;
use grabarr_core::{AcquisitionRecord, AcquisitionStatus, AcquisitionTarget, BatchTarget};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for list queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for list queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting an acquisition
#[derive(Debug, Deserialize)]
pub struct InitiateBody {
    /// A result as returned by the search endpoint
    pub result: SearchResult,
    pub target: AcquisitionTarget,
    /// Pin a client by name instead of the highest-priority one
    pub client: Option<String>,
    #[serde(default)]
    pub batch: BatchTarget,
}

#[derive(Debug, Deserialize)]
pub struct ListAcquisitionsParams {
    /// Comma-separated statuses
    pub status: Option<String>,
    pub client: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListAcquisitionsResponse {
    pub acquisitions: Vec<AcquisitionRecord>,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for acquiring whatever an item is missing
#[derive(Debug, Deserialize)]
pub struct AcquireMissingBody {
    pub item_id: String,
    /// Restrict to one season of a series
    pub season: Option<u32>,
    pub client: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_acquisitions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAcquisitionsParams>,
) -> Result<Json<ListAcquisitionsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = LedgerFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref raw) = params.status {
        let statuses = raw
            .split(',')
            .map(|s| s.trim().parse::<AcquisitionStatus>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::bad_request)?;
        filter = filter.with_statuses(&statuses);
    }
    if let Some(ref client) = params.client {
        filter = filter.with_client(client);
    }

    let acquisitions = state.service().list(&filter)?;
    Ok(Json(ListAcquisitionsResponse {
        acquisitions,
        limit,
        offset,
    }))
}

pub async fn get_acquisition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AcquisitionRecord>, ApiError> {
    Ok(Json(state.service().get(&id)?))
}

/// Hand a chosen result to a client and start tracking it
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InitiateBody>,
) -> Result<(StatusCode, Json<AcquisitionRecord>), ApiError> {
    let record = state
        .service()
        .initiate(&body.result, body.target, body.client.as_deref(), body.batch)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AcquisitionRecord>, ApiError> {
    Ok(Json(state.service().cancel(&id).await?))
}

/// Re-initiate a failed, missing or cancelled acquisition; returns the
/// replacement record
pub async fn retry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<AcquisitionRecord>), ApiError> {
    let record = state.service().retry(&id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn purge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service().purge(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every terminal record
pub async fn purge_terminal(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let purged = state.service().purge_terminal()?;
    Ok(Json(PurgeResponse { purged }))
}

pub async fn acquire_missing(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AcquireMissingBody>,
) -> Result<Json<AcquireReport>, ApiError> {
    let report = state
        .service()
        .acquire_missing(&body.item_id, body.season, body.client.as_deref())
        .await?;
    Ok(Json(report))
}
