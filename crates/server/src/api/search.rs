//! Search and indexer API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use grabarr_core::indexer::CapabilitySet;
use grabarr_core::search::{AggregateResult, SearchRequest};

use super::error::ApiError;
use crate::state::AppState;

/// Indexer as listed by the API
#[derive(Debug, Serialize)]
pub struct IndexerSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct ListIndexersResponse {
    pub indexers: Vec<IndexerSummary>,
}

/// Fan a query out to every enabled indexer.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<AggregateResult>, ApiError> {
    let result = state.service().search(&request).await?;
    info!(
        query = %result.query,
        results = result.results.len(),
        failed_indexers = result.indexer_errors.len(),
        "Search completed"
    );
    Ok(Json(result))
}

pub async fn list_indexers(State(state): State<Arc<AppState>>) -> Json<ListIndexersResponse> {
    let indexers = state
        .service()
        .aggregator()
        .registry()
        .all()
        .iter()
        .map(|entry| IndexerSummary {
            name: entry.indexer.name().to_string(),
            kind: entry.indexer.kind().to_string(),
            enabled: entry.enabled,
            priority: entry.priority,
        })
        .collect();
    Json(ListIndexersResponse { indexers })
}

/// Ask one indexer what it supports.
pub async fn get_capabilities(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CapabilitySet>, ApiError> {
    let entry = state
        .service()
        .aggregator()
        .registry()
        .get(&name)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Indexer not found: {}", name)))?;
    let capabilities = entry
        .indexer
        .get_capabilities()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(capabilities))
}
