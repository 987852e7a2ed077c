//! Library API handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use grabarr_core::library::{FileOwner, LibraryFile, LibraryFilter};

use super::error::ApiError;
use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListLibraryParams {
    pub item_id: Option<String>,
    pub sub_item_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListLibraryResponse {
    pub files: Vec<LibraryFile>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLibraryParams>,
) -> Result<Json<ListLibraryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let owner = match (params.item_id, params.sub_item_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "item_id and sub_item_id are mutually exclusive",
            ))
        }
        (Some(item_id), None) => Some(FileOwner::Item { item_id }),
        (None, Some(sub_item_id)) => Some(FileOwner::SubItem { sub_item_id }),
        (None, None) => None,
    };

    let filter = LibraryFilter {
        owner,
        limit,
        offset,
    };
    let files = state.service().library_files(&filter)?;
    Ok(Json(ListLibraryResponse {
        files,
        limit,
        offset,
    }))
}
