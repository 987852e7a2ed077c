//! Download client API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClientSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct ListClientsResponse {
    pub clients: Vec<ClientSummary>,
}

/// Outcome of a connectivity check against one client
#[derive(Debug, Serialize)]
pub struct ClientTestResult {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list_clients(State(state): State<Arc<AppState>>) -> Json<ListClientsResponse> {
    let clients = state
        .service()
        .clients()
        .all()
        .iter()
        .map(|entry| ClientSummary {
            name: entry.client.name().to_string(),
            kind: entry.client.kind().to_string(),
            enabled: entry.enabled,
            priority: entry.priority,
        })
        .collect();
    Json(ListClientsResponse { clients })
}

/// Check connectivity of every registered client.
pub async fn test_clients(State(state): State<Arc<AppState>>) -> Json<Vec<ClientTestResult>> {
    let results = state
        .service()
        .clients()
        .test_all()
        .await
        .into_iter()
        .map(|(name, result)| match result {
            Ok(info) => ClientTestResult {
                name,
                ok: true,
                version: info.version,
                error: None,
            },
            Err(e) => ClientTestResult {
                name,
                ok: false,
                version: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    Json(results)
}
