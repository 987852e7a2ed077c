//! In-process server fixture backed by the core mocks.
//!
//! The router is driven with `tower::ServiceExt::oneshot`; the monitor is
//! built but not started so tests step it with `poll_once`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use grabarr_core::{
    batch::BatchPlanner,
    client::ClientRegistry,
    import::ImportJob,
    indexer::{IndexerRegistry, SearchResult},
    ledger::SqliteLedger,
    library::SqliteLibrary,
    load_config_from_str,
    metadata::MetadataProvider,
    monitor::AcquisitionMonitor,
    search::SearchAggregator,
    testing::{MockClient, MockIndexer},
    AcquisitionService, EventBus,
};
use grabarr_server::state::AppState;

/// Re-export fixtures for test convenience
pub use grabarr_core::testing::fixtures;

pub struct TestFixture {
    pub router: Router,
    pub client: Arc<MockClient>,
    pub monitor: Arc<AcquisitionMonitor>,
    pub library_root: PathBuf,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_results(Vec::new())
    }

    /// Fixture whose single indexer answers every query with `results`.
    pub fn with_results(results: Vec<SearchResult>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let library_root = temp_dir.path().join("library");

        let config = load_config_from_str(&format!(
            r#"
[server]
host = "127.0.0.1"
port = 0

[database]
path = "{}"

[search]
indexer_timeout_ms = 500

[import]
library_root = "{}"

[[indexers]]
type = "jackett"
name = "mock"
endpoint = "http://127.0.0.1:9117"
api_key = "secret"
"#,
            db_path.display(),
            library_root.display()
        ))
        .expect("Failed to parse test config");

        let ledger = Arc::new(SqliteLedger::new(&db_path).expect("Failed to create ledger"));
        let library = Arc::new(SqliteLibrary::new(&db_path).expect("Failed to create library"));

        let client = Arc::new(MockClient::new("qb"));
        let mut clients = ClientRegistry::new();
        clients.register(client.clone(), true, 0);

        let mut indexers = IndexerRegistry::new();
        indexers.register(Arc::new(MockIndexer::new("mock").with_results(results)), true, 0);

        let metadata: Arc<dyn MetadataProvider> = Arc::new(fixtures::show_catalog());
        let events = EventBus::new(64);

        let importer = Arc::new(ImportJob::new(
            ledger.clone(),
            library.clone(),
            Arc::clone(&metadata),
            clients.clone(),
            events.clone(),
            config.import.clone(),
        ));
        let monitor = Arc::new(AcquisitionMonitor::new(
            config.monitor.clone(),
            ledger.clone(),
            clients.clone(),
            importer,
            events.clone(),
        ));

        let aggregator = Arc::new(SearchAggregator::new(indexers, config.search.clone()));
        let planner = BatchPlanner::new(config.batch.clone(), Arc::clone(&metadata), library.clone());
        let service = Arc::new(AcquisitionService::new(
            aggregator, clients, ledger, library, metadata, planner, events,
        ));

        let state = Arc::new(AppState::new(config, service, Some(Arc::clone(&monitor))));
        let router = grabarr_server::api::create_router(state);

        Self {
            router,
            client,
            monitor,
            library_root,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Raw text body, for the metrics endpoint.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
