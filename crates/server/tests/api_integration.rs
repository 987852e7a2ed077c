//! HTTP API tests against the in-process router.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{fixtures, TestFixture};
use grabarr_core::client::ClientState;

fn episode_target(episode: u32) -> Value {
    json!({ "type": "sub_item", "sub_item_id": format!("show-s01e{:02}", episode) })
}

fn initiate_body(title: &str, episode: u32) -> Value {
    json!({
        "result": serde_json::to_value(fixtures::result(title, 10)).unwrap(),
        "target": episode_target(episode),
    })
}

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_credentials() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["indexers"][0]["api_key_configured"], true);
    assert!(response.body["indexers"][0].get("api_key").is_none());
}

#[tokio::test]
async fn test_search_ranks_and_filters() {
    let fixture = TestFixture::with_results(vec![
        fixtures::result("Show.S01E02.720p.HDTV-GRP", 50),
        fixtures::result("Show.S01E02.1080p.WEB-DL-GRP", 20),
        fixtures::result("Show.S01E02.2160p.WEB-DL-GRP", 1),
    ]);

    let response = fixture
        .post(
            "/api/v1/search",
            json!({ "query": "Show S01E02", "min_seeders": 5 }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["title"], "Show.S01E02.1080p.WEB-DL-GRP");
    assert_eq!(results[0]["indexer"], "mock");
}

#[tokio::test]
async fn test_search_rejects_blank_query() {
    let fixture = TestFixture::new();
    let response = fixture.post("/api/v1/search", json!({ "query": "  " })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_lists_indexers_and_clients() {
    let fixture = TestFixture::new();

    let indexers = fixture.get("/api/v1/indexers").await;
    assert_status!(indexers, StatusCode::OK);
    assert_eq!(indexers.body["indexers"][0]["name"], "mock");

    let clients = fixture.get("/api/v1/clients").await;
    assert_status!(clients, StatusCode::OK);
    assert_eq!(clients.body["clients"][0]["name"], "qb");
    assert_eq!(clients.body["clients"][0]["enabled"], true);
}

#[tokio::test]
async fn test_initiate_get_and_unknown() {
    let fixture = TestFixture::new();

    let created = fixture
        .post("/api/v1/acquisitions", initiate_body("Show.S01E02.1080p.WEB-DL-GRP", 2))
        .await;
    assert_status!(created, StatusCode::CREATED);
    assert_eq!(created.body["status"], "pending");
    assert_eq!(created.body["client_name"], "qb");

    let id = created.body["id"].as_str().unwrap();
    let fetched = fixture.get(&format!("/api/v1/acquisitions/{}", id)).await;
    assert_status!(fetched, StatusCode::OK);
    assert_eq!(fetched.body["title"], "Show.S01E02.1080p.WEB-DL-GRP");

    let missing = fixture.get("/api/v1/acquisitions/nope").await;
    assert_status!(missing, StatusCode::NOT_FOUND);
    assert!(missing.body["error"].is_string());
}

#[tokio::test]
async fn test_initiate_unknown_target_is_not_found() {
    let fixture = TestFixture::new();
    let response = fixture
        .post(
            "/api/v1/acquisitions",
            json!({
                "result": serde_json::to_value(fixtures::result("Show.S09E01.1080p", 10)).unwrap(),
                "target": { "type": "sub_item", "sub_item_id": "show-s09e01" },
            }),
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(fixture.client.added().is_empty());
}

#[tokio::test]
async fn test_cancel_retry_and_purge() {
    let fixture = TestFixture::new();
    let created = fixture
        .post("/api/v1/acquisitions", initiate_body("Show.S01E03.1080p.WEB-DL-GRP", 3))
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let cancelled = fixture
        .post_empty(&format!("/api/v1/acquisitions/{}/cancel", id))
        .await;
    assert_status!(cancelled, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelled");
    assert_eq!(fixture.client.removed().len(), 1);

    // Already terminal.
    let again = fixture
        .post_empty(&format!("/api/v1/acquisitions/{}/cancel", id))
        .await;
    assert_status!(again, StatusCode::CONFLICT);

    let retried = fixture
        .post_empty(&format!("/api/v1/acquisitions/{}/retry", id))
        .await;
    assert_status!(retried, StatusCode::CREATED);
    let new_id = retried.body["id"].as_str().unwrap().to_string();
    assert_ne!(new_id, id);
    assert_eq!(retried.body["status"], "pending");
    assert_status!(
        fixture.get(&format!("/api/v1/acquisitions/{}", id)).await,
        StatusCode::NOT_FOUND
    );

    // A live record cannot be purged.
    let purge_live = fixture
        .delete(&format!("/api/v1/acquisitions/{}", new_id))
        .await;
    assert_status!(purge_live, StatusCode::CONFLICT);

    fixture
        .post_empty(&format!("/api/v1/acquisitions/{}/cancel", new_id))
        .await;
    let purged = fixture
        .delete(&format!("/api/v1/acquisitions/{}", new_id))
        .await;
    assert_status!(purged, StatusCode::NO_CONTENT);

    let list = fixture.get("/api/v1/acquisitions").await;
    assert!(list.body["acquisitions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_terminal_and_status_filter() {
    let fixture = TestFixture::new();
    for episode in [4, 5] {
        let created = fixture
            .post(
                "/api/v1/acquisitions",
                initiate_body(&format!("Show.S01E{:02}.1080p.WEB-DL-GRP", episode), episode),
            )
            .await;
        assert_status!(created, StatusCode::CREATED);
        if episode == 4 {
            let id = created.body["id"].as_str().unwrap();
            fixture
                .post_empty(&format!("/api/v1/acquisitions/{}/cancel", id))
                .await;
        }
    }

    let pending = fixture.get("/api/v1/acquisitions?status=pending,active").await;
    assert_status!(pending, StatusCode::OK);
    assert_eq!(pending.body["acquisitions"].as_array().unwrap().len(), 1);

    let bad = fixture.get("/api/v1/acquisitions?status=bogus").await;
    assert_status!(bad, StatusCode::BAD_REQUEST);

    let purged = fixture.post_empty("/api/v1/acquisitions/purge").await;
    assert_status!(purged, StatusCode::OK);
    assert_eq!(purged.body["purged"], 1);

    let all = fixture.get("/api/v1/acquisitions").await;
    assert_eq!(all.body["acquisitions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_completed_transfer_lands_in_library() {
    let fixture = TestFixture::new();
    let created = fixture
        .post("/api/v1/acquisitions", initiate_body("Show.S01E02.1080p.WEB-DL-GRP", 2))
        .await;
    let client_id = created.body["client_id"].as_str().unwrap().to_string();

    let content = fixture.temp_dir.path().join("dl/Show.S01E02.1080p.mkv");
    std::fs::create_dir_all(content.parent().unwrap()).unwrap();
    std::fs::write(&content, b"video").unwrap();
    fixture.client.set_state(&client_id, ClientState::Seeding, 1.0);
    fixture
        .client
        .set_content_path(&client_id, &content.to_string_lossy());

    let report = fixture.monitor.poll_once().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(fixture.monitor.drain_imports().await, 1);

    let library = fixture
        .get("/api/v1/library?sub_item_id=show-s01e02")
        .await;
    assert_status!(library, StatusCode::OK);
    let files = library.body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(
        files[0]["relative_path"],
        "Show/Season 01/Show - S01E02 - Episode Title - 1080p.mkv"
    );
    assert!(fixture
        .library_root
        .join("Show/Season 01/Show - S01E02 - Episode Title - 1080p.mkv")
        .exists());

    let list = fixture.get("/api/v1/acquisitions").await;
    assert!(list.body["acquisitions"].as_array().unwrap().is_empty());

    let status = fixture.get("/api/v1/status").await;
    assert_eq!(status.body["monitor_enabled"], true);
    assert_eq!(status.body["monitor"]["pending"], 0);
}

#[tokio::test]
async fn test_library_rejects_two_owners() {
    let fixture = TestFixture::new();
    let response = fixture
        .get("/api/v1/library?item_id=show&sub_item_id=show-s01e01")
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_acquire_missing_season_uses_pack() {
    let fixture = TestFixture::with_results(vec![
        fixtures::result("Show.S01.1080p.WEB-DL-GRP", 25),
        fixtures::result("Show.S01E01.1080p.WEB-DL-GRP", 90),
    ]);

    let response = fixture
        .post(
            "/api/v1/acquisitions/missing",
            json!({ "item_id": "show", "season": 1 }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let outcomes = response.body["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0]["outcome"], "initiated");
    assert_eq!(outcomes[0]["query"], "Show S01");
    assert_eq!(outcomes[0]["title"], "Show.S01.1080p.WEB-DL-GRP");

    let unknown = fixture
        .post("/api/v1/acquisitions/missing", json!({ "item_id": "nope" }))
        .await;
    assert_status!(unknown, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_exposes_gauges() {
    let fixture = TestFixture::new();
    fixture
        .post("/api/v1/acquisitions", initiate_body("Show.S01E06.1080p.WEB-DL-GRP", 6))
        .await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("grabarr_acquisitions_by_status"));
    assert!(body.contains("grabarr_monitor_running"));
}
