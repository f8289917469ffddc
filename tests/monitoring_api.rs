use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use unified_tracker::config::Config;
use unified_tracker::server::create_router;
use unified_tracker::tracker::UnifiedTracker;
use unified_tracker::AppState;

const KEY: &str = "test-key";

fn create_test_app(api_keys: &[&str]) -> (Router, Arc<UnifiedTracker>) {
    let config = Config {
        api_keys: api_keys.iter().map(|k| k.to_string()).collect(),
        ..Config::default()
    };
    let tracker = Arc::new(UnifiedTracker::new(config.retention));
    let state = Arc::new(AppState::new(tracker.clone(), config));
    (create_router(state), tracker)
}

fn get(uri: &str, request_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header("x-api-key", KEY);
    if let Some(id) = request_id {
        builder = builder.header("x-request-id", id);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public_and_tracked() {
    let (app, tracker) = create_test_app(&[KEY]);

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "probe-1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "probe-1");
    assert!(response.headers().contains_key("x-response-time-us"));
    assert!(response.headers()["server-timing"]
        .to_str()
        .unwrap()
        .starts_with("total;dur="));

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");

    let info = tracker.get_request_info("probe-1").unwrap();
    assert_eq!(info.record.status_code, Some(200));
    assert_eq!(info.record.path, "/health");
}

#[tokio::test]
async fn test_missing_api_key_is_rejected_but_still_tracked() {
    let (app, tracker) = create_test_app(&[KEY]);

    let request = Request::builder()
        .uri("/monitoring/get-requests")
        .header("x-request-id", "anon-1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid or missing x-api-key");
    assert_eq!(json["status"], 401);

    let info = tracker.get_request_info("anon-1").unwrap();
    assert_eq!(info.record.status_code, Some(401));
}

#[tokio::test]
async fn test_wrong_api_key_is_rejected() {
    let (app, _) = create_test_app(&[KEY]);

    let request = Request::builder()
        .uri("/monitoring/metrics")
        .header("x-api-key", "nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_configured_keys_disables_the_check() {
    let (app, _) = create_test_app(&[]);

    let request = Request::builder()
        .uri("/monitoring/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_requests_lists_registry() {
    let (app, _) = create_test_app(&[KEY]);

    app.clone()
        .oneshot(get("/health", Some("first")))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(get("/monitoring/get-requests", Some("lister")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["first"]["status"], "completed");
    assert_eq!(json["first"]["status_code"], 200);
    assert_eq!(json["first"]["method"], "GET");
    // The listing request itself is still in flight when snapshotted
    assert_eq!(json["lister"]["status"], "running");
    assert!(json["lister"].get("execution_time").is_none());
}

#[tokio::test]
async fn test_request_info_includes_function_timings() {
    let (app, _) = create_test_app(&[KEY]);

    app.clone()
        .oneshot(get("/monitoring/get-requests", Some("lister")))
        .await
        .unwrap();
    let response = app
        .oneshot(get("/monitoring/requests/lister", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["request_id"], "lister");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["route"], "/monitoring/get-requests");
    assert_eq!(json["functions"].as_array().unwrap().len(), 1);
    assert_eq!(json["functions"][0]["name"], "snapshot_registry");
    assert!(json["active_background_tasks"].as_array().unwrap().is_empty());
    assert!(json["completed_background_tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_request_info_is_empty_object() {
    let (app, _) = create_test_app(&[KEY]);

    let response = app
        .oneshot(get("/monitoring/requests/does-not-exist", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_metrics_group_by_route_template() {
    let (app, _) = create_test_app(&[KEY]);

    for uri in [
        "/health",
        "/health",
        "/monitoring/requests/a",
        "/monitoring/requests/b",
    ] {
        app.clone().oneshot(get(uri, None)).await.unwrap();
    }
    let response = app
        .oneshot(get("/monitoring/metrics", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["GET:/health"]["count"], 2);
    let by_id = &json["GET:/monitoring/requests/:request_id"];
    assert_eq!(by_id["count"], 2);
    let avg = by_id["avg_time"].as_f64().unwrap();
    let total = by_id["total_time"].as_f64().unwrap();
    assert!((avg - total / 2.0).abs() < 1e-12);
    assert_eq!(by_id["latency_us"]["count"], 2);
    // The metrics call is still running, so it isn't aggregated yet
    assert!(json.get("GET:/monitoring/metrics").is_none());
}

#[tokio::test]
async fn test_unmatched_path_is_tracked_under_shared_route() {
    let (app, tracker) = create_test_app(&[]);

    let response = app
        .oneshot(get("/no/such/route", Some("lost")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let record = tracker.get_request_info("lost").unwrap().record;
    assert_eq!(record.status_code, Some(404));
    assert_eq!(record.path, "/no/such/route");
    assert_eq!(record.route.as_deref(), Some("<unmatched>"));

    let metrics = tracker.get_metrics();
    assert_eq!(metrics["GET:<unmatched>"].count, 1);
    assert!(metrics.get("GET:/no/such/route").is_none());
}

#[tokio::test]
async fn test_distinct_unknown_paths_do_not_grow_route_metrics() {
    let (app, tracker) = create_test_app(&[KEY]);

    for i in 0..200 {
        // No key: rejected before any handler runs
        let request = Request::builder()
            .uri(format!("/junk/{i}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(get(&format!("/junk/{i}/deeper"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    assert_eq!(tracker.summary().routes, 1);
    assert_eq!(tracker.get_metrics()["GET:<unmatched>"].count, 400);
}

#[tokio::test]
async fn test_generated_request_id_is_echoed() {
    let (app, tracker) = create_test_app(&[]);

    let response = app.oneshot(get("/health", None)).await.unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();

    assert_eq!(id.len(), 36);
    assert!(tracker.get_request_info(&id).is_some());
}

#[tokio::test]
async fn test_summary_reports_counts_and_policy() {
    let (app, _) = create_test_app(&[KEY]);

    app.clone().oneshot(get("/health", None)).await.unwrap();
    let response = app
        .oneshot(get("/monitoring/summary", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["tracked_requests"], 2);
    assert_eq!(json["running_requests"], 1);
    assert_eq!(json["routes"], 1);
    assert_eq!(json["max_requests"], 10_000);
    assert_eq!(json["max_age_secs"], 3600);
}
