mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::util::ServiceExt;

use sigma::api::build_router;
use sigma::controller::Allocation;
use sigma::schedule::Direction;

async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let router = build_router(common::offline_controller());
    let (status, body) = send(router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn snapshot_starts_on_default_schedule() {
    let router = build_router(common::offline_controller());
    let (status, body) = send(router, get("/api/snapshot")).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["active_direction"], "north");
    assert_eq!(json["phase"], "all_red");
    assert_eq!(json["using_pending"], false);
    assert!(json["pending"].is_null());
    assert!((json["cycle_length"].as_f64().unwrap() - 50.0).abs() < 1e-9);
    assert_eq!(json["red"]["reported"]["east"], 50.0);
    assert!(json["rt_age_ms"].is_null());
}

#[tokio::test]
async fn scores_stage_allocation_without_device() {
    let controller = common::offline_controller();
    let router = build_router(controller.clone());

    let (status, body) = send(
        router.clone(),
        post_json("/api/scores", r#"{"north":0,"east":30,"south":10,"west":5}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let allocation: Allocation = serde_json::from_slice(&body).unwrap();
    assert!(!allocation.serial_sent);
    assert!(!allocation.superseded);
    assert!((allocation.schedule.green(Direction::East) - 34.0).abs() < 0.01);
    assert!((allocation.cycle_length - 92.33).abs() < 0.01);

    let (_, body) = send(router.clone(), get("/api/snapshot")).await;
    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["using_pending"], true);
    assert!(!snapshot["pending"].is_null());

    let (status, body) = send(router, get("/api/payload")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "18.00,64.33,34.00,48.33,15.00,67.33,15.33,67.00"
    );
}

#[tokio::test]
async fn partial_scores_use_fallback() {
    let router = build_router(common::offline_controller());
    let (status, body) = send(router, post_json("/api/scores", r#"{"east":30}"#)).await;
    assert_eq!(status, StatusCode::OK);

    let allocation: Allocation = serde_json::from_slice(&body).unwrap();
    // fallback 0 gives weight 0.5 against east's 1.5: 10 + 40 * 0.5 = 30
    assert!((allocation.schedule.green(Direction::East) - 30.0).abs() < 1e-9);
    assert!((allocation.schedule.green(Direction::North) - 16.666_666).abs() < 1e-3);
}

#[tokio::test]
async fn malformed_scores_are_rejected() {
    let router = build_router(common::offline_controller());
    let (status, _) = send(router.clone(), post_json("/api/scores", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(router, post_json("/api/scores", "[1,2,3,4]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn explicit_schedule_is_validated() {
    let router = build_router(common::offline_controller());
    let negative = r#"{
        "north": {"green": 20, "red": 60},
        "east": {"green": -1, "red": 60},
        "south": {"green": 20, "red": 60},
        "west": {"green": 20, "red": 60}
    }"#;
    let (status, body) = send(router.clone(), post_json("/api/schedule", negative)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("east.green"));

    let valid = negative.replace("-1", "25");
    let (status, body) = send(router.clone(), post_json("/api/schedule", &valid)).await;
    assert_eq!(status, StatusCode::OK);
    let allocation: Allocation = serde_json::from_slice(&body).unwrap();
    assert!((allocation.cycle_length - 95.0).abs() < 1e-9);

    let (status, _) = send(router, post_json("/api/schedule", r#"{"north": 1}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn device_view_without_reports() {
    let router = build_router(common::offline_controller());
    let (status, body) = send(router, get("/api/device")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["live"].is_null());
    assert_eq!(json["schedule_source"], "default");
    assert_eq!(json["schedule"]["north"]["green"], 10.0);
}

#[tokio::test]
async fn serial_status_reports_disabled_link() {
    let router = build_router(common::offline_controller());
    let (status, body) = send(router, get("/api/serial_status")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ready"], false);
    assert_eq!(json["port"], "/dev/null");
    assert_eq!(json["detail"], "serial link disabled");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let router = build_router(common::offline_controller());
    let (status, _) = send(router, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
