mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app::{spawn_test_server, spawn_test_server_with_limits};
use common::auth::{auth_header, new_user, token_for};
use common::http::{assert_json_error, assert_status_ok_json, call, request};

#[tokio::test]
async fn it_leaderboard_orders_by_xp() {
    let app = spawn_test_server().await;
    let top = token_for(&app, "top-user", Some("Top"));
    let second = token_for(&app, "second-user", Some("Second"));
    let idle = token_for(&app, "idle-user", None);

    call(&app.app, Method::POST, "/api/stats", &top, Some(json!({ "action": "complete_course" }))).await;
    call(&app.app, Method::POST, "/api/stats", &second, Some(json!({ "action": "complete_lesson" }))).await;
    call(&app.app, Method::GET, "/api/stats", &idle, None).await;

    let (status, body) = call(&app.app, Method::GET, "/api/leaderboard", &top, None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["window"], "allTime");
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["id"], "top-user");
    assert_eq!(entries[0]["name"], "Top");
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["xp"], 50);
    assert_eq!(entries[0]["coursesCompleted"], 1);
    assert_eq!(entries[1]["id"], "second-user");
    assert_eq!(entries[2]["id"], "idle-user");

    // Windowed views only list users who earned XP in the window
    let (_, daily) = call(&app.app, Method::GET, "/api/leaderboard?window=daily", &top, None).await;
    assert_eq!(daily["data"]["window"], "daily");
    assert_eq!(daily["data"]["entries"].as_array().unwrap().len(), 2);

    let (_, limited) = call(&app.app, Method::GET, "/api/leaderboard?limit=1", &top, None).await;
    assert_eq!(limited["data"]["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn it_leaderboard_names_users_created_by_write_paths() {
    let app = spawn_test_server().await;
    let maker = token_for(&app, "maker-user", Some("Maker"));
    let roadmap = json!({
        "id": "r1",
        "title": "Rust",
        "chapters": [{
            "id": "c1",
            "title": "Basics",
            "tasks": [{ "id": "t1", "kind": { "type": "trueFalse" } }]
        }]
    });

    let (status, _) = call(&app.app, Method::POST, "/api/roadmaps", &maker, Some(roadmap)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/tasks/grade",
        &maker,
        Some(json!({ "roadmapId": "r1", "chapterId": "c1", "taskId": "t1", "isCorrect": true })),
    )
    .await;
    assert_status_ok_json(status, &body);

    let (_, board) = call(&app.app, Method::GET, "/api/leaderboard", &maker, None).await;
    let entries = board["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "maker-user");
    assert_eq!(entries[0]["name"], "Maker");
}

#[tokio::test]
async fn it_leaderboard_rejects_unknown_window() {
    let app = spawn_test_server().await;
    let (_, token) = new_user(&app);

    let (status, body) = call(&app.app, Method::GET, "/api/leaderboard?window=yearly", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn it_leaderboard_stream_is_sse_and_capped() {
    let app = spawn_test_server_with_limits(1_000, 1).await;
    let (_, token) = new_user(&app);

    let first = request(
        &app.app,
        Method::GET,
        "/api/leaderboard/stream",
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    let content_type = first
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));

    // The open stream holds the only slot
    let second = request(
        &app.app,
        Method::GET,
        "/api/leaderboard/stream",
        None,
        &[("authorization", auth_header(&token))],
    )
    .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    drop(first);
    assert_eq!(app.state.sse_connections(), 0);
}
