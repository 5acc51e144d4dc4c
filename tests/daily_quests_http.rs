mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::app::spawn_test_server;
use common::auth::new_user;
use common::http::{assert_json_error, assert_status_ok_json, call};

async fn complete_quest(app: &axum::Router, token: &str, quest: &Value) -> Value {
    let target = quest["target"].as_u64().unwrap();
    let mut remaining = target;
    let mut body = Value::Null;
    while remaining > 0 {
        let step = remaining.min(100);
        let (status, reply) = call(
            app,
            Method::POST,
            "/api/daily-quests",
            token,
            Some(json!({
                "action": "updateProgress",
                "progressType": quest["type"],
                "increment": step,
            })),
        )
        .await;
        assert_status_ok_json(status, &reply);
        body = reply;
        remaining -= step;
    }
    body
}

#[tokio::test]
async fn it_daily_quests_are_stable_for_the_day() {
    let app = spawn_test_server().await;
    let (_, token) = new_user(&app);

    let (status, first) = call(&app.app, Method::GET, "/api/daily-quests", &token, None).await;
    assert_status_ok_json(status, &first);
    let quests = first["data"]["quests"].as_array().unwrap();
    assert_eq!(quests.len(), 3);
    assert_eq!(first["data"]["totalXPEarned"], 0);
    assert_eq!(first["data"]["allCompleted"], false);
    for q in quests {
        assert_eq!(q["progress"], 0);
        assert_eq!(q["claimed"], false);
    }

    let (_, second) = call(&app.app, Method::GET, "/api/daily-quests", &token, None).await;
    assert_eq!(first["data"], second["data"]);

    // Every user gets the same selection on the same day
    let (_, other_token) = new_user(&app);
    let (_, other) = call(&app.app, Method::GET, "/api/daily-quests", &other_token, None).await;
    let ids = |v: &Value| -> Vec<String> {
        v["data"]["quests"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(ids(&first), ids(&other));
}

#[tokio::test]
async fn it_claim_pays_once_and_then_conflicts() {
    let app = spawn_test_server().await;
    let (_, token) = new_user(&app);

    let (_, quests) = call(&app.app, Method::GET, "/api/daily-quests", &token, None).await;
    let quest = quests["data"]["quests"][0].clone();
    let quest_id = quest["id"].as_str().unwrap().to_string();
    let reward = quest["xpReward"].as_u64().unwrap();

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "claim", "questId": quest_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "QUEST_NOT_COMPLETED");

    let progressed = complete_quest(&app.app, &token, &quest).await;
    let updated = progressed["data"]["quests"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["id"] == quest["id"])
        .unwrap()
        .clone();
    assert_eq!(updated["completed"], true);
    assert_eq!(updated["progress"], quest["target"]);

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "claim", "questId": quest_id })),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["questId"], quest_id.as_str());
    assert_eq!(body["data"]["xpReward"], reward);
    assert_eq!(body["data"]["reward"]["xpGained"], reward);
    assert_eq!(body["data"]["quests"]["totalXPEarned"], reward);

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "claim", "questId": quest_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "QUEST_ALREADY_CLAIMED");

    let (_, stats) = call(&app.app, Method::GET, "/api/stats", &token, None).await;
    assert_eq!(stats["data"]["xp"], reward);
}

#[tokio::test]
async fn it_unknown_quest_and_bad_increments_are_rejected() {
    let app = spawn_test_server().await;
    let (_, token) = new_user(&app);
    call(&app.app, Method::GET, "/api/daily-quests", &token, None).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "claim", "questId": "no_such_quest" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "QUEST_NOT_FOUND");

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "updateProgress", "progressType": "earn_xp", "increment": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "updateProgress", "progressType": "dance", "increment": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/daily-quests",
        &token,
        Some(json!({ "action": "teleport" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn it_concurrent_claims_pay_exactly_once() {
    let app = spawn_test_server().await;
    let (_, token) = new_user(&app);

    let (_, quests) = call(&app.app, Method::GET, "/api/daily-quests", &token, None).await;
    let quest = quests["data"]["quests"][0].clone();
    complete_quest(&app.app, &token, &quest).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = app.app.clone();
        let token = token.clone();
        let quest_id = quest["id"].clone();
        handles.push(tokio::spawn(async move {
            call(
                &router,
                Method::POST,
                "/api/daily-quests",
                &token,
                Some(json!({ "action": "claim", "questId": quest_id })),
            )
            .await
            .0
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 1);

    let (_, stats) = call(&app.app, Method::GET, "/api/stats", &token, None).await;
    assert_eq!(stats["data"]["xp"], quest["xpReward"]);
}
