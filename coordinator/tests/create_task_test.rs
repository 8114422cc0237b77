//! Idempotency guard integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::Row;
use tower::ServiceExt;

use coordinator::dispatch::gateway::RecordingGateway;
use coordinator::ledger::LedgerSync;
use coordinator::tasks::create::{self, CreateTaskRequest};
use coordinator::{api, db, AppState};

async fn setup() -> (Arc<AppState>, Arc<RecordingGateway>, tempfile::TempDir) {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = temp.path().join("mission-control.db");
    let pool = db::connect(db_path.to_str().expect("invalid path"))
        .await
        .expect("failed to open database");
    let gateway = Arc::new(RecordingGateway::default());
    let state = Arc::new(AppState {
        db: pool,
        gateway: gateway.clone(),
        ledger: LedgerSync::new(temp.path().join("initiatives.json")),
    });
    (state, gateway, temp)
}

fn app(state: Arc<AppState>) -> axum::Router {
    api::router().with_state(state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("invalid json");
    (status, value)
}

async fn task_row_count(state: &AppState) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM tasks")
        .fetch_one(&state.db)
        .await
        .unwrap()
        .try_get("n")
        .unwrap()
}

#[tokio::test]
async fn retried_creation_returns_the_original_row() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state.clone());

    let body = json!({
        "title": "Index the archive",
        "workspace_id": "ws-1",
        "external_request_id": "req-001",
    });

    let (status, first) = json_response(&app, post_json("/tasks", body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["idempotent"], false);

    let (status, second) = json_response(&app, post_json("/tasks", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["idempotent"], true);
    assert_eq!(second["task"]["id"], first["task"]["id"]);

    assert_eq!(task_row_count(&state).await, 1);
}

#[tokio::test]
async fn null_external_request_ids_never_dedupe() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state.clone());

    let body = json!({ "title": "Same title", "workspace_id": "ws-1" });
    let (status, first) = json_response(&app, post_json("/tasks", body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = json_response(&app, post_json("/tasks", body)).await;
    assert_eq!(status, StatusCode::CREATED);

    assert_ne!(first["task"]["id"], second["task"]["id"]);
    assert_eq!(task_row_count(&state).await, 2);
}

#[tokio::test]
async fn validation_rejects_before_any_write() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state.clone());

    let (status, body) = json_response(
        &app,
        post_json("/tasks", json!({ "title": "   ", "workspace_id": "ws-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(task_row_count(&state).await, 0);
}

#[tokio::test]
async fn task_type_config_shape_is_validated() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state.clone());

    let (status, _) = json_response(
        &app,
        post_json(
            "/tasks",
            json!({
                "title": "Team effort",
                "workspace_id": "ws-1",
                "task_type": "claude-team",
                "task_type_config": { "team_size": 0 },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_response(
        &app,
        post_json(
            "/tasks",
            json!({
                "title": "Team effort",
                "workspace_id": "ws-1",
                "task_type": "claude-team",
                "task_type_config": { "team_size": 2, "team_members": ["a", "b"] },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task_row_count(&state).await, 1);
}

#[tokio::test]
async fn subtask_depth_is_limited_to_one() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state.clone());

    let (status, parent) = json_response(
        &app,
        post_json("/tasks", json!({ "title": "Parent", "workspace_id": "ws-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let parent_id = parent["task"]["id"].as_str().unwrap().to_string();

    let (status, child) = json_response(
        &app,
        post_json(
            "/tasks",
            json!({ "title": "Child", "workspace_id": "ws-1", "parent_task_id": parent_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let child_id = child["task"]["id"].as_str().unwrap().to_string();

    let (status, body) = json_response(
        &app,
        post_json(
            "/tasks",
            json!({ "title": "Grandchild", "workspace_id": "ws-1", "parent_task_id": child_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("depth limit"));
}

#[tokio::test]
async fn unknown_parent_is_a_validation_error() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state);

    let (status, _) = json_response(
        &app,
        post_json(
            "/tasks",
            json!({ "title": "Orphan", "workspace_id": "ws-1", "parent_task_id": "ghost" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_creations_converge_on_one_row() {
    let (state, _gateway, _temp) = setup().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            create::create_task(
                &state,
                CreateTaskRequest {
                    title: "Racy creation".to_string(),
                    workspace_id: "ws-1".to_string(),
                    external_request_id: Some("req-race".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("creation should always succeed")
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().task.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller should observe the same task id");
    assert_eq!(task_row_count(&state).await, 1);
}

#[tokio::test]
async fn delete_cascades_and_unknown_delete_is_404() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state.clone());

    let (_, created) = json_response(
        &app,
        post_json("/tasks", json!({ "title": "Doomed", "workspace_id": "ws-1" })),
    )
    .await;
    let task_id = created["task"]["id"].as_str().unwrap().to_string();

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/tasks/{task_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = json_response(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(task_row_count(&state).await, 0);

    let delete_again = Request::builder()
        .method("DELETE")
        .uri(format!("/tasks/{task_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = json_response(&app, delete_again).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
