//! Dispatch engine integration tests: preconditions, the orchestrator
//! conflict rule, session reuse, transport failure semantics, and
//! message construction.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use coordinator::dispatch::gateway::RecordingGateway;
use coordinator::ledger::LedgerSync;
use coordinator::store;
use coordinator::{api, db, AppState};
use shared_types::{Agent, AgentStatus, Workspace};

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

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
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

async fn seed_workspace(state: &AppState, slug: &str) -> Workspace {
    let ws = Workspace {
        id: format!("ws-{slug}"),
        name: slug.to_string(),
        slug: slug.to_string(),
    };
    store::workspaces::insert(&state.db, &ws).await.unwrap();
    ws
}

async fn seed_agent(
    state: &AppState,
    id: &str,
    workspace_id: &str,
    is_master: bool,
    status: AgentStatus,
) -> Agent {
    let agent = Agent {
        id: id.to_string(),
        name: format!("agent {id}"),
        workspace_id: workspace_id.to_string(),
        is_master,
        status,
        session_key: None,
    };
    store::agents::insert(&state.db, &agent).await.unwrap();
    agent
}

async fn create_task(app: &axum::Router, body: Value) -> String {
    let (status, created) = json_response(app, post_json("/tasks", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    created["task"]["id"].as_str().unwrap().to_string()
}

async fn task_status(app: &axum::Router, id: &str) -> String {
    let req = Request::builder()
        .method("GET")
        .uri(format!("/tasks/{id}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = json_response(app, req).await;
    body["task"]["status"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn dispatch_without_assigned_agent_is_400() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state);

    let id = create_task(&app, json!({ "title": "Unassigned", "workspace_id": "ws-1" })).await;
    let (status, body) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no assigned agent"));
}

#[tokio::test]
async fn dispatch_to_unknown_agent_is_404() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state);

    let id = create_task(
        &app,
        json!({ "title": "Ghost rider", "workspace_id": "ws-1", "assigned_agent_id": "ghost" }),
    )
    .await;
    let (status, _) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orchestrator_conflict_blocks_and_lifts() {
    let (state, _gateway, _temp) = setup().await;
    let ws = seed_workspace(&state, "ops").await;
    seed_agent(&state, "master-1", &ws.id, true, AgentStatus::Online).await;
    seed_agent(&state, "master-2", &ws.id, true, AgentStatus::Busy).await;
    let app = app(state.clone());

    let id = create_task(
        &app,
        json!({ "title": "Channel owner", "workspace_id": ws.id, "assigned_agent_id": "master-1" }),
    )
    .await;

    let (status, body) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ORCHESTRATOR_CONFLICT");
    let conflicting = body["conflicting_agents"].as_array().unwrap();
    assert_eq!(conflicting.len(), 1);
    assert_eq!(conflicting[0], "agent master-2");

    // Once the other master goes offline the dispatch is allowed.
    store::agents::update_status(&state.db, "master-2", AgentStatus::Offline)
        .await
        .unwrap();
    let (status, _) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn non_master_targets_ignore_other_masters() {
    let (state, _gateway, _temp) = setup().await;
    let ws = seed_workspace(&state, "ops").await;
    seed_agent(&state, "worker-1", &ws.id, false, AgentStatus::Online).await;
    seed_agent(&state, "master-1", &ws.id, true, AgentStatus::Online).await;
    let app = app(state);

    let id = create_task(
        &app,
        json!({ "title": "Worker job", "workspace_id": ws.id, "assigned_agent_id": "worker-1" }),
    )
    .await;
    let (status, _) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn connect_failure_is_503_with_zero_mutation() {
    let (state, gateway, _temp) = setup().await;
    let ws = seed_workspace(&state, "ops").await;
    seed_agent(&state, "worker-1", &ws.id, false, AgentStatus::Online).await;
    gateway.fail_connect.store(true, Ordering::Release);
    let app = app(state.clone());

    let id = create_task(
        &app,
        json!({ "title": "No gateway", "workspace_id": ws.id, "assigned_agent_id": "worker-1" }),
    )
    .await;

    let (status, body) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "GATEWAY_UNAVAILABLE");
    assert_eq!(task_status(&app, &id).await, "inbox");

    // A retry reuses the session row rather than stacking a second one.
    let (status, _) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let active = store::sessions::count_active_for_agent(&state.db, "worker-1")
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn call_failure_is_500_with_zero_mutation() {
    let (state, gateway, _temp) = setup().await;
    let ws = seed_workspace(&state, "ops").await;
    seed_agent(&state, "worker-1", &ws.id, false, AgentStatus::Online).await;
    gateway.fail_call.store(true, Ordering::Release);
    let app = app(state);

    let id = create_task(
        &app,
        json!({ "title": "Flaky call", "workspace_id": ws.id, "assigned_agent_id": "worker-1" }),
    )
    .await;

    let (status, body) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DISPATCH_CALL_FAILED");
    assert_eq!(task_status(&app, &id).await, "inbox");
}

#[tokio::test]
async fn successful_dispatch_moves_task_and_reuses_session() {
    let (state, gateway, _temp) = setup().await;
    let ws = seed_workspace(&state, "ops").await;
    seed_agent(&state, "worker-1", &ws.id, false, AgentStatus::Online).await;
    let app = app(state.clone());

    let id = create_task(
        &app,
        json!({
            "title": "Deliver the goods",
            "workspace_id": ws.id,
            "assigned_agent_id": "worker-1",
            "external_request_id": "req-42",
        }),
    )
    .await;

    let (status, body) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "in_progress");
    assert_eq!(body["idempotency_key"], "dispatch-req-42");
    let first_session = body["session_id"].as_str().unwrap().to_string();

    // A second dispatch reuses the same session and dedups at the
    // transport via the same idempotency key.
    let (status, body) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], first_session.as_str());
    assert_eq!(
        store::sessions::count_active_for_agent(&state.db, "worker-1")
            .await
            .unwrap(),
        1
    );

    let calls = gateway.calls.lock().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "chat.send");
    assert_eq!(calls[0].1["idempotency_key"], "dispatch-req-42");
    let message = calls[0].1["message"].as_str().unwrap();
    assert!(message.contains("Task id:"));
    assert!(message.contains("Output directory: tasks/deliver-the-goods"));
    assert!(message.contains("move the task to review"));
}

#[tokio::test]
async fn message_includes_initiative_context_when_resolvable() {
    let (state, gateway, _temp) = setup().await;
    let ws = seed_workspace(&state, "ops").await;
    seed_agent(&state, "worker-1", &ws.id, false, AgentStatus::Online).await;

    // Seed a ledger entry the task will resolve to.
    state
        .ledger
        .try_record(
            "INIT-apollo",
            "planning",
            "seeded for test",
            Some(coordinator::ledger::SeedEntry {
                title: "Apollo rollout".to_string(),
                source: None,
                external_request_id: None,
                priority: None,
            }),
        )
        .await
        .unwrap();

    let app = app(state);
    let id = create_task(
        &app,
        json!({
            "title": "Wire the capsule",
            "workspace_id": ws.id,
            "assigned_agent_id": "worker-1",
            "initiative_id": "INIT-apollo",
        }),
    )
    .await;

    let (status, _) = json_response(&app, post_empty(&format!("/tasks/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::OK);

    let calls = gateway.calls.lock().await;
    let message = calls[0].1["message"].as_str().unwrap();
    let paragraphs: Vec<&str> = message.split("\n\n").collect();
    assert!(
        paragraphs[1].starts_with("Initiative context: Apollo rollout"),
        "initiative block should follow the first paragraph, got: {}",
        paragraphs[1]
    );
}

#[tokio::test]
async fn dispatching_an_unknown_task_is_404() {
    let (state, _gateway, _temp) = setup().await;
    let app = app(state);

    let (status, _) = json_response(&app, post_empty("/tasks/ghost/dispatch")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
