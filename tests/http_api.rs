//! HTTP routes driven through the router without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use gymhost_lib::session::InstanceRegistry;
use gymhost_lib::web_server::build_router;
use gymhost_lib::GymApi;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

fn app() -> Router {
    let api = GymApi::new(Arc::new(InstanceRegistry::new()));
    build_router(api, Arc::new(Notify::new()), true)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn create(app: &Router, env: &str) -> String {
    let (status, body) = send(app, "POST", "/instances", Some(json!({"env_spec_name": env}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["instance_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn cartpole_session_flow() {
    let app = app();
    let id = create(&app, "CartPole-v0").await;
    assert_eq!(id.len(), 8);

    let (status, body) = send(&app, "GET", "/instances", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["all_envs"][&id], "CartPole-v0");

    let (_, body) = send(&app, "POST", &format!("/instances/{}/check_exists", id), None).await;
    assert_eq!(body, json!({"exists": true}));

    let (status, body) = send(&app, "POST", &format!("/instances/{}/reset", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["observation"].as_array().unwrap().len(), 4);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/instances/{}/step", id),
        Some(json!({"action": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["observation"].as_array().unwrap().len(), 4);
    assert_eq!(body["reward"], json!(1.0));
    assert_eq!(body["done"], json!(false));
    assert!(body["info"].is_object());

    let (_, body) = send(&app, "GET", &format!("/instances/{}/action_space", id), None).await;
    assert_eq!(body, json!({"info": {"name": "Discrete", "n": 2}}));

    let (_, body) = send(&app, "GET", &format!("/instances/{}/observation_space", id), None).await;
    assert_eq!(body["info"]["name"], "Box");
    assert_eq!(body["info"]["shape"], json!([4]));
    assert_eq!(body["info"]["low"].as_array().unwrap().len(), 4);

    let (status, body) = send(&app, "GET", &format!("/instances/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instance_id"], json!(id));
    assert_eq!(body["total_steps"], 1);
    assert_eq!(body["monitor"]["state"], "inactive");
    assert_eq!(body["max_episode_steps"], 200);
    assert_eq!(body["reward_threshold"], json!(195.0));
}

#[tokio::test]
async fn legacy_routes() {
    let app = app();
    let (status, body) = send(&app, "POST", "/v1/envs/", Some(json!({"env_id": "Pendulum-v0"}))).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["instance_id"].as_str().unwrap().to_string();

    let (_, body) = send(&app, "GET", "/v1/envs/", None).await;
    assert_eq!(body["all_envs"][&id], "Pendulum-v0");

    let (_, body) = send(&app, "POST", &format!("/v1/envs/{}/reset/", id), None).await;
    assert_eq!(body["observation"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/envs/{}/step/", id),
        Some(json!({"action": [0.25]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reward"].as_f64().unwrap() <= 0.0);

    let (_, body) = send(&app, "GET", &format!("/v1/envs/{}/action_space/", id), None).await;
    assert_eq!(body["info"]["name"], "Box");
    assert_eq!(body["info"]["high"], json!([2.0]));

    let (_, body) = send(&app, "POST", "/v1/envs/nope/check_exists/", None).await;
    assert_eq!(body, json!({"exists": false}));
}

#[tokio::test]
async fn error_statuses() {
    let app = app();

    let (status, body) = send(&app, "POST", "/instances/nope/reset", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
    assert_eq!(body["message"], "Instance_id nope unknown");

    let (status, _) = send(&app, "GET", "/instances/nope/action_space", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "POST", "/instances", Some(json!({"env_spec_name": "Nope-v0"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_argument");

    let (status, body) = send(&app, "POST", "/instances", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("env_spec_name"));

    let id = create(&app, "CartPole-v0").await;
    let (status, _) = send(&app, "POST", &format!("/instances/{}/step", id), Some(json!({"action": 0}))).await;
    assert_eq!(status, StatusCode::CONFLICT, "stepping before reset");

    send(&app, "POST", &format!("/instances/{}/reset", id), None).await;
    for bad in [json!(7), json!(-1), json!("left"), json!([1])] {
        let (status, body) = send(&app, "POST", &format!("/instances/{}/step", id), Some(json!({"action": bad}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    }

    let request = Request::builder()
        .method("POST")
        .uri(format!("/instances/{}/step", id))
        .header("content-type", "application/json")
        .body(Body::from("{\"action\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/v1/upload/", Some(json!({"training_dir": "/tmp", "api_key": "k"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "no upload endpoint configured");
}

#[tokio::test]
async fn monitor_routes() {
    let app = app();
    let dir = tempfile::tempdir().unwrap();
    let id = create(&app, "CartPole-v0").await;
    let start = json!({"directory": dir.path().to_string_lossy(), "force": true});

    let (status, _) = send(&app, "POST", &format!("/instances/{}/monitor/start", id), Some(start.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "POST", &format!("/instances/{}/monitor/start", id), Some(start)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    send(&app, "POST", &format!("/instances/{}/reset", id), None).await;
    loop {
        let (_, body) = send(&app, "POST", &format!("/instances/{}/step", id), Some(json!({"action": 0}))).await;
        if body["done"] == json!(true) {
            break;
        }
    }

    let (status, _) = send(&app, "POST", &format!("/v1/envs/{}/monitor/close/", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "POST", &format!("/instances/{}/monitor/close", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let manifests: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".manifest.json"))
        .collect();
    assert_eq!(manifests.len(), 1);

    let (status, body) = send(&app, "POST", &format!("/instances/{}/monitor/start", id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("directory"));
}

#[tokio::test]
async fn monitor_into_regular_file_is_bad_request() {
    let app = app();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("results.txt");
    std::fs::write(&file, b"occupied").unwrap();
    let id = create(&app, "CartPole-v0").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/instances/{}/monitor/start", id),
        Some(json!({"directory": file.to_string_lossy()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_argument");

    let (_, body) = send(&app, "GET", &format!("/instances/{}", id), None).await;
    assert_eq!(body["monitor"]["state"], "inactive");
}

#[tokio::test]
async fn shutdown_route_notifies() {
    let notify = Arc::new(Notify::new());
    let api = GymApi::new(Arc::new(InstanceRegistry::new()));
    let app = build_router(api, notify.clone(), false);

    let (status, body) = send(&app, "POST", "/v1/shutdown/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Server shutting down"));
    assert!(tokio::time::timeout(Duration::from_secs(1), notify.notified()).await.is_ok());
}
