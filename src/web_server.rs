//! Web Server
//!
//! axum routes over [`GymApi`]. Two route sets are served:
//!
//! - `/instances/...` resource paths
//! - `/v1/envs/.../` paths with trailing slashes, as existing gym HTTP
//!   clients expect them
//!
//! Session operations block on the session guard and the environment, so
//! they run on the blocking pool rather than on the async workers.

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;

use crate::commands::instances::{
    CreateResponse, ExistsResponse, ListResponse, ResetResponse, SpaceInfoResponse, StepResponse,
};
use crate::commands::upload::UploadRequest;
use crate::commands::GymApi;
use crate::config::ServerConfig;
use crate::envs::EnvCatalog;
use crate::error::{GymError, GymResult};
use crate::session::{InstanceRegistry, SessionInfo};
use crate::upload::HttpUploader;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub api: GymApi,
    /// Notified by the shutdown route
    pub shutdown: Arc<Notify>,
}

/// Run `f` on the blocking pool
async fn blocking<T, F>(f: F) -> GymResult<T>
where
    F: FnOnce() -> GymResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GymError::Internal(format!("Worker task failed: {}", e)))?
}

/// Parse an optional JSON body. Empty bodies yield the default request,
/// leaving required-field checks to the facade.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> GymResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected request body: {}", e);
        GymError::InvalidArgument(format!("Request body is not valid JSON: {}", e))
    })
}

async fn create_instance(State(state): State<AppState>, body: Bytes) -> GymResult<Json<CreateResponse>> {
    let request = parse_body(&body)?;
    let api = state.api;
    blocking(move || api.create(request)).await.map(Json)
}

async fn list_instances(State(state): State<AppState>) -> Json<ListResponse> {
    Json(state.api.list_all())
}

async fn check_exists(State(state): State<AppState>, Path(instance_id): Path<String>) -> Json<ExistsResponse> {
    Json(state.api.exists(&instance_id))
}

async fn session_info(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> GymResult<Json<SessionInfo>> {
    let api = state.api;
    blocking(move || api.session_info(&instance_id)).await.map(Json)
}

async fn reset(State(state): State<AppState>, Path(instance_id): Path<String>) -> GymResult<Json<ResetResponse>> {
    let api = state.api;
    blocking(move || api.reset(&instance_id)).await.map(Json)
}

async fn step(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    body: Bytes,
) -> GymResult<Json<StepResponse>> {
    let request = parse_body(&body)?;
    let api = state.api;
    blocking(move || api.step(&instance_id, request)).await.map(Json)
}

async fn action_space(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> GymResult<Json<SpaceInfoResponse>> {
    let api = state.api;
    blocking(move || api.action_space_info(&instance_id)).await.map(Json)
}

async fn observation_space(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> GymResult<Json<SpaceInfoResponse>> {
    let api = state.api;
    blocking(move || api.observation_space_info(&instance_id)).await.map(Json)
}

async fn monitor_start(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    body: Bytes,
) -> GymResult<StatusCode> {
    let request = parse_body(&body)?;
    let api = state.api;
    blocking(move || api.monitor_start(&instance_id, request)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn monitor_close(State(state): State<AppState>, Path(instance_id): Path<String>) -> GymResult<StatusCode> {
    let api = state.api;
    blocking(move || api.monitor_close(&instance_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload(State(state): State<AppState>, body: Bytes) -> GymResult<StatusCode> {
    let request: UploadRequest = parse_body(&body)?;
    state.api.upload(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown(State(state): State<AppState>) -> &'static str {
    info!("Shutdown requested");
    state.shutdown.notify_one();
    "Server shutting down"
}

/// Build the router with both route sets
pub fn build_router(api: GymApi, shutdown_signal: Arc<Notify>, cors: bool) -> Router {
    let state = AppState {
        api,
        shutdown: shutdown_signal,
    };

    let router = Router::new()
        .route("/instances", post(create_instance).get(list_instances))
        .route("/instances/{instance_id}", get(session_info))
        .route("/instances/{instance_id}/check_exists", post(check_exists))
        .route("/instances/{instance_id}/reset", post(reset))
        .route("/instances/{instance_id}/step", post(step))
        .route("/instances/{instance_id}/action_space", get(action_space))
        .route("/instances/{instance_id}/observation_space", get(observation_space))
        .route("/instances/{instance_id}/monitor/start", post(monitor_start))
        .route("/instances/{instance_id}/monitor/close", post(monitor_close))
        .route("/upload", post(upload))
        .route("/shutdown", post(shutdown))
        .route("/v1/envs/", post(create_instance).get(list_instances))
        .route("/v1/envs/{instance_id}/check_exists/", post(check_exists))
        .route("/v1/envs/{instance_id}/reset/", post(reset))
        .route("/v1/envs/{instance_id}/step/", post(step))
        .route("/v1/envs/{instance_id}/action_space/", get(action_space))
        .route("/v1/envs/{instance_id}/observation_space/", get(observation_space))
        .route("/v1/envs/{instance_id}/monitor/start/", post(monitor_start))
        .route("/v1/envs/{instance_id}/monitor/close/", post(monitor_close))
        .route("/v1/upload/", post(upload))
        .route("/v1/shutdown/", post(shutdown))
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Resolves on an HTTP shutdown request or Ctrl-C
async fn wait_for_shutdown(notify: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = notify.notified() => info!("Stopping after shutdown request"),
        _ = ctrl_c => info!("Received Ctrl-C, stopping"),
    }
}

/// Build the facade described by `config`
pub fn build_api(config: &ServerConfig) -> GymResult<GymApi> {
    let registry = InstanceRegistry::with_id_len(
        Arc::new(EnvCatalog::with_builtin()),
        config.registry.id_length,
    );
    let mut api = GymApi::new(Arc::new(registry));

    match &config.upload.endpoint {
        Some(endpoint) => {
            let uploader = HttpUploader::new(endpoint, config.upload.timeout_secs)?;
            info!("Uploads go to {}", endpoint);
            api = api.with_uploader(Arc::new(uploader));
        }
        None => debug!("No upload endpoint configured; /v1/upload is disabled"),
    }
    Ok(api)
}

/// Serve until shut down
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let api = build_api(&config)?;
    let shutdown_signal = Arc::new(Notify::new());
    let app = build_router(api, shutdown_signal.clone(), config.server.cors);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Gym server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_signal))
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
