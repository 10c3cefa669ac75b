//! Purpose: Provide the HTTP/JSON server for the pet resource.
//! Exports: `ServeConfig`, `AppState`, `router`, `serve`, `validate_config`,
//! `init_tracing`, `openapi_document`, `BackgroundServer`.
//! Role: Axum route table mapping `/api/pets` onto `PetService`.
//! Invariants: Error envelopes are `{"error":{"kind","message","hint"?}}`; kinds stay stable.
//! Invariants: Loopback-only unless explicitly allowed.
//! Invariants: The provider-state route exists only when enabled, and then the service runs
//! on a `FixtureRepository` instead of `MemoryStore`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::api::{Error, ErrorKind, MemoryStore, PetInput, PetRepository, PetService};
use crate::contract::{FixtureRepository, ProviderStates, StateSetup};
use crate::fixtures::pet_provider_states;

pub const PROVIDER_STATES_PATH: &str = "/_contract/provider-states";
pub const OPENAPI_PATH: &str = "/openapi.json";

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
    pub provider_states: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            allow_non_loopback: false,
            max_body_bytes: 1024 * 1024,
            provider_states: false,
        }
    }
}

pub struct AppState {
    service: PetService,
    states: Option<ProviderStates>,
}

impl AppState {
    pub fn new(repository: Arc<dyn PetRepository>) -> Self {
        Self {
            service: PetService::new(repository),
            states: None,
        }
    }

    /// Serves pets from `fixtures` and mounts the built-in provider states over it.
    pub fn with_fixtures(fixtures: Arc<FixtureRepository>) -> Self {
        Self {
            service: PetService::new(fixtures.clone()),
            states: Some(pet_provider_states(fixtures)),
        }
    }
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    let max_body_bytes: usize = config.max_body_bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large")
    })?;

    let state = if config.provider_states {
        tracing::warn!("provider-state route enabled; pets live in a fixture repository");
        AppState::with_fixtures(Arc::new(FixtureRepository::new()))
    } else {
        AppState::new(Arc::new(MemoryStore::new()))
    };
    let app = router(Arc::new(state), max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, "serving /api/pets");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

/// Explicit route table for the pet resource.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route(OPENAPI_PATH, get(openapi))
        .route("/api/pets", get(list_pets).post(create_pet))
        .route(
            "/api/pets/:id",
            get(get_pet).put(update_pet).delete(delete_pet),
        );
    if state.states.is_some() {
        app = app.route(PROVIDER_STATES_PATH, post(apply_provider_state));
    }
    app.layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    if config.provider_states && !is_loopback(config.bind.ip()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--provider-states is only allowed on loopback binds")
            .with_hint("Provider states wipe stored pets; keep them to local verification runs."));
    }

    Ok(())
}

pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

#[derive(Debug, Deserialize)]
struct StateRequest {
    state: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn openapi() -> Response {
    Json(openapi_document()).into_response()
}

/// OpenAPI 3 description of the `/api/pets` surface.
pub fn openapi_document() -> Value {
    let pet_ref = json!({ "$ref": "#/components/schemas/Pet" });
    let error_ref = json!({ "$ref": "#/components/schemas/Error" });
    let id_param = json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64" }
    });
    let json_body = |schema: Value| json!({ "content": { "application/json": { "schema": schema } } });
    let described = |description: &str, schema: &Value| {
        let mut response = json_body(schema.clone());
        response["description"] = json!(description);
        response
    };
    let not_found = described("Pet not found", &error_ref);
    let invalid = described("Malformed pet", &error_ref);

    json!({
        "openapi": "3.0.3",
        "info": { "title": "Pet API", "version": env!("CARGO_PKG_VERSION") },
        "paths": {
            "/api/pets": {
                "get": {
                    "operationId": "getAllPets",
                    "responses": {
                        "200": described("All pets", &json!({ "type": "array", "items": pet_ref.clone() }))
                    }
                },
                "post": {
                    "operationId": "createPet",
                    "requestBody": json_body(pet_ref.clone()),
                    "responses": {
                        "201": described("Created pet", &pet_ref),
                        "400": invalid.clone()
                    }
                }
            },
            "/api/pets/{id}": {
                "parameters": [id_param],
                "get": {
                    "operationId": "getPetById",
                    "responses": {
                        "200": described("The pet", &pet_ref),
                        "404": not_found.clone()
                    }
                },
                "put": {
                    "operationId": "updatePet",
                    "requestBody": json_body(pet_ref.clone()),
                    "responses": {
                        "200": described("Updated pet", &pet_ref),
                        "400": invalid,
                        "404": not_found.clone()
                    }
                },
                "delete": {
                    "operationId": "deletePet",
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": not_found
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Pet": {
                    "type": "object",
                    "required": ["name", "type", "age"],
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "name": { "type": "string" },
                        "type": { "type": "string" },
                        "age": { "type": "integer", "format": "int32" },
                        "breed": { "type": "string" },
                        "description": { "type": "string" }
                    }
                },
                "Error": {
                    "type": "object",
                    "required": ["error"],
                    "properties": {
                        "error": {
                            "type": "object",
                            "required": ["kind", "message"],
                            "properties": {
                                "kind": { "type": "string" },
                                "message": { "type": "string" },
                                "hint": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    })
}

async fn list_pets(State(state): State<Arc<AppState>>) -> Response {
    Json(state.service.get_all_pets()).into_response()
}

async fn get_pet(
    State(state): State<Arc<AppState>>,
    id: Result<AxumPath<i64>, PathRejection>,
) -> Response {
    let id = match pet_id(id) {
        Ok(id) => id,
        Err(err) => return error_response(err),
    };
    match state.service.get_pet_by_id(id) {
        Some(pet) => Json(pet).into_response(),
        None => error_response(pet_not_found(id)),
    }
}

async fn create_pet(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PetInput>, JsonRejection>,
) -> Response {
    let input = match pet_body(payload) {
        Ok(input) => input,
        Err(err) => return error_response(err),
    };
    let pet = state.service.create_pet(input.into_pet());
    (StatusCode::CREATED, Json(pet)).into_response()
}

async fn update_pet(
    State(state): State<Arc<AppState>>,
    id: Result<AxumPath<i64>, PathRejection>,
    payload: Result<Json<PetInput>, JsonRejection>,
) -> Response {
    let id = match pet_id(id) {
        Ok(id) => id,
        Err(err) => return error_response(err),
    };
    let input = match pet_body(payload) {
        Ok(input) => input,
        Err(err) => return error_response(err),
    };
    match state.service.update_pet(id, input.into_pet()) {
        Some(pet) => Json(pet).into_response(),
        None => error_response(pet_not_found(id)),
    }
}

async fn delete_pet(
    State(state): State<Arc<AppState>>,
    id: Result<AxumPath<i64>, PathRejection>,
) -> Response {
    let id = match pet_id(id) {
        Ok(id) => id,
        Err(err) => return error_response(err),
    };
    if state.service.delete_pet(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(pet_not_found(id))
    }
}

async fn apply_provider_state(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StateRequest>, JsonRejection>,
) -> Response {
    let Some(states) = state.states.as_ref() else {
        return error_response(
            Error::new(ErrorKind::NotFound).with_message("provider states are disabled"),
        );
    };
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(
                Error::new(ErrorKind::Validation).with_message(rejection.body_text()),
            );
        }
    };
    match states.apply(&request.state) {
        Ok(()) => {
            tracing::info!(state = %request.state, "applied provider state");
            Json(json!({ "ok": true })).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn pet_id(id: Result<AxumPath<i64>, PathRejection>) -> Result<i64, Error> {
    id.map(|AxumPath(id)| id).map_err(|rejection| {
        Error::new(ErrorKind::Validation)
            .with_message(format!("invalid pet id: {}", rejection.body_text()))
    })
}

fn pet_body(payload: Result<Json<PetInput>, JsonRejection>) -> Result<PetInput, Error> {
    payload.map(|Json(input)| input).map_err(|rejection| {
        Error::new(ErrorKind::Validation)
            .with_message(rejection.body_text())
            .with_hint("Send a JSON pet with name, type, and age.")
    })
}

fn pet_not_found(id: i64) -> Error {
    Error::new(ErrorKind::NotFound).with_message(format!("pet {id} not found"))
}

pub(crate) fn error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage | ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Mismatch => StatusCode::CONFLICT,
        ErrorKind::Unreachable => StatusCode::BAD_GATEWAY,
        ErrorKind::Corrupt | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn error_response(err: Error) -> Response {
    error_response_with_status(error_status(err.kind()), err)
}

pub(crate) fn error_response_with_status(status: StatusCode, err: Error) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: err.kind().as_str(),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
        },
    };
    (status, Json(body)).into_response()
}

/// Runs a router on its own thread and runtime until dropped.
pub struct BackgroundServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundServer {
    pub fn start(app: Router, bind: SocketAddr) -> Result<Self, Error> {
        let listener = std::net::TcpListener::bind(bind).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
        listener.set_nonblocking(true).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to configure listener")
                .with_source(err)
        })?;
        let addr = listener.local_addr().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read listener address")
                .with_source(err)
        })?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to start runtime")
                    .with_source(err)
            })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = std::thread::Builder::new()
            .name(format!("petpact-http-{}", addr.port()))
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to register listener");
                            return;
                        }
                    };
                    tokio::select! {
                        result = axum::serve(listener, app).into_future() => {
                            if let Err(err) = result {
                                tracing::error!(error = %err, "background server failed");
                            }
                        }
                        _ = shutdown_rx => {}
                    }
                });
            })
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to spawn server thread")
                    .with_source(err)
            })?;

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for BackgroundServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
