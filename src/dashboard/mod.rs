use std::net::SocketAddr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::DispatchError;
use crate::scheduler::Priority;
use crate::simulation::SimulationHandle;
use crate::worker::WorkerId;

#[derive(Clone)]
pub struct DashboardState {
    pub simulation: SimulationHandle,
}

#[derive(Deserialize)]
struct CreateOrderRequest {
    priority: Priority,
}

#[derive(Serialize)]
struct CreateOrderResponse {
    job_id: String,
}

#[derive(Serialize)]
struct AddWorkerResponse {
    worker_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Maps dispatcher errors onto HTTP status codes.
struct ApiError(DispatchError);

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DispatchError::WorkerNotFound(_) | DispatchError::JobNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DispatchError::NotLastWorker { .. }
            | DispatchError::WorkerBusy(_)
            | DispatchError::WorkerIdle(_)
            | DispatchError::JobNotAssigned { .. } => StatusCode::CONFLICT,
            DispatchError::InvalidId(_)
            | DispatchError::InvalidPriority(_)
            | DispatchError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/state", get(state_handler))
        .route(
            "/api/workers",
            get(list_workers_handler)
                .post(add_worker_handler)
                .delete(remove_last_worker_handler),
        )
        .route("/api/workers/{id}", delete(remove_worker_handler))
        .route("/api/orders", post(create_order_handler))
        .route("/api/orders/pending", get(pending_handler))
        .route("/api/orders/in-progress", get(in_progress_handler))
        .route("/api/orders/completed", get(completed_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn run_dashboard(addr: SocketAddr, state: DashboardState, shutdown: CancellationToken) {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind dashboard server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        tracing::error!(error = %e, "Dashboard server failed");
    }
}

async fn state_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.simulation.snapshot().await)
}

async fn list_workers_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.simulation.list_workers().await)
}

async fn add_worker_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let id = state.simulation.add_worker().await;
    (
        StatusCode::CREATED,
        Json(AddWorkerResponse {
            worker_id: id.to_string(),
        }),
    )
}

async fn remove_last_worker_handler(
    State(state): State<DashboardState>,
) -> Result<Response, ApiError> {
    match state.simulation.remove_last_worker().await? {
        Some(removed) => Ok(Json(removed).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn remove_worker_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: WorkerId = id.parse()?;
    let removed = state.simulation.remove_worker(id).await?;
    Ok(Json(removed).into_response())
}

async fn create_order_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    let id = state.simulation.create_job(payload.priority).await;
    (
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            job_id: id.to_string(),
        }),
    )
}

async fn pending_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.simulation.list_pending().await)
}

async fn in_progress_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.simulation.list_in_progress().await)
}

async fn completed_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.simulation.list_completed().await)
}
