//! Read-only JSON API over the reading store.
//!
//! `/api/dashboard` reports `uptimePercentage` as a JSON number rounded to one
//! decimal (`33.3`, or `0.0` for an empty fleet). Older dashboard servers sent
//! a `toFixed(1)` string such as `"33.3"`, and a bare `0` for an empty fleet.
//! Front ends that compared against the string form must read a number now.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::aggregate::{snapshot, BoardStatus};
use crate::db::ReadingStore;
use crate::errors::Error;
use crate::model::StoredReading;
use crate::view::{board_row, sort_boards, BoardRow, Order};

const UPTIME_HISTORY_HOURS: usize = 24;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn ReadingStore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outage {
    pub date: String,
    pub duration: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub devices: Vec<StoredReading>,
    /// A number, not a string; see the module docs.
    pub uptime_percentage: f64,
    pub board_status: BoardStatus,
    pub uptime_history: Vec<u32>,
    pub outages: Vec<Outage>,
}

#[derive(Debug, Deserialize)]
pub struct BoardsQuery {
    order: Option<Order>,
}

pub fn create_router(store: Arc<dyn ReadingStore>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/devices", get(list_devices))
        .route("/api/devices/:id", get(get_device))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/boards", get(list_boards))
        .with_state(state)
}

async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredReading>>, ApiError> {
    let latest = state
        .store
        .find_latest_per_device()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch devices", e))?;

    Ok(Json(latest))
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredReading>, ApiError> {
    state
        .store
        .find_latest(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch device", e))?
        .map(Json)
        .ok_or(ApiError::NotFound("Device not found"))
}

async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let readings = state
        .store
        .find_latest_per_device()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch dashboard data", e))?;
    let fleet = snapshot(readings);

    Ok(Json(DashboardResponse {
        devices: fleet.latest,
        uptime_percentage: fleet.uptime_percentage,
        board_status: fleet.board_status,
        uptime_history: uptime_history(),
        outages: recent_outages(),
    }))
}

async fn list_boards(
    State(state): State<AppState>,
    Query(params): Query<BoardsQuery>,
) -> Result<Json<Vec<BoardRow>>, ApiError> {
    let readings = state
        .store
        .find_latest_per_device()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch boards", e))?;

    let mut rows: Vec<BoardRow> = readings.iter().map(board_row).collect();
    if let Some(order) = params.order {
        sort_boards(&mut rows, order.is_ascending());
    }

    Ok(Json(rows))
}

// Placeholder series for the uptime chart; there is no history table yet.
fn uptime_history() -> Vec<u32> {
    let mut rng = rand::thread_rng();
    (0..UPTIME_HISTORY_HOURS)
        .map(|_| rng.gen_range(80..100))
        .collect()
}

fn recent_outages() -> Vec<Outage> {
    [
        ("2025-07-24", "45 minutes", "Network issue"),
        ("2025-07-22", "2 hours", "Scheduled maintenance"),
        ("2025-07-20", "15 minutes", "Power outage"),
        ("2025-07-19", "30 minutes", "Server restart"),
        ("2025-07-18", "1 hour", "Database maintenance"),
    ]
    .into_iter()
    .map(|(date, duration, reason)| Outage {
        date: date.to_string(),
        duration: duration.to_string(),
        reason: reason.to_string(),
    })
    .collect()
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Internal { message: &'static str, source: Error },
}

impl ApiError {
    fn internal(message: &'static str, source: Error) -> Self {
        ApiError::Internal { message, source }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody { error: message })).into_response()
            }
            ApiError::Internal { message, source } => {
                error!("{}: {}", message, source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody { error: message }),
                )
                    .into_response()
            }
        }
    }
}
