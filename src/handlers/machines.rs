use crate::{errors::ServiceError, services::machines::MachineStatus, ApiResponse, AppState};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

/// Create the machines router
pub fn machines_router() -> Router<AppState> {
    Router::new().route("/", get(list_machines))
}

/// Machine roster with current weaving occupancy
#[utoipa::path(
    get,
    path = "/api/v1/machines",
    responses(
        (status = 200, description = "Roster with busy flags", body = [MachineStatus])
    ),
    tag = "machines"
)]
pub async fn list_machines(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let roster = state.services.machines.roster_with_status().await?;
    Ok(Json(ApiResponse::success(roster)))
}
