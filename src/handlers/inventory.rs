use crate::{
    errors::ServiceError,
    handlers::production_orders::ProductionOrderResponse,
    services::ledger::{LedgerFilter, StageTotal},
    ApiResponse, AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

/// Create the inventory router
pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(get_stage_summary))
        .route("/shippable", get(list_shippable))
}

/// Quantity per stage, recomputed from current records
#[utoipa::path(
    get,
    path = "/api/v1/inventory/summary",
    params(LedgerFilter),
    responses(
        (status = 200, description = "Quantity and record count per stage", body = [StageTotal])
    ),
    tag = "inventory"
)]
pub async fn get_stage_summary(
    State(state): State<AppState>,
    Query(filter): Query<LedgerFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let totals = state.services.ledger.stage_totals(&filter).await?;
    Ok(Json(ApiResponse::success(totals)))
}

/// Records eligible for shipping
#[utoipa::path(
    get,
    path = "/api/v1/inventory/shippable",
    params(LedgerFilter),
    responses(
        (status = 200, description = "Sewing-complete records with quantity on hand", body = [ProductionOrderResponse])
    ),
    tag = "inventory"
)]
pub async fn list_shippable(
    State(state): State<AppState>,
    Query(filter): Query<LedgerFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state.services.ledger.shippable(&filter).await?;
    let items: Vec<ProductionOrderResponse> =
        records.into_iter().map(ProductionOrderResponse::from).collect();
    Ok(Json(ApiResponse::success(items)))
}
