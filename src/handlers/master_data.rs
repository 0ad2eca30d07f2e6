use crate::{
    entities::{partner, product},
    errors::ServiceError,
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

/// Create the products router
pub fn products_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:code", get(get_product))
}

/// Create the partners router
pub fn partners_router() -> Router<AppState> {
    Router::new().route("/", get(list_partners))
}

/// Product master in product-code order
#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses((status = 200, description = "All products", body = [product::Model])),
    tag = "master-data"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.master_data.list_products().await?;
    Ok(Json(ApiResponse::success(products)))
}

/// One product by code
#[utoipa::path(
    get,
    path = "/api/v1/products/{code}",
    params(("code" = String, Path, description = "Product code")),
    responses(
        (status = 200, description = "The product", body = product::Model),
        (status = 404, description = "No such product")
    ),
    tag = "master-data"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state
        .services
        .master_data
        .find_product(&code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("product {code}")))?;
    Ok(Json(ApiResponse::success(record)))
}

/// Dyeing and sewing partners
#[utoipa::path(
    get,
    path = "/api/v1/partners",
    responses((status = 200, description = "All partners", body = [partner::Model])),
    tag = "master-data"
)]
pub async fn list_partners(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let partners = state.services.master_data.list_partners().await?;
    Ok(Json(ApiResponse::success(partners)))
}
