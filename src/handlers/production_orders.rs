use crate::{
    commands::production::{AdvancePayload, CreateOrderCommand},
    entities::production_order::{self, ProductionStage},
    errors::ServiceError,
    money::{self, AmountBreakdown},
    services::production_orders::OrderListFilter,
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// API projection of a production order record, with the monetary breakdown
/// computed from its pricing terms when present.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductionOrderResponse {
    pub id: Uuid,
    pub order_no: String,
    pub parent_id: Option<Uuid>,
    pub product_code: String,
    pub customer: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub weight: Option<Decimal>,
    pub stage: ProductionStage,
    pub quantity: i32,
    pub machine_no: Option<String>,
    pub roll_no: Option<i32>,
    pub total_rolls: Option<i32>,
    pub completed_rolls: i32,
    pub partner: Option<String>,
    pub unit_price: Option<Decimal>,
    pub vat_included: bool,
    pub defect_qty: Option<i32>,
    pub stage_date: Option<NaiveDate>,
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amounts: Option<AmountBreakdown>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<production_order::Model> for ProductionOrderResponse {
    fn from(model: production_order::Model) -> Self {
        let amounts = model
            .unit_price
            .map(|price| money::breakdown(model.quantity, price, model.vat_included));
        Self {
            id: model.id,
            order_no: model.order_no,
            parent_id: model.parent_id,
            product_code: model.product_code,
            customer: model.customer,
            color: model.color,
            size: model.size,
            weight: model.weight,
            stage: model.stage,
            quantity: model.quantity,
            machine_no: model.machine_no,
            roll_no: model.roll_no,
            total_rolls: model.total_rolls,
            completed_rolls: model.completed_rolls,
            partner: model.partner,
            unit_price: model.unit_price,
            vat_included: model.vat_included,
            defect_qty: model.defect_qty,
            stage_date: model.stage_date,
            note: model.note,
            amounts,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductionOrderRequest {
    #[validate(length(min = 1, message = "Order number is required"))]
    pub order_no: String,
    #[validate(length(min = 1, message = "Product code is required"))]
    pub product_code: String,
    #[validate(length(min = 1, message = "Customer is required"))]
    pub customer: String,
    pub quantity: i32,
    pub color: Option<String>,
    pub size: Option<String>,
    pub weight: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub vat_included: Option<bool>,
    pub total_rolls: Option<i32>,
    pub stage_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    pub target_stage: ProductionStage,
    #[serde(flatten)]
    pub payload: AdvancePayload,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SplitRequest {
    pub quantity: i32,
}

/// Create the production orders router
pub fn production_orders_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_production_orders).post(create_production_order),
        )
        .route("/:id", get(get_production_order))
        .route("/:id/lineage", get(get_lineage))
        .route("/:id/advance", post(advance_production_order))
        .route("/:id/cancel", post(cancel_production_order))
        .route("/:id/split", post(split_production_order))
}

/// List production orders with optional filtering
#[utoipa::path(
    get,
    path = "/api/v1/production-orders",
    params(OrderListFilter),
    responses(
        (status = 200, description = "Matching production orders", body = [ProductionOrderResponse])
    ),
    tag = "production-orders"
)]
pub async fn list_production_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderListFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let (records, total) = state.services.production_orders.list(&filter).await?;

    let items: Vec<ProductionOrderResponse> =
        records.into_iter().map(ProductionOrderResponse::from).collect();
    let page = filter.page.max(1);
    let limit = filter.per_page.max(1);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total.div_ceil(limit),
        total,
        page,
        limit,
        items,
    })))
}

/// Intake a new order at the received stage
#[utoipa::path(
    post,
    path = "/api/v1/production-orders",
    request_body = CreateProductionOrderRequest,
    responses(
        (status = 201, description = "Production order created", body = ProductionOrderResponse),
        (status = 409, description = "Order number already exists")
    ),
    tag = "production-orders"
)]
pub async fn create_production_order(
    State(state): State<AppState>,
    Json(request): Json<CreateProductionOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let record = state
        .services
        .production_orders
        .create(CreateOrderCommand {
            order_no: request.order_no,
            product_code: request.product_code,
            customer: request.customer,
            quantity: request.quantity,
            color: request.color,
            size: request.size,
            weight: request.weight,
            unit_price: request.unit_price,
            vat_included: request.vat_included,
            total_rolls: request.total_rolls,
            stage_date: request.stage_date,
            note: request.note,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ProductionOrderResponse::from(record))),
    ))
}

/// Fetch one production order
#[utoipa::path(
    get,
    path = "/api/v1/production-orders/{id}",
    params(("id" = Uuid, Path, description = "Production order id")),
    responses(
        (status = 200, description = "The production order", body = ProductionOrderResponse),
        (status = 404, description = "No such record")
    ),
    tag = "production-orders"
)]
pub async fn get_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.services.production_orders.get(id).await?;
    Ok(Json(ApiResponse::success(ProductionOrderResponse::from(
        record,
    ))))
}

/// All records in the lineage of one order
#[utoipa::path(
    get,
    path = "/api/v1/production-orders/{id}/lineage",
    params(("id" = Uuid, Path, description = "Production order id")),
    responses(
        (status = 200, description = "Root and descendants sharing the root order number", body = [ProductionOrderResponse])
    ),
    tag = "production-orders"
)]
pub async fn get_lineage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state.services.production_orders.lineage(id).await?;
    let items: Vec<ProductionOrderResponse> =
        records.into_iter().map(ProductionOrderResponse::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Advance a record to its next stage (partial quantities split)
#[utoipa::path(
    post,
    path = "/api/v1/production-orders/{id}/advance",
    params(("id" = Uuid, Path, description = "Production order id")),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Affected records", body = [ProductionOrderResponse]),
        (status = 400, description = "Illegal target stage"),
        (status = 409, description = "Machine busy"),
        (status = 422, description = "Quantity exceeds the record")
    ),
    tag = "production-orders"
)]
pub async fn advance_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AdvanceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state
        .services
        .production_orders
        .advance(id, request.target_stage, request.payload)
        .await?;
    let items: Vec<ProductionOrderResponse> =
        records.into_iter().map(ProductionOrderResponse::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Cancel a record back to its predecessor stage
#[utoipa::path(
    post,
    path = "/api/v1/production-orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Production order id")),
    responses(
        (status = 200, description = "Surviving records", body = [ProductionOrderResponse]),
        (status = 400, description = "The record cannot be cancelled")
    ),
    tag = "production-orders"
)]
pub async fn cancel_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let records = state.services.production_orders.cancel(id).await?;
    let items: Vec<ProductionOrderResponse> =
        records.into_iter().map(ProductionOrderResponse::from).collect();
    Ok(Json(ApiResponse::success(items)))
}

/// Split part of a record's quantity into a same-stage sibling
#[utoipa::path(
    post,
    path = "/api/v1/production-orders/{id}/split",
    params(("id" = Uuid, Path, description = "Production order id")),
    request_body = SplitRequest,
    responses(
        (status = 200, description = "Source and child after the split", body = [ProductionOrderResponse]),
        (status = 422, description = "Quantity exceeds the record")
    ),
    tag = "production-orders"
)]
pub async fn split_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SplitRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let (source, child) = state
        .services
        .production_orders
        .split(id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(vec![
        ProductionOrderResponse::from(source),
        ProductionOrderResponse::from(child),
    ])))
}
