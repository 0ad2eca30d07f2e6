use utoipa::OpenApi;

/// Aggregated OpenAPI document for the service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loomtrack API",
        description = "Production order pipeline for a textile mill"
    ),
    paths(
        crate::handlers::production_orders::list_production_orders,
        crate::handlers::production_orders::create_production_order,
        crate::handlers::production_orders::get_production_order,
        crate::handlers::production_orders::get_lineage,
        crate::handlers::production_orders::advance_production_order,
        crate::handlers::production_orders::cancel_production_order,
        crate::handlers::production_orders::split_production_order,
        crate::handlers::machines::list_machines,
        crate::handlers::master_data::list_products,
        crate::handlers::master_data::get_product,
        crate::handlers::master_data::list_partners,
        crate::handlers::inventory::get_stage_summary,
        crate::handlers::inventory::list_shippable,
        crate::handlers::health::health_check,
    ),
    components(schemas(
        crate::handlers::production_orders::ProductionOrderResponse,
        crate::handlers::production_orders::CreateProductionOrderRequest,
        crate::handlers::production_orders::AdvanceRequest,
        crate::handlers::production_orders::SplitRequest,
        crate::commands::production::AdvancePayload,
        crate::entities::production_order::ProductionStage,
        crate::money::AmountBreakdown,
        crate::services::machines::MachineStatus,
        crate::entities::product::Model,
        crate::entities::partner::Model,
        crate::services::ledger::StageTotal,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "production-orders", description = "Pipeline transitions, splits, and cancels"),
        (name = "machines", description = "Weaving machine roster and occupancy"),
        (name = "master-data", description = "Products and outside-work partners"),
        (name = "inventory", description = "Quantity ledger views"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
