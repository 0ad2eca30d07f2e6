//! Loomtrack API Library
//!
//! Backend for a textile mill's production order pipeline: stage
//! transitions, quantity splits and merges, exclusive weaving-machine
//! allocation, and inventory aggregation over a flat record store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod services;

use axum::{routing::get, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Assembles the full application router with middleware layers.
pub fn app_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    let mut router = Router::new()
        .nest(
            "/api/v1/production-orders",
            handlers::production_orders::production_orders_router(),
        )
        .nest("/api/v1/machines", handlers::machines::machines_router())
        .nest("/api/v1/products", handlers::master_data::products_router())
        .nest("/api/v1/partners", handlers::master_data::partners_router())
        .nest("/api/v1/inventory", handlers::inventory::inventory_router())
        .route(
            "/api/v1/openapi.json",
            get(|| async { Json(openapi::ApiDoc::openapi()) }),
        )
        .merge(handlers::health::health_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    if state.config.cors_allow_any_origin && !state.config.is_production() {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}
