#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;

use loomtrack_api::{
    app_router,
    commands::production::{AdvancePayload, CreateOrderCommand},
    config::AppConfig,
    db,
    entities::{
        machine, partner, product,
        production_order::{self, ProductionStage},
    },
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

pub struct TestApp {
    pub db: Arc<db::DbPool>,
    pub services: AppServices,
    pub router: axum::Router,
}

/// Fresh in-memory database with migrations applied and master data seeded.
/// One connection so the whole test shares a single SQLite instance.
pub async fn spawn_app() -> TestApp {
    let cfg = db::DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&cfg)
        .await
        .expect("in-memory database");
    db::run_migrations(&pool).await.expect("migrations");
    seed_master_data(&pool).await;

    let db = Arc::new(pool);
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(events::process_events(rx));
    let event_sender = EventSender::new(tx);
    let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()));

    let config = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        8080,
        "test".to_string(),
    );
    let state = AppState {
        db: db.clone(),
        config,
        event_sender,
        services: services.clone(),
    };

    TestApp {
        db,
        services,
        router: app_router(state),
    }
}

async fn seed_master_data(db: &db::DbPool) {
    let now = Utc::now();

    for (machine_no, active) in [("W-01", true), ("W-02", true), ("W-09", false)] {
        machine::ActiveModel {
            machine_no: Set(machine_no.to_string()),
            name: Set(Some(format!("Loom {machine_no}"))),
            active: Set(active),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed machine");
    }

    product::ActiveModel {
        product_code: Set("TOWEL-30".to_string()),
        name: Set("Hand towel 30cm".to_string()),
        color: Set(Some("ivory".to_string())),
        size: Set(Some("30x30".to_string())),
        weight: Set(Some(dec!(0.12))),
        unit_price: Set(Some(dec!(1000))),
        vat_included: Set(false),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed product");

    for (name, kind) in [("SunDye", "dyeing"), ("StitchWorks", "sewing")] {
        partner::ActiveModel {
            name: Set(name.to_string()),
            kind: Set(kind.to_string()),
            phone: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed partner");
    }
}

pub async fn create_order(
    app: &TestApp,
    order_no: &str,
    quantity: i32,
    total_rolls: Option<i32>,
) -> production_order::Model {
    app.services
        .production_orders
        .create(CreateOrderCommand {
            order_no: order_no.to_string(),
            product_code: "TOWEL-30".to_string(),
            customer: "Hanil Trading".to_string(),
            quantity,
            color: None,
            size: None,
            weight: None,
            unit_price: None,
            vat_included: None,
            total_rolls,
            stage_date: None,
            note: None,
        })
        .await
        .expect("create order")
}

pub fn weaving_payload(machine_no: &str) -> AdvancePayload {
    AdvancePayload {
        machine_no: Some(machine_no.to_string()),
        ..Default::default()
    }
}

pub fn quantity_payload(quantity: i32) -> AdvancePayload {
    AdvancePayload {
        quantity: Some(quantity),
        ..Default::default()
    }
}

/// Advance a record through the given stages with empty payloads except at
/// weaving entry, which takes a machine.
pub async fn advance_through(
    app: &TestApp,
    id: uuid::Uuid,
    stages: &[ProductionStage],
    machine_no: &str,
) -> production_order::Model {
    let mut last = None;
    for &stage in stages {
        let payload = if stage == ProductionStage::WeavingInProgress {
            weaving_payload(machine_no)
        } else {
            AdvancePayload::default()
        };
        let records = app
            .services
            .production_orders
            .advance(id, stage, payload)
            .await
            .unwrap_or_else(|e| panic!("advance to {stage} failed: {e}"));
        last = records.into_iter().next();
    }
    last.expect("at least one stage advanced")
}
