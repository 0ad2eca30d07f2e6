use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        product,
        production_order::{self, ProductionStage},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Intake: creates a record at `received`. Unset product attributes are
/// defaulted from the product master.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderCommand {
    pub order_no: String,
    pub product_code: String,
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

#[async_trait]
impl Command for CreateOrderCommand {
    type Result = production_order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(order_no = %self.order_no))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let txn = db_pool.begin().await.map_err(ServiceError::DatabaseError)?;
        let record = match self.apply(&txn).await {
            Ok(value) => {
                txn.commit().await.map_err(ServiceError::DatabaseError)?;
                value
            }
            Err(err) => {
                txn.rollback().await.map_err(ServiceError::DatabaseError)?;
                return Err(err);
            }
        };

        event_sender
            .send(Event::OrderCreated(record.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(record)
    }
}

impl CreateOrderCommand {
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<production_order::Model, ServiceError> {
        // Zero-quantity records must never be created.
        if self.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        if self.order_no.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "order_no must not be empty".to_string(),
            ));
        }
        if let Some(total_rolls) = self.total_rolls {
            if total_rolls < 1 {
                return Err(ServiceError::ValidationError(
                    "total_rolls must be at least 1".to_string(),
                ));
            }
        }

        let duplicates = production_order::Entity::find()
            .filter(production_order::Column::OrderNo.eq(self.order_no.clone()))
            .count(txn)
            .await?;
        if duplicates > 0 {
            return Err(ServiceError::Conflict(format!(
                "order number {} already exists",
                self.order_no
            )));
        }

        let defaults = product::Entity::find_by_id(&self.product_code)
            .one(txn)
            .await?;

        let now = Utc::now();
        let record = production_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_no: Set(self.order_no.clone()),
            parent_id: Set(None),
            product_code: Set(self.product_code.clone()),
            customer: Set(self.customer.clone()),
            color: Set(self
                .color
                .clone()
                .or_else(|| defaults.as_ref().and_then(|p| p.color.clone()))),
            size: Set(self
                .size
                .clone()
                .or_else(|| defaults.as_ref().and_then(|p| p.size.clone()))),
            weight: Set(self.weight.or_else(|| defaults.as_ref().and_then(|p| p.weight))),
            stage: Set(ProductionStage::Received),
            quantity: Set(self.quantity),
            machine_no: Set(None),
            roll_no: Set(None),
            total_rolls: Set(self.total_rolls),
            completed_rolls: Set(0),
            split_count: Set(0),
            partner: Set(None),
            unit_price: Set(self
                .unit_price
                .or_else(|| defaults.as_ref().and_then(|p| p.unit_price))),
            vat_included: Set(self
                .vat_included
                .unwrap_or_else(|| defaults.as_ref().map_or(false, |p| p.vat_included))),
            defect_qty: Set(None),
            stage_date: Set(Some(self.stage_date.unwrap_or_else(|| now.date_naive()))),
            note: Set(self.note.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(record.insert(txn).await?)
    }
}
