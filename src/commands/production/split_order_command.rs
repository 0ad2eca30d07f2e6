use crate::{
    commands::Command,
    db::DbPool,
    entities::production_order::{self, ProductionStage},
    errors::ServiceError,
    events::{Event, EventSender},
    services::reconciler,
};
use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Forks `quantity` off a record into a sibling at the same stage, e.g. to
/// route part of an order to a different partner. Decrement and insert commit
/// together or not at all.
#[derive(Debug, Serialize, Deserialize)]
pub struct SplitOrderCommand {
    pub order_id: Uuid,
    pub quantity: i32,
}

#[async_trait]
impl Command for SplitOrderCommand {
    /// `(source, child)` after the split.
    type Result = (production_order::Model, production_order::Model);

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id, quantity = self.quantity))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let txn = db_pool.begin().await.map_err(ServiceError::DatabaseError)?;
        let (source, child) = match self.apply(&txn).await {
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
            .send(Event::OrderSplit {
                source_id: source.id,
                child_id: child.id,
                quantity: child.quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok((source, child))
    }
}

impl SplitOrderCommand {
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(production_order::Model, production_order::Model), ServiceError> {
        let record = production_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("production order {}", self.order_id)))?;

        // A same-stage sibling at weaving would put two records on one
        // machine; rolls are the split mechanism there.
        if record.stage == ProductionStage::WeavingInProgress {
            return Err(ServiceError::InvalidOperation(
                "weaving orders split through roll completion".to_string(),
            ));
        }
        if record.stage == ProductionStage::WeavingClosed {
            return Err(ServiceError::InvalidOperation(
                "a closed weaving order cannot be split".to_string(),
            ));
        }

        let stage = record.stage;
        reconciler::split_within(txn, record, self.quantity, stage, |_| {}).await
    }
}
