use crate::{
    commands::{production::apply_stage_effects, Command},
    db::DbPool,
    entities::production_order::{self, ProductionStage},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{machines, reconciler},
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Stage-specific side data accompanying a forward transition.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvancePayload {
    /// Quantity to advance; omitted means the record's full quantity.
    pub quantity: Option<i32>,
    /// Required when entering weaving.
    pub machine_no: Option<String>,
    /// Number of rolls planned for the weaving run.
    pub total_rolls: Option<i32>,
    /// Dyeing/sewing partner taking the work.
    pub partner: Option<String>,
    pub unit_price: Option<Decimal>,
    pub vat_included: Option<bool>,
    pub defect_qty: Option<i32>,
    pub weight: Option<Decimal>,
    pub stage_date: Option<NaiveDate>,
    pub note: Option<String>,
}

/// Moves a record to the next pipeline stage, splitting when only part of the
/// quantity advances. A multi-roll weaving parent routes through the roll
/// sub-machine instead of moving itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdvanceOrderCommand {
    pub order_id: Uuid,
    pub target_stage: ProductionStage,
    pub payload: AdvancePayload,
}

#[async_trait]
impl Command for AdvanceOrderCommand {
    /// The affected record set: `[updated]` for an in-place advance,
    /// `[source, child]` for a partial advance or roll completion.
    type Result = Vec<production_order::Model>;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id, target = %self.target_stage))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let txn = db_pool.begin().await.map_err(ServiceError::DatabaseError)?;
        let (records, events) = match self.apply(&txn).await {
            Ok(value) => {
                txn.commit().await.map_err(ServiceError::DatabaseError)?;
                value
            }
            Err(err) => {
                txn.rollback().await.map_err(ServiceError::DatabaseError)?;
                return Err(err);
            }
        };

        for event in events {
            event_sender
                .send(event)
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(records)
    }
}

impl AdvanceOrderCommand {
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(Vec<production_order::Model>, Vec<Event>), ServiceError> {
        let record = production_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("production order {}", self.order_id)))?;

        if record.stage == ProductionStage::WeavingInProgress
            && record.is_roll_parent()
            && self.target_stage == ProductionStage::WeavingDone
        {
            return self.complete_roll(txn, record).await;
        }

        let expected = record.stage.successor().ok_or_else(|| {
            ServiceError::InvalidTransition(format!("{} is a terminal stage", record.stage))
        })?;
        if self.target_stage != expected {
            return Err(ServiceError::InvalidTransition(format!(
                "{} cannot advance to {}; the next stage is {}",
                record.stage, self.target_stage, expected
            )));
        }

        let qty = self.payload.quantity.unwrap_or(record.quantity);
        if qty <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        if qty > record.quantity {
            return Err(ServiceError::QuantityExceeded {
                requested: qty,
                available: record.quantity,
            });
        }

        // Check-then-set on the machine happens inside this transaction; if a
        // concurrent start slips past the check anyway, the partial unique
        // index on (machine_no, weaving stage) rejects the loser's write.
        let acquiring = if self.target_stage == ProductionStage::WeavingInProgress {
            let machine_no = self.payload.machine_no.clone().ok_or_else(|| {
                ServiceError::ValidationError("machine_no is required to start weaving".to_string())
            })?;
            machines::ensure_available(txn, &machine_no).await?;
            Some(machine_no)
        } else {
            None
        };

        let from = record.stage;
        let now = Utc::now();

        if qty == record.quantity {
            let mut active: production_order::ActiveModel = record.into();
            apply_stage_effects(&mut active, self.target_stage, &self.payload, now);
            let updated = match &acquiring {
                Some(machine_no) => active
                    .update(txn)
                    .await
                    .map_err(|e| machines::occupancy_conflict(e, machine_no))?,
                None => active.update(txn).await?,
            };

            let mut events = vec![Event::StageAdvanced {
                order_id: updated.id,
                from: from.to_string(),
                to: self.target_stage.to_string(),
            }];
            if self.target_stage == ProductionStage::WeavingInProgress {
                if let Some(machine_no) = &updated.machine_no {
                    events.push(Event::MachineAcquired {
                        order_id: updated.id,
                        machine_no: machine_no.clone(),
                    });
                }
            }
            Ok((vec![updated], events))
        } else {
            let payload = &self.payload;
            let target = self.target_stage;
            let result = reconciler::split_within(txn, record, qty, target, |active| {
                apply_stage_effects(active, target, payload, now);
            })
            .await;
            let (source, child) = match (result, &acquiring) {
                (Err(ServiceError::DatabaseError(e)), Some(machine_no)) => {
                    return Err(machines::occupancy_conflict(e, machine_no))
                }
                (other, _) => other?,
            };

            let mut events = vec![
                Event::OrderSplit {
                    source_id: source.id,
                    child_id: child.id,
                    quantity: qty,
                },
                Event::StageAdvanced {
                    order_id: child.id,
                    from: from.to_string(),
                    to: target.to_string(),
                },
            ];
            if target == ProductionStage::WeavingInProgress {
                if let Some(machine_no) = &child.machine_no {
                    events.push(Event::MachineAcquired {
                        order_id: child.id,
                        machine_no: machine_no.clone(),
                    });
                }
            }
            Ok((vec![source, child], events))
        }
    }

    /// One roll comes off the machine: fork a `weaving_done` child carrying
    /// the roll quantity and advance the parent's roll counters. The parent
    /// keeps the machine until its last roll, then retires to the hidden
    /// lineage-only stage.
    async fn complete_roll(
        &self,
        txn: &DatabaseTransaction,
        parent: production_order::Model,
    ) -> Result<(Vec<production_order::Model>, Vec<Event>), ServiceError> {
        let total = parent.total_rolls.unwrap_or(1);
        if parent.completed_rolls >= total {
            return Err(ServiceError::InvalidOperation(format!(
                "all {} rolls of {} are already complete",
                total, parent.order_no
            )));
        }

        let qty = self.payload.quantity.ok_or_else(|| {
            ServiceError::ValidationError("quantity is required to complete a roll".to_string())
        })?;
        if qty <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }
        if qty > parent.quantity {
            return Err(ServiceError::QuantityExceeded {
                requested: qty,
                available: parent.quantity,
            });
        }

        let roll_no = parent.completed_rolls + 1;
        let closing = roll_no == total;

        // A non-final roll must leave quantity behind, or the remaining rolls
        // would have nothing to draw from while the parent still holds the
        // machine.
        if !closing && qty >= parent.quantity {
            return Err(ServiceError::ValidationError(format!(
                "roll {roll_no} of {total} must leave quantity for the remaining rolls"
            )));
        }

        let now = Utc::now();
        let child_no = parent.split_count + 1;

        let mut child = reconciler::new_child_from(
            &parent,
            child_no,
            ProductionStage::WeavingDone,
            qty,
            now,
        );
        child.roll_no = Set(Some(roll_no));
        child.machine_no = Set(parent.machine_no.clone());
        child.stage_date = Set(Some(self.payload.stage_date.unwrap_or_else(|| now.date_naive())));
        if let Some(weight) = self.payload.weight {
            child.weight = Set(Some(weight));
        }
        if let Some(defect_qty) = self.payload.defect_qty {
            child.defect_qty = Set(Some(defect_qty));
        }
        if let Some(note) = &self.payload.note {
            child.note = Set(Some(note.clone()));
        }
        let child = child.insert(txn).await?;

        if closing && qty < parent.quantity {
            warn!(
                order_no = %parent.order_no,
                leftover = parent.quantity - qty,
                "final roll leaves undrawn quantity on the retiring weaving parent"
            );
        }

        // Counter updates are guarded on the values read above so a racing
        // roll completion or child cancel cannot be silently overwritten.
        let mut patch = production_order::ActiveModel {
            quantity: Set(parent.quantity - qty),
            completed_rolls: Set(roll_no),
            split_count: Set(child_no),
            updated_at: Set(now),
            ..Default::default()
        };
        if closing {
            patch.stage = Set(ProductionStage::WeavingClosed);
        }
        let guarded = production_order::Entity::update_many()
            .set(patch)
            .filter(production_order::Column::Id.eq(parent.id))
            .filter(production_order::Column::Quantity.eq(parent.quantity))
            .filter(production_order::Column::CompletedRolls.eq(parent.completed_rolls))
            .exec(txn)
            .await?;
        if guarded.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "production order {} was modified concurrently",
                parent.order_no
            )));
        }
        let parent = production_order::Entity::find_by_id(parent.id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("production order {}", parent.id)))?;

        let mut events = vec![Event::RollCompleted {
            parent_id: parent.id,
            child_id: child.id,
            roll_no,
        }];
        if closing {
            events.push(Event::WeavingOrderClosed(parent.id));
            if let Some(machine_no) = &parent.machine_no {
                events.push(Event::MachineReleased {
                    order_id: parent.id,
                    machine_no: machine_no.clone(),
                });
            }
        }

        Ok((vec![parent, child], events))
    }
}
