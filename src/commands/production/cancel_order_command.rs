use crate::{
    commands::Command,
    db::DbPool,
    entities::production_order::{self, ProductionStage},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{machines, reconciler},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Reverts a record to its predecessor stage. A compatible same-lineage
/// record already waiting there absorbs it (quantities summed, this record
/// deleted) so repeated retry cycles do not fragment the lineage; a roll
/// child folds back into its weaving parent.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
}

#[async_trait]
impl Command for CancelOrderCommand {
    /// The surviving record set after the cancel.
    type Result = Vec<production_order::Model>;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
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

impl CancelOrderCommand {
    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<(Vec<production_order::Model>, Vec<Event>), ServiceError> {
        let record = production_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("production order {}", self.order_id)))?;

        if record.is_roll_child() {
            return self.cancel_roll_child(txn, record).await;
        }

        let from = record.stage;
        let prev = from.predecessor().ok_or_else(|| {
            ServiceError::InvalidTransition(format!("{from} cannot be cancelled"))
        })?;

        if from == ProductionStage::WeavingInProgress && record.completed_rolls > 0 {
            return Err(ServiceError::InvalidOperation(
                "completed rolls must be cancelled before the weaving order itself".to_string(),
            ));
        }

        // Auto-merge: a compatible sibling already waiting at the predecessor
        // stage absorbs this record instead of leaving a duplicate.
        if let Some(candidate) = reconciler::find_merge_candidate(txn, &record, prev).await? {
            let absorbed_id = record.id;
            let absorbed_qty = record.quantity;
            let survivor = reconciler::merge_within(txn, candidate, vec![record]).await?;

            let events = vec![
                Event::StageCancelled {
                    order_id: absorbed_id,
                    from: from.to_string(),
                    to: prev.to_string(),
                },
                Event::OrdersMerged {
                    survivor_id: survivor.id,
                    absorbed_id,
                    quantity: absorbed_qty,
                },
            ];
            return Ok((vec![survivor], events));
        }

        // The common case: revert in place.
        let mut events = Vec::new();

        let reacquired = if prev == ProductionStage::WeavingInProgress {
            // Re-entering weaving needs the record's former machine back.
            let machine_no = record.machine_no.clone().ok_or_else(|| {
                ServiceError::InvalidOperation(
                    "no machine recorded for this weaving order".to_string(),
                )
            })?;
            machines::ensure_available(txn, &machine_no).await?;
            events.push(Event::MachineAcquired {
                order_id: record.id,
                machine_no: machine_no.clone(),
            });
            Some(machine_no)
        } else {
            None
        };

        let mut active: production_order::ActiveModel = record.clone().into();
        active.stage = Set(prev);
        active.updated_at = Set(Utc::now());
        if from == ProductionStage::WeavingInProgress {
            if let Some(machine_no) = &record.machine_no {
                events.push(Event::MachineReleased {
                    order_id: record.id,
                    machine_no: machine_no.clone(),
                });
            }
            active.machine_no = Set(None);
        }
        // The machine-exclusivity index backstops ensure_available here too.
        let updated = match &reacquired {
            Some(machine_no) => active
                .update(txn)
                .await
                .map_err(|e| machines::occupancy_conflict(e, machine_no))?,
            None => active.update(txn).await?,
        };

        events.insert(
            0,
            Event::StageCancelled {
                order_id: updated.id,
                from: from.to_string(),
                to: prev.to_string(),
            },
        );
        Ok((vec![updated], events))
    }

    /// Folds a roll child back into its weaving parent: quantity restored,
    /// roll counter decremented, child deleted. A retired parent is reopened,
    /// which requires its machine to still be free.
    async fn cancel_roll_child(
        &self,
        txn: &DatabaseTransaction,
        child: production_order::Model,
    ) -> Result<(Vec<production_order::Model>, Vec<Event>), ServiceError> {
        let parent_id = child.parent_id.ok_or_else(|| {
            ServiceError::InvalidOperation("roll child has no parent reference".to_string())
        })?;
        let parent = production_order::Entity::find_by_id(parent_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidOperation("weaving parent no longer exists".to_string())
            })?;

        if parent.completed_rolls < 1 {
            return Err(ServiceError::InvalidOperation(format!(
                "weaving parent {} has no completed rolls to cancel",
                parent.order_no
            )));
        }

        let mut events = Vec::new();
        let mut reopened_machine: Option<String> = None;

        match parent.stage {
            ProductionStage::WeavingInProgress => {}
            ProductionStage::WeavingClosed => {
                if let Some(machine_no) = &parent.machine_no {
                    machines::ensure_available(txn, machine_no).await?;
                    events.push(Event::MachineAcquired {
                        order_id: parent.id,
                        machine_no: machine_no.clone(),
                    });
                    reopened_machine = Some(machine_no.clone());
                }
            }
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "weaving parent {} has moved on to {other}",
                    parent.order_no
                )));
            }
        }

        // Guarded like the roll-completion counters, and reopening runs into
        // the machine-exclusivity index if the machine was retaken meanwhile.
        let mut patch = production_order::ActiveModel {
            quantity: Set(parent.quantity + child.quantity),
            completed_rolls: Set(parent.completed_rolls - 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if parent.stage == ProductionStage::WeavingClosed {
            patch.stage = Set(ProductionStage::WeavingInProgress);
        }
        let guarded = production_order::Entity::update_many()
            .set(patch)
            .filter(production_order::Column::Id.eq(parent.id))
            .filter(production_order::Column::Quantity.eq(parent.quantity))
            .filter(production_order::Column::CompletedRolls.eq(parent.completed_rolls))
            .exec(txn)
            .await
            .map_err(|e| match &reopened_machine {
                Some(machine_no) => machines::occupancy_conflict(e, machine_no),
                None => ServiceError::DatabaseError(e),
            })?;
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

        let deleted = production_order::Entity::delete_by_id(child.id)
            .exec(txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "production order {} was modified concurrently",
                child.order_no
            )));
        }

        events.insert(
            0,
            Event::StageCancelled {
                order_id: child.id,
                from: ProductionStage::WeavingDone.to_string(),
                to: ProductionStage::WeavingInProgress.to_string(),
            },
        );
        events.push(Event::OrdersMerged {
            survivor_id: parent.id,
            absorbed_id: child.id,
            quantity: child.quantity,
        });

        Ok((vec![parent], events))
    }
}
