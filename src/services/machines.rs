use crate::{
    db::DbPool,
    entities::machine,
    entities::production_order::{self, ProductionStage},
    errors::ServiceError,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    SqlErr,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// One roster entry with its current occupancy.
#[derive(Debug, Serialize, ToSchema)]
pub struct MachineStatus {
    pub machine_no: String,
    pub name: Option<String>,
    pub active: bool,
    pub busy: bool,
    /// The order currently weaving on this machine, if any.
    pub order_id: Option<Uuid>,
    pub order_no: Option<String>,
}

/// Verifies, inside the caller's transaction, that `machine_no` names a known
/// machine and that no record currently occupies it. The caller's subsequent
/// stage write in the same transaction makes the check-then-set atomic.
pub async fn ensure_available<C: ConnectionTrait>(
    conn: &C,
    machine_no: &str,
) -> Result<(), ServiceError> {
    let machine = machine::Entity::find_by_id(machine_no)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("machine {machine_no}")))?;

    if !machine.active {
        return Err(ServiceError::InvalidOperation(format!(
            "machine {machine_no} is out of service"
        )));
    }

    let occupied = production_order::Entity::find()
        .filter(production_order::Column::Stage.eq(ProductionStage::WeavingInProgress))
        .filter(production_order::Column::MachineNo.eq(machine_no))
        .count(conn)
        .await?;

    if occupied > 0 {
        return Err(ServiceError::MachineBusy(machine_no.to_string()));
    }

    Ok(())
}

/// Translates the unique violation raised by the machine-exclusivity index
/// into the domain error. `ensure_available` gives the friendly pre-check;
/// the index is the authoritative guard when two transactions race past it.
pub(crate) fn occupancy_conflict(err: DbErr, machine_no: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::MachineBusy(machine_no.to_string())
        }
        _ => ServiceError::DatabaseError(err),
    }
}

/// Read surface over the machine roster. Holds no occupancy state of its own:
/// "busy" is always a fresh query over current records.
#[derive(Clone)]
pub struct MachineAllocator {
    db_pool: Arc<DbPool>,
}

impl MachineAllocator {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Full roster in machine-number order.
    #[instrument(skip(self))]
    pub async fn roster(&self) -> Result<Vec<machine::Model>, ServiceError> {
        let db = &*self.db_pool;
        let machines = machine::Entity::find()
            .order_by_asc(machine::Column::MachineNo)
            .all(db)
            .await?;
        Ok(machines)
    }

    /// Roster annotated with current occupants.
    #[instrument(skip(self))]
    pub async fn roster_with_status(&self) -> Result<Vec<MachineStatus>, ServiceError> {
        let db = &*self.db_pool;
        let machines = self.roster().await?;

        let occupants = production_order::Entity::find()
            .filter(production_order::Column::Stage.eq(ProductionStage::WeavingInProgress))
            .all(db)
            .await?;

        Ok(machines
            .into_iter()
            .map(|m| {
                let occupant = occupants
                    .iter()
                    .find(|o| o.machine_no.as_deref() == Some(m.machine_no.as_str()));
                MachineStatus {
                    busy: occupant.is_some(),
                    order_id: occupant.map(|o| o.id),
                    order_no: occupant.map(|o| o.order_no.clone()),
                    machine_no: m.machine_no,
                    name: m.name,
                    active: m.active,
                }
            })
            .collect())
    }

    /// Whether any record currently holds the machine at weaving.
    #[instrument(skip(self))]
    pub async fn is_busy(&self, machine_no: &str) -> Result<bool, ServiceError> {
        let db = &*self.db_pool;
        let occupied = production_order::Entity::find()
            .filter(production_order::Column::Stage.eq(ProductionStage::WeavingInProgress))
            .filter(production_order::Column::MachineNo.eq(machine_no))
            .count(db)
            .await?;
        Ok(occupied > 0)
    }
}
