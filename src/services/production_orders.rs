use crate::{
    commands::{
        production::{
            AdvanceOrderCommand, AdvancePayload, CancelOrderCommand, CreateOrderCommand,
            SplitOrderCommand,
        },
        Command,
    },
    db::DbPool,
    entities::production_order::{self, root_order_no, ProductionStage},
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

/// Filters for listing production orders.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListFilter {
    pub stage: Option<ProductionStage>,
    pub product_code: Option<String>,
    pub customer: Option<String>,
    pub machine_no: Option<String>,
    /// Include retired weaving parents (hidden by default).
    #[serde(default)]
    pub include_closed: bool,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}
fn default_per_page() -> u64 {
    50
}

/// Service façade over the production order pipeline: queries plus the
/// transition/split/cancel commands.
#[derive(Clone)]
pub struct ProductionOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductionOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Lists records, hidden stage excluded unless asked for.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &OrderListFilter,
    ) -> Result<(Vec<production_order::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = production_order::Entity::find();
        if let Some(stage) = filter.stage {
            query = query.filter(production_order::Column::Stage.eq(stage));
        } else if !filter.include_closed {
            query = query
                .filter(production_order::Column::Stage.ne(ProductionStage::WeavingClosed));
        }
        if let Some(product_code) = &filter.product_code {
            query = query.filter(production_order::Column::ProductCode.eq(product_code));
        }
        if let Some(customer) = &filter.customer {
            query = query.filter(production_order::Column::Customer.eq(customer));
        }
        if let Some(machine_no) = &filter.machine_no {
            query = query.filter(production_order::Column::MachineNo.eq(machine_no));
        }

        let paginator = query
            .order_by_asc(production_order::Column::OrderNo)
            .paginate(db, filter.per_page.max(1));

        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(filter.page.saturating_sub(1)).await?;

        Ok((records, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<production_order::Model, ServiceError> {
        let db = &*self.db_pool;
        production_order::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("production order {id}")))
    }

    /// All records sharing the root order number of `id`, including retired
    /// weaving parents.
    #[instrument(skip(self))]
    pub async fn lineage(&self, id: Uuid) -> Result<Vec<production_order::Model>, ServiceError> {
        let db = &*self.db_pool;
        let record = self.get(id).await?;
        let root = root_order_no(&record.order_no);

        let records = production_order::Entity::find()
            .filter(
                production_order::Column::OrderNo
                    .eq(root.clone())
                    .or(production_order::Column::OrderNo.starts_with(format!("{root}-"))),
            )
            .order_by_asc(production_order::Column::OrderNo)
            .all(db)
            .await?;

        Ok(records)
    }

    /// Intake: creates a record at `received`.
    #[instrument(skip(self, command), fields(order_no = %command.order_no))]
    pub async fn create(
        &self,
        command: CreateOrderCommand,
    ) -> Result<production_order::Model, ServiceError> {
        let record = command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await?;
        info!(order_id = %record.id, order_no = %record.order_no, "production order created");
        Ok(record)
    }

    /// Forward transition; returns the affected record set.
    #[instrument(skip(self, payload))]
    pub async fn advance(
        &self,
        id: Uuid,
        target_stage: ProductionStage,
        payload: AdvancePayload,
    ) -> Result<Vec<production_order::Model>, ServiceError> {
        AdvanceOrderCommand {
            order_id: id,
            target_stage,
            payload,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Backward transition with auto-merge; returns the surviving record set.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<Vec<production_order::Model>, ServiceError> {
        CancelOrderCommand { order_id: id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Same-stage split; returns `(source, child)`.
    #[instrument(skip(self))]
    pub async fn split(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<(production_order::Model, production_order::Model), ServiceError> {
        SplitOrderCommand {
            order_id: id,
            quantity,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }
}
