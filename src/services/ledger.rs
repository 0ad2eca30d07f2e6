use crate::{
    db::DbPool,
    entities::production_order::{self, ProductionStage},
    errors::ServiceError,
};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Condition,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

/// Optional dimensions for ledger aggregation.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LedgerFilter {
    pub product_code: Option<String>,
    pub customer: Option<String>,
}

/// Current quantity at one stage.
#[derive(Debug, Serialize, ToSchema)]
pub struct StageTotal {
    pub stage: ProductionStage,
    pub total_quantity: i64,
    pub record_count: i64,
}

#[derive(FromQueryResult)]
struct StageTotalRow {
    stage: ProductionStage,
    total_quantity: Option<i64>,
    record_count: Option<i64>,
}

/// Stateless aggregation over current records. No store of its own; every
/// call recomputes from the record collection. Missing optional fields count
/// as zero and never fail the view.
#[derive(Clone)]
pub struct QuantityLedger {
    db_pool: Arc<DbPool>,
}

impl QuantityLedger {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    fn filter_condition(filter: &LedgerFilter) -> Condition {
        let mut condition = Condition::all()
            .add(production_order::Column::Stage.ne(ProductionStage::WeavingClosed));
        if let Some(product_code) = &filter.product_code {
            condition = condition.add(production_order::Column::ProductCode.eq(product_code));
        }
        if let Some(customer) = &filter.customer {
            condition = condition.add(production_order::Column::Customer.eq(customer));
        }
        condition
    }

    /// Quantity and record count per stage, hidden stage excluded.
    #[instrument(skip(self))]
    pub async fn stage_totals(&self, filter: &LedgerFilter) -> Result<Vec<StageTotal>, ServiceError> {
        let db = &*self.db_pool;

        let rows: Vec<StageTotalRow> = production_order::Entity::find()
            .select_only()
            .column(production_order::Column::Stage)
            .column_as(production_order::Column::Quantity.sum(), "total_quantity")
            .column_as(production_order::Column::Id.count(), "record_count")
            .filter(Self::filter_condition(filter))
            .group_by(production_order::Column::Stage)
            .into_model()
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| StageTotal {
                stage: r.stage,
                total_quantity: r.total_quantity.unwrap_or(0),
                record_count: r.record_count.unwrap_or(0),
            })
            .collect())
    }

    /// Total quantity currently sitting at one stage.
    #[instrument(skip(self))]
    pub async fn total_for(
        &self,
        stage: ProductionStage,
        filter: &LedgerFilter,
    ) -> Result<i64, ServiceError> {
        let totals = self.stage_totals(filter).await?;
        Ok(totals
            .into_iter()
            .find(|t| t.stage == stage)
            .map(|t| t.total_quantity)
            .unwrap_or(0))
    }

    /// Records eligible for shipping: sewing complete with quantity on hand.
    #[instrument(skip(self))]
    pub async fn shippable(
        &self,
        filter: &LedgerFilter,
    ) -> Result<Vec<production_order::Model>, ServiceError> {
        let db = &*self.db_pool;

        let records = production_order::Entity::find()
            .filter(production_order::Column::Stage.eq(ProductionStage::SewingDone))
            .filter(production_order::Column::Quantity.gt(0))
            .filter(Self::filter_condition(filter))
            .order_by_asc(production_order::Column::OrderNo)
            .all(db)
            .await?;

        Ok(records)
    }
}
