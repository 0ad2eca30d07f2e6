use crate::{
    db::DbPool,
    entities::{machine, partner, product},
    errors::ServiceError,
};
use sea_orm::{EntityTrait, QueryOrder};
use std::sync::Arc;
use tracing::instrument;

/// Read-only lookups over master data (products, partners, machine roster).
/// Maintenance of these tables is a company-settings concern outside this
/// service.
#[derive(Clone)]
pub struct MasterDataService {
    db_pool: Arc<DbPool>,
}

impl MasterDataService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn find_product(&self, code: &str) -> Result<Option<product::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(product::Entity::find_by_id(code).one(db).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(product::Entity::find()
            .order_by_asc(product::Column::ProductCode)
            .all(db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn find_partner(&self, name: &str) -> Result<Option<partner::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(partner::Entity::find_by_id(name).one(db).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_partners(&self) -> Result<Vec<partner::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(partner::Entity::find()
            .order_by_asc(partner::Column::Name)
            .all(db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn find_machine(&self, no: &str) -> Result<Option<machine::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(machine::Entity::find_by_id(no).one(db).await?)
    }
}
