pub mod health;
pub mod inventory;
pub mod machines;
pub mod master_data;
pub mod production_orders;

use crate::events::EventSender;
use crate::{
    db::DbPool,
    services::{
        ledger::QuantityLedger, machines::MachineAllocator, master_data::MasterDataService,
        production_orders::ProductionOrderService,
    },
};
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub production_orders: Arc<ProductionOrderService>,
    pub machines: Arc<MachineAllocator>,
    pub ledger: Arc<QuantityLedger>,
    pub master_data: Arc<MasterDataService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            production_orders: Arc::new(ProductionOrderService::new(
                db_pool.clone(),
                event_sender,
            )),
            machines: Arc::new(MachineAllocator::new(db_pool.clone())),
            ledger: Arc::new(QuantityLedger::new(db_pool.clone())),
            master_data: Arc::new(MasterDataService::new(db_pool)),
        }
    }
}
